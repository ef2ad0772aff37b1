/// Router Module Index
///
/// Routes are grouped by the access level the policy layer grants them. The
/// grouping documents intent; enforcement lives in `policy::enforce_access`,
/// which wraps the merged router.

/// Routes reachable without a session.
pub mod public;

/// Routes that need an authenticated session.
pub mod authenticated;

/// Routes under `/admin`, restricted to `ROLE_ADMIN`.
pub mod admin;
