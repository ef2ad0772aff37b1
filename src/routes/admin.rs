use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Nested under `/admin`. The policy layer rejects callers without
/// `ROLE_ADMIN` before these handlers run; other `/admin/**` paths fall through
/// to the 404 fallback once permitted.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users/{username}
        // Stored profile and role names of an account.
        .route("/users/{username}", get(handlers::get_user_profile))
        // POST /admin/users/{username}/roles/admin
        // Adds the ADMIN role. Roles are never removed.
        .route(
            "/users/{username}/roles/admin",
            post(handlers::grant_admin_role),
        )
        // GET /admin/api-docs/openapi.json
        .route("/api-docs/openapi.json", get(handlers::openapi_document))
}
