use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
    response::Redirect,
};
use thiserror::Error;

use crate::{
    config::AppConfig,
    models::{Credentials, Principal},
    password::{HashError, PasswordHasher},
    repository::{RepoError, RepositoryState},
    session::{SessionStore, session_id_from_headers},
};

#[derive(Debug, Error)]
pub enum AuthError {
    /// No account with this username. Only `load_credentials` reports it;
    /// `authenticate` folds it into `BadCredentials`.
    #[error("user not found")]
    UserNotFound,

    #[error("invalid username or password")]
    BadCredentials,

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

/// AuthenticationProvider
///
/// Loads credentials from the store on every login attempt and verifies the
/// submitted password against the stored bcrypt hash.
#[derive(Clone)]
pub struct AuthenticationProvider {
    repo: RepositoryState,
    hasher: PasswordHasher,
}

impl AuthenticationProvider {
    pub fn new(repo: RepositoryState, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    /// load_credentials
    ///
    /// Username, stored hash and the authorities (`ROLE_<name>` per role) of an
    /// account.
    pub async fn load_credentials(&self, username: &str) -> Result<Credentials, AuthError> {
        let user = self
            .repo
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        tracing::debug!(username, authorities = ?user.authorities(), "credentials loaded");
        Ok(Credentials::from(&user))
    }

    /// authenticate
    ///
    /// Checks a username/password pair. Wrong passwords and unknown usernames both
    /// come back as `BadCredentials` after exactly one bcrypt verification, so the
    /// caller can tell neither by result nor by timing which one happened.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credentials, AuthError> {
        match self.load_credentials(username).await {
            Ok(credentials) => {
                if self.hasher.verify(password, &credentials.password_hash).await? {
                    tracing::info!(username, "login succeeded");
                    Ok(credentials)
                } else {
                    tracing::warn!(username, "login failed");
                    Err(AuthError::BadCredentials)
                }
            }
            Err(AuthError::UserNotFound) => {
                self.hasher.verify_dummy(password).await;
                tracing::warn!(username, "login failed");
                Err(AuthError::BadCredentials)
            }
            Err(e) => Err(e),
        }
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Usable as a handler
/// argument on any route that needs the current user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl AuthUser {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.0.has_authority(authority)
    }
}

/// Resolves the principal bound to the request's session cookie, if any.
pub fn resolve_principal(
    headers: &HeaderMap,
    sessions: &SessionStore,
    config: &AppConfig,
) -> Option<Principal> {
    let id = session_id_from_headers(headers, &config.session_cookie_name)?;
    sessions.principal(id)
}

/// AuthUser Extractor Implementation
///
/// Reads the session cookie, looks the session up and yields its principal.
/// Rejection: a redirect to the login page when there is no live authenticated
/// session.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_principal(&parts.headers, &sessions, &config)
            .map(AuthUser)
            .ok_or_else(|| Redirect::to("/login"))
    }
}
