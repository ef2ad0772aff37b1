use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here takes the `AuthUser` extractor, which redirects to the
/// login page when the session is missing or expired.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /hello
        // Post-login landing page.
        .route("/hello", get(handlers::hello))
}
