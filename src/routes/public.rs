use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Pages and form endpoints open to anonymous clients.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET / and /home
        .route("/", get(handlers::home))
        .route("/home", get(handlers::home))
        // GET/POST /registration
        // Form render and submission; success redirects to /login with a flash message.
        .route(
            "/registration",
            get(handlers::registration_form).post(handlers::register_user),
        )
        // GET/POST /login
        // Form render and form login; success lands on /hello.
        .route("/login", get(handlers::login_form).post(handlers::login))
        // POST /logout
        .route("/logout", post(handlers::logout))
}
