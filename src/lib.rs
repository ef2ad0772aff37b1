use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod policy;
pub mod repository;
pub mod service;
pub mod session;
pub mod views;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::AuthenticationProvider;
pub use config::AppConfig;
pub use password::{HashError, PasswordHasher};
pub use policy::AccessPolicy;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::UserService;
pub use session::SessionStore;

/// ApiDoc
///
/// OpenAPI description of the JSON admin API, served at
/// `/admin/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_user_profile, handlers::grant_admin_role),
    components(schemas(models::UserProfile)),
    tags(
        (name = "auth-portal", description = "Account administration API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, wired once at startup and cloned cheaply per
/// request.
#[derive(Clone)]
pub struct AppState {
    /// Credential store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Registration and role assignment.
    pub users: UserService,
    /// Credential verification for form login.
    pub auth: AuthenticationProvider,
    /// Server-side sessions behind the session cookie.
    pub sessions: SessionStore,
    /// Path-based authorization rules.
    pub policy: Arc<AccessPolicy>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Builds the services around the given store with the standard access policy.
    /// Fails only if the configured bcrypt cost is invalid.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Result<Self, HashError> {
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        let sessions = SessionStore::new(chrono::Duration::minutes(config.session_ttl_minutes));

        Ok(Self {
            users: UserService::new(repo.clone(), hasher.clone()),
            auth: AuthenticationProvider::new(repo.clone(), hasher),
            sessions,
            policy: Arc::new(AccessPolicy::standard()),
            repo,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(app_state: &AppState) -> SessionStore {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routes, wraps them (fallback included) in the access policy, and
/// adds the request-id and tracing layers outermost.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .nest("/admin", admin::admin_routes())
        // Applied with `layer` rather than `route_layer` so unmatched paths are
        // policed as well.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            policy::enforce_access,
        ))
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, uri and the `x-request-id` so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
