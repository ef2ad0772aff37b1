use auth_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are swept from the session store.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose defaults for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Credential Store
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            let postgres = PostgresRepository::new(pool);
            postgres
                .migrate()
                .await
                .expect("FATAL: Failed to run database migrations.");
            tracing::info!("Using Postgres credential store");
            Arc::new(postgres)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; accounts live in memory and vanish on restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. Unified State Assembly
    let app_state = AppState::new(config.clone(), repo)
        .expect("FATAL: Invalid BCRYPT_COST (bcrypt accepts 4 to 31).");

    // 5. Optional admin bootstrap (BOOTSTRAP_ADMIN)
    if let Some(username) = &config.bootstrap_admin {
        match app_state.users.promote_by_username(username).await {
            Ok(Some(_)) => tracing::info!(%username, "bootstrap admin promoted"),
            Ok(None) => tracing::warn!(%username, "bootstrap admin not found; register it first"),
            Err(e) => tracing::error!(%username, "bootstrap admin failed: {}", e),
        }
    }

    // 6. Session sweeper
    let sessions = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired sessions purged");
            }
        }
    });

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
