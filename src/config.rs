use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only with every handler and extractor through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, cookie flags and which
    // variables are mandatory.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory credential store,
    // which is only permitted in `Env::Local`.
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // bcrypt work factor applied to every new password hash.
    pub bcrypt_cost: u32,
    // Idle lifetime of a session before it is discarded.
    pub session_ttl_minutes: i64,
    // Name of the cookie carrying the opaque session id.
    pub session_cookie_name: String,
    // Adds the `Secure` attribute to the session cookie.
    pub secure_cookies: bool,
    // Username promoted to ADMIN at startup, if such a user exists.
    pub bootstrap_admin: Option<String>,
}

/// Env
///
/// Defines the runtime context: developer conveniences locally, strict
/// requirements in production.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;
/// Upper bound for `SESSION_TTL_MINUTES` (one year).
pub const MAX_SESSION_TTL_MINUTES: i64 = 525_600;
pub const DEFAULT_SESSION_COOKIE: &str = "session_id";

impl Default for AppConfig {
    /// Non-panicking configuration for tests: in-memory store, the cheapest
    /// bcrypt cost and plain-http cookies.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            bcrypt_cost: 4,
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            session_cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            secure_cookies: false,
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` is missing in production, if a numeric
    /// variable cannot be parsed, or if `SESSION_TTL_MINUTES` is outside
    /// `1..=MAX_SESSION_TTL_MINUTES`.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
            ),
            // Local runs fall back to the in-memory store when no database is configured.
            Env::Local => env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        };

        let bcrypt_cost = env::var("BCRYPT_COST")
            .map(|v| v.parse().expect("FATAL: BCRYPT_COST must be an integer"))
            .unwrap_or(bcrypt::DEFAULT_COST);

        let session_ttl_minutes = env::var("SESSION_TTL_MINUTES")
            .map(|v| {
                v.parse()
                    .expect("FATAL: SESSION_TTL_MINUTES must be an integer")
            })
            .unwrap_or(DEFAULT_SESSION_TTL_MINUTES);
        assert!(
            (1..=MAX_SESSION_TTL_MINUTES).contains(&session_ttl_minutes),
            "FATAL: SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}"
        );

        Self {
            env,
            db_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            bcrypt_cost,
            session_ttl_minutes,
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            secure_cookies: env == Env::Production,
            bootstrap_admin: env::var("BOOTSTRAP_ADMIN").ok().filter(|u| !u.is_empty()),
        }
    }
}
