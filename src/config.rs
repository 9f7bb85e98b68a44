use std::{env, time::Duration};

/// Fallback signing key used only when running locally without `SECRET`.
const LOCAL_DEV_SECRET: &str = "course-portal-local-dev-secret-value";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and then
/// passed explicitly to the components that need it (the token authority receives its
/// secret from here, it never reads the environment itself).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which values are mandatory.
    pub env: Env,
    // Key used to sign and verify bearer tokens (`SECRET`).
    pub secret: String,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Lifetime of issued tokens, in seconds.
    pub token_ttl_secs: u64,
    // Upper bound on a single credential verification, in milliseconds.
    pub verify_timeout_ms: u64,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and relaxed defaults locally,
/// JSON logs and mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests: local mode, in-memory store.
    fn default() -> Self {
        Self {
            env: Env::Local,
            secret: LOCAL_DEV_SECRET.to_string(),
            db_url: None,
            token_ttl_secs: 3600,
            verify_timeout_ms: 2000,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the process environment (call `dotenv` first).
    ///
    /// # Panics
    /// Panics in production when `SECRET` or `DATABASE_URL` is missing, and in any
    /// environment when a numeric variable cannot be parsed. The service must not
    /// start with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let secret = match env {
            Env::Production => env::var("SECRET").expect("FATAL: SECRET must be set in production."),
            Env::Local => env::var("SECRET").unwrap_or_else(|_| LOCAL_DEV_SECRET.to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set in production."),
            ),
            Env::Local => env::var("DATABASE_URL").ok(),
        };

        let defaults = Self::default();

        Self {
            env,
            secret,
            db_url,
            token_ttl_secs: parse_var("TOKEN_TTL_SECS", defaults.token_ttl_secs),
            verify_timeout_ms: parse_var("VERIFY_TIMEOUT_MS", defaults.verify_timeout_ms),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

fn parse_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be an unsigned integer, got {raw:?}")),
        Err(_) => default,
    }
}
