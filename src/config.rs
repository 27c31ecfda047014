// src/config.rs

/// Service configuration, read from the environment after `.env` is loaded.
///
/// | Variable | Default |
/// |----------|---------|
/// | DATABASE_URL | sqlite://phonestore.db?mode=rwc |
/// | DB_MAX_CONNECTIONS | 5 |
/// | HOST | 127.0.0.1 |
/// | PORT | 3000 |
/// | JWT_SECRET | (required) |
/// | AUDIT_BUFFER_SIZE | 1024 |
/// | SLOW_MOVING_DAYS | 30 |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub audit_buffer_size: usize,
    pub slow_moving_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| "JWT_SECRET must be set".to_string())?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://phonestore.db?mode=rwc".into()),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env_or("PORT", 3000),
            jwt_secret,
            audit_buffer_size: env_or("AUDIT_BUFFER_SIZE", 1024),
            slow_moving_days: env_or("SLOW_MOVING_DAYS", 30),
        })
    }

    /// In-memory store and fixed secret, for tests.
    pub fn for_tests(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: jwt_secret.into(),
            audit_buffer_size: 256,
            slow_moving_days: 30,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
