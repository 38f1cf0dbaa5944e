use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    pub db_max_connections: u32,
    /// Accept the `x-uid` header as an identity in place of a bearer token.
    pub allow_uid_header: bool,
}

const DEV_JWT_SECRET: &str = "freshcart-development-secret";

impl AppConfig {
    /// Configuration used by the test suite: in-memory database, short-lived tokens.
    pub fn for_tests() -> Self {
        Self {
            env: Environment::Test,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            log_level: "debug".to_string(),
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_days: 30,
            db_max_connections: 1,
            allow_uid_header: true,
        }
    }
}

/// Load configuration from the process environment, reading `.env` first.
///
/// # Errors
///
/// Returns `ConfigError` if a required variable is missing or a value does not parse.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let value = or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value <= 0 {
            return Err(invalid(var, "must be positive".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("FRESHCART_ENV", "development"));

    let bind_addr = or_default("FRESHCART_BIND_ADDR", "0.0.0.0:8080")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FRESHCART_BIND_ADDR", e.to_string()))?;

    let database_url = or_default("DATABASE_URL", "sqlite://freshcart.db");
    let log_level = or_default("FRESHCART_LOG_LEVEL", "info");

    let jwt_secret = match lookup("FRESHCART_JWT_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ if env == Environment::Development => DEV_JWT_SECRET.to_string(),
        _ => return Err(ConfigError::MissingEnvVar("FRESHCART_JWT_SECRET".to_string())),
    };

    let access_token_ttl_secs = parse_i64("FRESHCART_ACCESS_TOKEN_TTL_SECS", "900")?;
    let refresh_token_ttl_days = parse_i64("FRESHCART_REFRESH_TOKEN_TTL_DAYS", "30")?;

    let db_max_connections = or_default("FRESHCART_DB_MAX_CONNECTIONS", "5")
        .parse::<u32>()
        .map_err(|e| invalid("FRESHCART_DB_MAX_CONNECTIONS", e.to_string()))?;

    let allow_uid_header = match lookup("FRESHCART_ALLOW_UID_HEADER") {
        Ok(raw) => parse_bool(&raw).ok_or_else(|| {
            invalid("FRESHCART_ALLOW_UID_HEADER", format!("expected true/false, got {raw:?}"))
        })?,
        Err(_) => env != Environment::Production,
    };

    Ok(AppConfig {
        env,
        bind_addr,
        database_url,
        log_level,
        jwt_secret,
        access_token_ttl_secs,
        refresh_token_ttl_days,
        db_max_connections,
        allow_uid_header,
    })
}

fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Result<String, VarError> {
        move |key| map.get(key).map(|v| (*v).to_string()).ok_or(VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_in_development() {
        let config = build_app_config(lookup_from(HashMap::new())).expect("dev config");
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_url, "sqlite://freshcart.db");
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.access_token_ttl_secs, 900);
        assert_eq!(config.refresh_token_ttl_days, 30);
        assert!(config.allow_uid_header);
    }

    #[test]
    fn production_requires_jwt_secret() {
        let err = build_app_config(lookup_from(HashMap::from([("FRESHCART_ENV", "production")])))
            .expect_err("secret is required");
        assert_eq!(err, ConfigError::MissingEnvVar("FRESHCART_JWT_SECRET".to_string()));
    }

    #[test]
    fn production_disables_uid_header_by_default() {
        let config = build_app_config(lookup_from(HashMap::from([
            ("FRESHCART_ENV", "production"),
            ("FRESHCART_JWT_SECRET", "s3cret"),
        ])))
        .expect("prod config");
        assert!(!config.allow_uid_header);
        assert_eq!(config.jwt_secret, "s3cret");
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = build_app_config(lookup_from(HashMap::from([("FRESHCART_BIND_ADDR", "nope")])))
            .expect_err("bad addr");
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FRESHCART_BIND_ADDR"));
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let err = build_app_config(lookup_from(HashMap::from([(
            "FRESHCART_ACCESS_TOKEN_TTL_SECS",
            "0",
        )])))
        .expect_err("zero ttl");
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn uid_header_flag_is_parsed() {
        let config = build_app_config(lookup_from(HashMap::from([(
            "FRESHCART_ALLOW_UID_HEADER",
            "off",
        )])))
        .expect("config");
        assert!(!config.allow_uid_header);
    }
}
