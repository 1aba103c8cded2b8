use std::env;

use chrono::Duration;
use dotenvy::dotenv;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_SESSION_MINUTES: i64 = 60;
const DEFAULT_MESSAGING_BASE_URL: &str = "https://wa.me";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub admin_password: String,
    pub admin_session_ttl: Duration,
    pub messaging_base_url: Url,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let admin_password = lookup("ADMIN_PASSWORD").unwrap_or_else(|| {
            warn!("ADMIN_PASSWORD not set, falling back to the default password");
            DEFAULT_ADMIN_PASSWORD.to_string()
        });

        let session_minutes = parse_or(&lookup, "ADMIN_SESSION_MINUTES", DEFAULT_SESSION_MINUTES)?;
        if session_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "ADMIN_SESSION_MINUTES",
                value: session_minutes.to_string(),
            });
        }

        let base = lookup("MESSAGING_BASE_URL").unwrap_or_else(|| DEFAULT_MESSAGING_BASE_URL.to_string());
        let messaging_base_url = Url::parse(&base).map_err(|_| ConfigError::Invalid {
            name: "MESSAGING_BASE_URL",
            value: base.clone(),
        })?;

        Ok(Config {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            admin_password,
            admin_session_ttl: Duration::minutes(session_minutes),
            messaging_base_url,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/studio")]).unwrap();
        assert_eq!(config.admin_password, "admin123");
        assert_eq!(config.admin_session_ttl, Duration::minutes(60));
        assert_eq!(config.messaging_base_url.as_str(), "https://wa.me/");
        assert_eq!(config.db_max_connections, 5);
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("DATABASE_URL", "postgres://x"), ("ADMIN_SESSION_MINUTES", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ADMIN_SESSION_MINUTES", .. }));

        let err = config(&[("DATABASE_URL", "postgres://x"), ("MESSAGING_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MESSAGING_BASE_URL", .. }));
    }
}
