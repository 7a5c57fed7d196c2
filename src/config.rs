// src/config.rs
use std::env;
use std::str::FromStr;

use crate::errors::ServiceError;
use crate::patterns::DEFAULT_PERIOD;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TAAPI_BASE_URL: &str = "https://api.taapi.io";
pub const DEFAULT_EXCHANGE: &str = "binance";
pub const DEFAULT_INTERVAL: &str = "1h";
pub const DEFAULT_PATTERN_LOG_PATH: &str = "logs/flag_patterns.log";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Required by the server binary; optional here so offline tools can
    /// share the same loader.
    pub taapi_secret: Option<String>,
    pub taapi_base_url: String,
    pub taapi_exchange: String,
    pub default_interval: String,
    pub default_period: usize,
    pub pattern_log_path: String,
    pub cors_origin: String,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up
    /// a `.env` file.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            host: text("HOST", DEFAULT_HOST),
            port: parsed(&lookup, "PORT", DEFAULT_PORT)?,
            taapi_secret: lookup("TAAPI_SECRET"),
            taapi_base_url: text("TAAPI_BASE_URL", DEFAULT_TAAPI_BASE_URL),
            taapi_exchange: text("TAAPI_EXCHANGE", DEFAULT_EXCHANGE),
            default_interval: text("DEFAULT_INTERVAL", DEFAULT_INTERVAL),
            default_period: parsed(&lookup, "DEFAULT_PERIOD", DEFAULT_PERIOD)?,
            pattern_log_path: text("PATTERN_LOG_PATH", DEFAULT_PATTERN_LOG_PATH),
            cors_origin: text("CORS_ORIGIN", DEFAULT_CORS_ORIGIN),
        };
        if config.default_period == 0 {
            return Err(ServiceError::Config("DEFAULT_PERIOD must be at least 1".to_string()));
        }
        Ok(config)
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ServiceError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ServiceError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ServiceError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.taapi_secret, None);
        assert_eq!(config.default_period, 14);
        assert_eq!(config.default_interval, "1h");
        assert_eq!(config.cors_origin, "http://localhost:4200");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[("PORT", "9090"), ("TAAPI_SECRET", "abc"), ("DEFAULT_PERIOD", "20")]).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.taapi_secret.as_deref(), Some("abc"));
        assert_eq!(config.default_period, 20);
    }

    #[test]
    fn malformed_values_are_config_errors() {
        assert!(matches!(load(&[("PORT", "eighty")]), Err(ServiceError::Config(_))));
        assert!(matches!(load(&[("DEFAULT_PERIOD", "0")]), Err(ServiceError::Config(_))));
    }
}
