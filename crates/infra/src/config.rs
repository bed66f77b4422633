//! Process configuration loaded from environment variables.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Connection settings for the hosted payment page provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub store_id: String,
    pub store_password: String,
    /// Upper bound for one session-init round trip. Elapsing it means
    /// "outcome unknown", never "failed".
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Enables the Postgres stock ledger when set.
    pub database_url: Option<String>,
    pub gateway: GatewayConfig,
    /// Externally reachable base URL used to build gateway callback URLs.
    pub public_base_url: String,
    pub currency: String,
    /// Age after which an unresolved online payment session is cancelled.
    pub payment_session_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = match lookup("JWT_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR", "0.0.0.0:8080"),
            jwt_secret,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            gateway: GatewayConfig {
                base_url: get("GATEWAY_BASE_URL", "https://sandbox.sslcommerz.com")
                    .trim_end_matches('/')
                    .to_string(),
                store_id: get("GATEWAY_STORE_ID", "testbox"),
                store_password: get("GATEWAY_STORE_PASSWORD", "qwerty"),
                timeout: seconds(&lookup, "GATEWAY_TIMEOUT_SECS", 15)?,
            },
            public_base_url: get("PUBLIC_BASE_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            currency: get("CURRENCY", "BDT"),
            payment_session_ttl: seconds(&lookup, "PAYMENT_SESSION_TTL_SECS", 30 * 60)?,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.gateway.timeout, Duration::from_secs(15));
        assert_eq!(cfg.payment_session_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn overrides_are_read_and_trimmed() {
        let cfg = config(&[
            ("GATEWAY_BASE_URL", "http://127.0.0.1:9000/"),
            ("GATEWAY_TIMEOUT_SECS", "3"),
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("CURRENCY", "USD"),
        ])
        .unwrap();
        assert_eq!(cfg.gateway.base_url, "http://127.0.0.1:9000");
        assert_eq!(cfg.gateway.timeout, Duration::from_secs(3));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/stock"));
        assert_eq!(cfg.currency, "USD");
    }

    #[test]
    fn malformed_durations_are_rejected() {
        let err = config(&[("PAYMENT_SESSION_TTL_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PAYMENT_SESSION_TTL_SECS",
                value: "soon".to_string()
            }
        );
    }
}
