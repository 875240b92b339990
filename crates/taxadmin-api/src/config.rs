//! # Service Configuration
//!
//! Read once at startup from environment variables. [`AppConfig::from_lookup`]
//! takes any `Fn(&str) -> Option<String>` so tests can supply a map instead
//! of touching the process environment.

use serde::Serialize;
use thiserror::Error;

/// Default request body limit: 16 MiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

/// A variable was present but could not be parsed.
#[derive(Debug, Error)]
#[error("invalid value for {name}: {value:?} ({reason})")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

/// Outbound mail settings. Delivery is not performed by this service; the
/// values are carried for the settings view and downstream workers.
#[derive(Clone, Serialize)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub default_sender: Option<String>,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("default_sender", &self.default_sender)
            .finish()
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
    /// PostgreSQL URL. `None` keeps everything in memory.
    pub database_url: Option<String>,
    /// Session and token signing secret.
    pub secret_key: String,
    pub mail: MailConfig,
    pub session_lifetime_secs: u64,
    pub token_expiration_secs: u64,
    /// Default page size for listings.
    pub items_per_page: usize,
    /// Request body limit in bytes.
    pub max_content_length: usize,
    /// Year used for seeded quarterly periods. `None` means the current year.
    pub seed_year: Option<i32>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &"[REDACTED]")
            .field("mail", &self.mail)
            .field("session_lifetime_secs", &self.session_lifetime_secs)
            .field("token_expiration_secs", &self.token_expiration_secs)
            .field("items_per_page", &self.items_per_page)
            .field("max_content_length", &self.max_content_length)
            .field("seed_year", &self.seed_year)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
            secret_key: "hard-to-guess-string".to_string(),
            mail: MailConfig {
                server: "smtp.example.com".to_string(),
                port: 587,
                use_tls: true,
                username: None,
                password: None,
                default_sender: None,
            },
            session_lifetime_secs: 86_400,
            token_expiration_secs: 3_600,
            items_per_page: 20,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            seed_year: None,
            log_format: LogFormat::Text,
        }
    }
}

fn parsed<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn flag<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError {
                name,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" | "pretty" => LogFormat::Text,
                _ => {
                    return Err(ConfigError {
                        name: "LOG_FORMAT",
                        value: raw,
                        reason: "expected 'text' or 'json'".to_string(),
                    })
                }
            },
        };

        let items_per_page: usize = parsed(&lookup, "ITEMS_PER_PAGE", defaults.items_per_page)?;
        if items_per_page == 0 {
            return Err(ConfigError {
                name: "ITEMS_PER_PAGE",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port: parsed(&lookup, "PORT", defaults.port)?,
            auth_token: lookup("AUTH_TOKEN"),
            database_url: lookup("DATABASE_URL"),
            secret_key: lookup("SECRET_KEY").unwrap_or(defaults.secret_key),
            mail: MailConfig {
                server: lookup("MAIL_SERVER").unwrap_or(defaults.mail.server),
                port: parsed(&lookup, "MAIL_PORT", defaults.mail.port)?,
                use_tls: flag(&lookup, "MAIL_USE_TLS", defaults.mail.use_tls)?,
                username: lookup("MAIL_USERNAME"),
                password: lookup("MAIL_PASSWORD"),
                default_sender: lookup("MAIL_DEFAULT_SENDER"),
            },
            session_lifetime_secs: parsed(
                &lookup,
                "SESSION_LIFETIME_SECS",
                defaults.session_lifetime_secs,
            )?,
            token_expiration_secs: parsed(
                &lookup,
                "TOKEN_EXPIRATION_SECS",
                defaults.token_expiration_secs,
            )?,
            items_per_page,
            max_content_length: parsed(&lookup, "MAX_CONTENT_LENGTH", defaults.max_content_length)?,
            seed_year: match lookup("SEED_YEAR") {
                None => None,
                Some(_) => Some(parsed(&lookup, "SEED_YEAR", 0i32)?),
            },
            log_format,
        })
    }

    /// The configuration as JSON with every secret removed.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "port": self.port,
            "auth_enabled": self.auth_token.is_some(),
            "database_configured": self.database_url.is_some(),
            "secret_key": "[REDACTED]",
            "mail": self.mail,
            "session_lifetime_secs": self.session_lifetime_secs,
            "token_expiration_secs": self.token_expiration_secs,
            "items_per_page": self.items_per_page,
            "max_content_length": self.max_content_length,
            "seed_year": self.seed_year,
            "log_format": self.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.items_per_page, 20);
        assert_eq!(config.max_content_length, 16 * 1024 * 1024);
        assert_eq!(config.mail.port, 587);
        assert!(config.mail.use_tls);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_overrides() {
        let config = from_map(&[
            ("PORT", "9000"),
            ("AUTH_TOKEN", "s3cret"),
            ("MAIL_USE_TLS", "false"),
            ("ITEMS_PER_PAGE", "50"),
            ("SEED_YEAR", "2024"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert!(!config.mail.use_tls);
        assert_eq!(config.items_per_page, 50);
        assert_eq!(config.seed_year, Some(2024));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = from_map(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.name, "PORT");
        assert!(from_map(&[("ITEMS_PER_PAGE", "0")]).is_err());
        assert!(from_map(&[("MAIL_USE_TLS", "maybe")]).is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = from_map(&[("AUTH_TOKEN", ""), ("PORT", " ")]).unwrap();
        assert!(config.auth_token.is_none());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn debug_and_settings_view_redact_secrets() {
        let config = from_map(&[
            ("AUTH_TOKEN", "tok-123"),
            ("SECRET_KEY", "sk-456"),
            ("MAIL_PASSWORD", "pw-789"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        for secret in ["tok-123", "sk-456", "pw-789"] {
            assert!(!debug.contains(secret), "{secret} leaked into Debug");
        }
        let view = config.redacted().to_string();
        for secret in ["tok-123", "sk-456", "pw-789"] {
            assert!(!view.contains(secret), "{secret} leaked into settings");
        }
        assert_eq!(config.redacted()["auth_enabled"], true);
    }
}
