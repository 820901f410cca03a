//! Configuration management for Catalog Service
//!
//! Loads settings from environment variables, after reading a `.env` file
//! when one is present.
//!
//! # Example
//!
//! ```no_run
//! use catalog_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("listening on {}", settings.server.address());
//!     Ok(())
//! }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};

/// Minimum HMAC secret length outside development
const MIN_SECRET_BYTES: usize = 32;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub server: ServerSettings,
    pub jwt: JwtSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load settings from the process environment (and `.env`)
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        Ok(Settings {
            environment,
            server: ServerSettings::from_lookup(&lookup)?,
            jwt: JwtSettings::from_lookup(&lookup, environment)?,
            log: LogSettings::from_lookup(&lookup)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => bail!("Invalid APP_ENV: {other}"),
        }
    }
}

/// gRPC server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl ServerSettings {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: lookup("GRPC_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("GRPC_PORT")
                .unwrap_or_else(|| "50051".to_string())
                .parse()
                .context("Invalid GRPC_PORT")?,
            shutdown_timeout_secs: lookup("SHUTDOWN_TIMEOUT_SECS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("Invalid SHUTDOWN_TIMEOUT_SECS")?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Token signing settings
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: SecretString,
    pub expiration_secs: i64,
}

impl JwtSettings {
    fn from_lookup(
        lookup: &impl Fn(&str) -> Option<String>,
        environment: Environment,
    ) -> Result<Self> {
        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        if !environment.is_development() && secret.len() < MIN_SECRET_BYTES {
            bail!("JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes outside development");
        }

        let expiration_secs: i64 = lookup("JWT_EXPIRATION_SECS")
            .unwrap_or_else(|| "86400".to_string())
            .parse()
            .context("Invalid JWT_EXPIRATION_SECS")?;
        if expiration_secs <= 0 {
            bail!("JWT_EXPIRATION_SECS must be positive");
        }

        Ok(Self {
            secret: SecretString::from(secret),
            expiration_secs,
        })
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiration_secs)
    }

    pub fn secret_len(&self) -> usize {
        self.secret.expose_secret().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// `RUST_LOG` filter directive, when set
    pub filter: Option<String>,
    pub format: LogFormat,
}

impl LogSettings {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let format = match lookup("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Json,
            Some(value) if value == "json" => LogFormat::Json,
            Some(value) if value == "text" => LogFormat::Text,
            Some(other) => bail!("Invalid LOG_FORMAT: {other} (expected json or text)"),
        };

        Ok(Self {
            filter: lookup("RUST_LOG"),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const STRONG_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[("JWT_SECRET", "dev-secret")]).unwrap();

        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.server.address(), "0.0.0.0:50051");
        assert_eq!(settings.server.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(settings.jwt.ttl(), chrono::Duration::hours(24));
        assert_eq!(settings.log.format, LogFormat::Json);
        assert!(settings.log.filter.is_none());
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            ("APP_ENV", "production"),
            ("GRPC_HOST", "127.0.0.1"),
            ("GRPC_PORT", "6000"),
            ("SHUTDOWN_TIMEOUT_SECS", "12"),
            ("JWT_SECRET", STRONG_SECRET),
            ("JWT_EXPIRATION_SECS", "900"),
            ("LOG_FORMAT", "TEXT"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.server.address(), "127.0.0.1:6000");
        assert_eq!(settings.server.shutdown_timeout_secs, 12);
        assert_eq!(settings.jwt.expiration_secs, 900);
        assert_eq!(settings.jwt.secret_len(), STRONG_SECRET.len());
        assert_eq!(settings.log.format, LogFormat::Text);
        assert_eq!(settings.log.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_secret_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected_outside_development() {
        assert!(load(&[("APP_ENV", "production"), ("JWT_SECRET", "short")]).is_err());
        assert!(load(&[("APP_ENV", "staging"), ("JWT_SECRET", "short")]).is_err());
        assert!(load(&[("APP_ENV", "development"), ("JWT_SECRET", "short")]).is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("JWT_SECRET", "s"), ("GRPC_PORT", "not-a-port")]).is_err());
        assert!(load(&[("JWT_SECRET", "s"), ("JWT_EXPIRATION_SECS", "0")]).is_err());
        assert!(load(&[("JWT_SECRET", "s"), ("LOG_FORMAT", "xml")]).is_err());
        assert!(load(&[("JWT_SECRET", "s"), ("APP_ENV", "qa")]).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = load(&[("JWT_SECRET", STRONG_SECRET)]).unwrap();
        assert!(!format!("{settings:?}").contains(STRONG_SECRET));
    }
}
