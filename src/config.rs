//! Environment-driven configuration, read once at startup.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use tracing::Level;

// ─── Defaults ────────────────────────────────────────────────────

const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_APP_NAME: &str = "k8s-argocd-demo";
const DEFAULT_ENVIRONMENT: &str = "dev";
const DEFAULT_WELCOME_MESSAGE: &str = "Hello from Kubernetes!";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

// ─── Errors ──────────────────────────────────────────────────────

/// Anything here aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FAIL_RATE must be a number, got {0:?}")]
    InvalidFailRate(String),

    #[error("LOG_LEVEL {0:?} is not one of TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL")]
    InvalidLogLevel(String),

    #[error("HOST must be an IP address, got {0:?}")]
    InvalidHost(String),

    #[error("PORT must be an integer in 0..=65535, got {0:?}")]
    InvalidPort(String),
}

// ─── Config ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: Level,
    pub app_name: String,
    pub environment: String,
    pub welcome_message: String,
    /// Readiness failure duty cycle, nominally 0.0 – 1.0.
    pub fail_rate: f64,
    pub listen: SocketAddr,
}

impl Config {
    /// Read every setting from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys fall back
    /// to their defaults; present-but-malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let log_level = parse_log_level(&get("LOG_LEVEL", DEFAULT_LOG_LEVEL))?;

        let fail_rate = match lookup("FAIL_RATE") {
            Some(raw) => parse_fail_rate(&raw)?,
            None => 0.0,
        };

        let host_raw = get("HOST", DEFAULT_HOST);
        let host: IpAddr = host_raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidHost(host_raw.clone()))?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            log_level,
            app_name: get("APP_NAME", DEFAULT_APP_NAME),
            environment: get("ENVIRONMENT", DEFAULT_ENVIRONMENT),
            welcome_message: get("WELCOME_MESSAGE", DEFAULT_WELCOME_MESSAGE),
            fail_rate,
            listen: SocketAddr::new(host, port),
        })
    }

    /// `FAIL_RATE` parsed fine but sits outside the meaningful range.
    pub fn fail_rate_out_of_range(&self) -> bool {
        !(0.0..=1.0).contains(&self.fail_rate)
    }
}

fn parse_fail_rate(raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ConfigError::InvalidFailRate(raw.to_owned())),
    }
}

/// Accepts the level names operators already use with other runtimes.
fn parse_log_level(raw: &str) -> Result<Level, ConfigError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Ok(Level::ERROR),
        _ => Err(ConfigError::InvalidLogLevel(raw.to_owned())),
    }
}
