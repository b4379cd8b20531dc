use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::workflows::completeness::EngineSettings;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub checks: CheckConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            checks: CheckConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Completeness-check defaults and the optional rule catalog to load at startup.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub tolerance: Decimal,
    pub treat_na_as_missing: bool,
    pub rules_path: Option<PathBuf>,
}

impl CheckConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let tolerance = match env::var("CHECK_TOLERANCE") {
            Ok(raw) => parse_tolerance(&raw)?,
            Err(_) => EngineSettings::default_tolerance(),
        };

        let treat_na_as_missing = match env::var("CHECK_TREAT_NA_AS_MISSING") {
            Ok(raw) => parse_flag("CHECK_TREAT_NA_AS_MISSING", &raw)?,
            Err(_) => true,
        };

        let rules_path = env::var("RULES_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            tolerance,
            treat_na_as_missing,
            rules_path,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tolerance: self.tolerance,
            treat_na_as_missing: self.treat_na_as_missing,
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            tolerance: settings.tolerance,
            treat_na_as_missing: settings.treat_na_as_missing,
            rules_path: None,
        }
    }
}

fn parse_tolerance(raw: &str) -> Result<Decimal, ConfigError> {
    match Decimal::from_str(raw.trim()) {
        Ok(value) if value >= Decimal::ZERO => Ok(value),
        _ => Err(ConfigError::InvalidTolerance(raw.to_string())),
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTolerance(String),
    InvalidFlag { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTolerance(value) => write!(
                f,
                "CHECK_TOLERANCE must be a non-negative decimal (found '{}')",
                value
            ),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{} must be true or false (found '{}')", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTolerance(_)
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
