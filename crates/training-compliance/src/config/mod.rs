use crate::lifecycle::classifier::NoExpiryPolicy;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

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
    pub lifecycle: LifecycleConfig,
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
            lifecycle: LifecycleConfig::from_env()?,
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

/// Longest statistics cache lifetime accepted from the environment (366 days).
pub const MAX_STATISTICS_TTL_MINUTES: i64 = 366 * 24 * 60;

/// Dials for status classification, statistics caching, and the expiry sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Warning window used when a training type does not define its own.
    pub default_warning_days: u32,
    /// Warning window used for employee certificates without a type override.
    pub certificate_warning_days: u32,
    pub no_expiry_policy: NoExpiryPolicy,
    pub statistics_ttl_minutes: i64,
    pub sweep_interval_secs: u64,
    pub priority_base_score: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_warning_days: 30,
            certificate_warning_days: 90,
            no_expiry_policy: NoExpiryPolicy::CompletionTracked,
            statistics_ttl_minutes: 60,
            sweep_interval_secs: 3600,
            priority_base_score: 0,
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let no_expiry_policy = match env::var("COMPLIANCE_NO_EXPIRY_POLICY") {
            Ok(raw) => NoExpiryPolicy::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "COMPLIANCE_NO_EXPIRY_POLICY",
                value: raw,
            })?,
            Err(_) => defaults.no_expiry_policy,
        };

        let statistics_ttl_minutes = parse_var(
            "COMPLIANCE_STATS_TTL_MINUTES",
            defaults.statistics_ttl_minutes,
        )?;
        if !(0..=MAX_STATISTICS_TTL_MINUTES).contains(&statistics_ttl_minutes) {
            return Err(ConfigError::InvalidValue {
                key: "COMPLIANCE_STATS_TTL_MINUTES",
                value: statistics_ttl_minutes.to_string(),
            });
        }

        Ok(Self {
            default_warning_days: parse_var(
                "COMPLIANCE_WARNING_DAYS",
                defaults.default_warning_days,
            )?,
            certificate_warning_days: parse_var(
                "COMPLIANCE_CERTIFICATE_WARNING_DAYS",
                defaults.certificate_warning_days,
            )?,
            no_expiry_policy,
            statistics_ttl_minutes,
            sweep_interval_secs: parse_var(
                "COMPLIANCE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            priority_base_score: parse_var(
                "COMPLIANCE_PRIORITY_BASE_SCORE",
                defaults.priority_base_score,
            )?,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
