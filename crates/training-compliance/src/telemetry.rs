use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

const COMPLIANCE_TARGETS: [&str; 2] = ["training_compliance", "training_compliance_api"];

/// Expands a bare level into directives that apply it to the compliance
/// crates only, leaving dependencies at `warn`. Full filter strings pass
/// through untouched.
pub fn default_directives(log_level: &str) -> String {
    let level = log_level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    COMPLIANCE_TARGETS
        .iter()
        .fold(String::from("warn"), |mut directives, target| {
            directives.push_str(&format!(",{target}={level}"));
            directives
        })
}

/// Installs the global compact subscriber; `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level)).map_err(|source| {
            TelemetryError::EnvFilter {
                value: config.log_level.clone(),
                source,
            }
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_levels_are_scoped_to_the_compliance_crates() {
        assert_eq!(
            default_directives(" debug "),
            "warn,training_compliance=debug,training_compliance_api=debug"
        );
        assert_eq!(
            default_directives("info,axum=debug"),
            "info,axum=debug"
        );
    }

    #[test]
    fn invalid_filter_reports_offending_value() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "training_compliance=loud".to_string(),
        };

        match init(&config) {
            Err(TelemetryError::EnvFilter { value, .. }) => {
                assert_eq!(value, "training_compliance=loud");
            }
            other => panic!("expected env filter error, got {other:?}"),
        }
    }
}
