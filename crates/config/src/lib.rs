pub mod loader;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use loader::{apply_otel_env, ConfigLoader};
pub use models::{
    BatchConfig, EndpointConfig, ExporterKind, LogFormat, LoggingConfig, MetricsConfig,
    ServiceConfig, TelemetryConfig, TracesConfig, TransportSecurity,
};
pub use validation::{ConfigValidator, ValidationUtils};

/// Configuration error type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error enumeration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => {
                ConfigError::Configuration(format!("missing key: {key}"))
            }
            config::ConfigError::FileParse { uri, cause } => ConfigError::Parse(format!(
                "{}: {cause}",
                uri.unwrap_or_else(|| "<inline>".to_string())
            )),
            other => ConfigError::Configuration(other.to_string()),
        }
    }
}

impl From<url::ParseError> for ConfigError {
    fn from(err: url::ParseError) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::File(err.to_string())
    }
}
