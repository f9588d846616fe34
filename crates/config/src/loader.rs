use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::models::{EndpointConfig, TelemetryConfig, TransportSecurity};
use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};

const DEFAULT_ENV_PREFIX: &str = "TELEMETRY";
const DEFAULT_OTLP_GRPC_PORT: u16 = 4317;

/// Layered configuration loader.
///
/// Precedence, lowest first: built-in defaults, TOML file,
/// `TELEMETRY__SECTION__KEY` variables, standard `OTEL_*` variables.
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env_prefix: String,
    env: Option<HashMap<String, String>>,
    otel_env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env: None,
            otel_env: true,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn with_otel_env(mut self, enabled: bool) -> Self {
        self.otel_env = enabled;
        self
    }

    pub fn load(&self) -> ConfigResult<TelemetryConfig> {
        let mut builder = ConfigBuilder::builder();

        if let Some(ref path) = self.path {
            if !Path::new(path).exists() {
                return Err(ConfigError::File(format!(
                    "配置文件不存在: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("traces.exporters")
                .with_list_parse_key("metrics.exporters")
                .source(self.env.clone()),
        );

        let mut config: TelemetryConfig = builder.build()?.try_deserialize()?;

        if self.otel_env {
            match self.env {
                Some(ref vars) => apply_otel_env(&mut config, |key| vars.get(key).cloned())?,
                None => apply_otel_env(&mut config, |key| std::env::var(key).ok())?,
            }
        }

        config.validate()?;
        Ok(config)
    }
}

impl TelemetryConfig {
    /// Load from an optional TOML file plus the process environment.
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = config_path {
            loader = loader.with_file(path);
        }
        loader.load()
    }

    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: TelemetryConfig = ConfigBuilder::builder()
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Overlay the standard OpenTelemetry SDK environment variables.
pub fn apply_otel_env<F>(config: &mut TelemetryConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = lookup("OTEL_SERVICE_NAME") {
        config.service.name = name;
    }

    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let parsed = endpoint_from_url(&endpoint, config.collector.timeout_ms)?;
        config.collector.address = parsed.address;
        config.collector.security = parsed.security;
    }

    if let Some(insecure) = lookup("OTEL_EXPORTER_OTLP_INSECURE") {
        let insecure = parse_bool("OTEL_EXPORTER_OTLP_INSECURE", &insecure)?;
        config.collector.security = TransportSecurity::from_insecure_flag(insecure);
    }

    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT") {
        config.traces.endpoint = Some(endpoint_from_url(&endpoint, config.collector.timeout_ms)?);
    }

    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT") {
        config.metrics.endpoint = Some(endpoint_from_url(&endpoint, config.collector.timeout_ms)?);
    }

    let mut ratio_sampler = true;
    if let Some(sampler) = lookup("OTEL_TRACES_SAMPLER") {
        match sampler.trim().to_lowercase().as_str() {
            "always_on" => {
                config.traces.sampling_ratio = 1.0;
                config.traces.parent_based = false;
                ratio_sampler = false;
            }
            "always_off" => {
                config.traces.sampling_ratio = 0.0;
                config.traces.parent_based = false;
                ratio_sampler = false;
            }
            "traceidratio" => config.traces.parent_based = false,
            "parentbased_always_on" => {
                config.traces.sampling_ratio = 1.0;
                config.traces.parent_based = true;
                ratio_sampler = false;
            }
            "parentbased_always_off" => {
                config.traces.sampling_ratio = 0.0;
                config.traces.parent_based = true;
                ratio_sampler = false;
            }
            "parentbased_traceidratio" => config.traces.parent_based = true,
            other => {
                return Err(ConfigError::Environment(format!(
                    "OTEL_TRACES_SAMPLER has an unsupported value: {other}"
                )))
            }
        }
    }

    if ratio_sampler {
        if let Some(arg) = lookup("OTEL_TRACES_SAMPLER_ARG") {
            config.traces.sampling_ratio = arg.trim().parse::<f64>().map_err(|e| {
                ConfigError::Environment(format!("OTEL_TRACES_SAMPLER_ARG: {e}"))
            })?;
        }
    }

    if let Some(interval) = lookup("OTEL_METRIC_EXPORT_INTERVAL") {
        config.metrics.export_interval_ms = interval.trim().parse::<u64>().map_err(|e| {
            ConfigError::Environment(format!("OTEL_METRIC_EXPORT_INTERVAL: {e}"))
        })?;
    }

    Ok(())
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::Environment(format!(
            "{key} must be true or false, got {other}"
        ))),
    }
}

/// `http://host:port` style URLs as used by the OTel environment variables.
fn endpoint_from_url(raw: &str, timeout_ms: u64) -> ConfigResult<EndpointConfig> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::Environment(format!("invalid OTLP endpoint {raw}: {e}")))?;

    let security = match url.scheme() {
        "http" => TransportSecurity::Insecure,
        "https" => TransportSecurity::Tls,
        other => {
            return Err(ConfigError::Environment(format!(
                "OTLP endpoint scheme must be http or https, got {other}"
            )))
        }
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConfigError::Environment(format!("OTLP endpoint has no host: {raw}")))?;
    let port = url.port().unwrap_or(DEFAULT_OTLP_GRPC_PORT);

    Ok(EndpointConfig {
        address: format!("{host}:{port}"),
        security,
        timeout_ms,
    })
}
