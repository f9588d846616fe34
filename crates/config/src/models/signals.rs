use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::endpoint::EndpointConfig;
use crate::validation::{ConfigValidator, ValidationUtils};

/// Destination of a signal pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// OTLP over gRPC to the collector endpoint
    Otlp,
    /// Human-readable output on stdout, for local debugging
    Stdout,
}

impl std::str::FromStr for ExporterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "otlp" => Ok(ExporterKind::Otlp),
            "stdout" | "console" => Ok(ExporterKind::Stdout),
            _ => Err(format!(
                "Invalid exporter: {s}. Valid exporters: otlp, stdout"
            )),
        }
    }
}

/// Span batching knobs for the batch span processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub max_queue_size: usize,
    pub scheduled_delay_ms: u64,
    pub max_export_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            scheduled_delay_ms: 5_000,
            max_export_batch_size: 512,
        }
    }
}

impl BatchConfig {
    pub fn scheduled_delay(&self) -> Duration {
        Duration::from_millis(self.scheduled_delay_ms)
    }
}

impl ConfigValidator for BatchConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.max_queue_size, "traces.batch.max_queue_size")?;
        ValidationUtils::validate_count(
            self.max_export_batch_size,
            "traces.batch.max_export_batch_size",
        )?;
        ValidationUtils::validate_positive_ms(
            self.scheduled_delay_ms,
            "traces.batch.scheduled_delay_ms",
        )?;

        if self.max_export_batch_size > self.max_queue_size {
            return Err(crate::ConfigError::Validation(
                "traces.batch.max_export_batch_size must be less than or equal to max_queue_size"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TracesConfig {
    pub exporters: Vec<ExporterKind>,
    /// Overrides the shared collector endpoint for spans
    pub endpoint: Option<EndpointConfig>,
    /// Fraction of new traces recorded, in [0.0, 1.0]
    pub sampling_ratio: f64,
    /// Child spans follow the parent's sampling decision
    pub parent_based: bool,
    pub batch: BatchConfig,
    /// Instrumentation scope name of the tracer handle; the service name when unset
    pub tracer_name: Option<String>,
}

impl Default for TracesConfig {
    fn default() -> Self {
        Self {
            exporters: vec![ExporterKind::Otlp],
            endpoint: None,
            sampling_ratio: 1.0,
            parent_based: true,
            batch: BatchConfig::default(),
            tracer_name: None,
        }
    }
}

impl ConfigValidator for TracesConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_ratio(self.sampling_ratio, "traces.sampling_ratio")?;
        self.batch.validate()?;
        if let Some(ref endpoint) = self.endpoint {
            endpoint.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub exporters: Vec<ExporterKind>,
    /// Overrides the shared collector endpoint for metrics
    pub endpoint: Option<EndpointConfig>,
    /// Periodic reader cadence
    pub export_interval_ms: u64,
    /// Instrumentation scope name of the meter handle; the service name when unset
    pub meter_name: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporters: vec![ExporterKind::Otlp],
            endpoint: None,
            export_interval_ms: 60_000,
            meter_name: None,
        }
    }
}

impl MetricsConfig {
    pub fn export_interval(&self) -> Duration {
        Duration::from_millis(self.export_interval_ms)
    }
}

impl ConfigValidator for MetricsConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_positive_ms(
            self.export_interval_ms,
            "metrics.export_interval_ms",
        )?;
        if let Some(ref endpoint) = self.endpoint {
            endpoint.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traces_config_rejects_out_of_range_ratio() {
        let mut config = TracesConfig::default();
        assert!(config.validate().is_ok());

        config.sampling_ratio = 1.5;
        assert!(config.validate().is_err());

        config.sampling_ratio = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_config_validation() {
        let config = BatchConfig::default();
        assert!(config.validate().is_ok());

        let invalid = BatchConfig {
            max_queue_size: 10,
            max_export_batch_size: 20,
            ..BatchConfig::default()
        };
        assert!(invalid.validate().is_err());

        let zero_delay = BatchConfig {
            scheduled_delay_ms: 0,
            ..BatchConfig::default()
        };
        assert!(zero_delay.validate().is_err());
    }

    #[test]
    fn test_metrics_config_rejects_zero_interval() {
        let mut config = MetricsConfig::default();
        assert_eq!(config.export_interval(), Duration::from_secs(60));

        config.export_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exporter_kind_from_str() {
        assert_eq!("OTLP".parse::<ExporterKind>().unwrap(), ExporterKind::Otlp);
        assert_eq!("console".parse::<ExporterKind>().unwrap(), ExporterKind::Stdout);
        assert!("jaeger".parse::<ExporterKind>().is_err());
    }
}
