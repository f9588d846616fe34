use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    endpoint::{EndpointConfig, TransportSecurity},
    logging::LoggingConfig,
    service::ServiceConfig,
    signals::{ExporterKind, MetricsConfig, TracesConfig},
};
use crate::validation::{ConfigValidator, ValidationUtils};

/// Top-level telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service: ServiceConfig,
    /// Collector shared by both signals unless a signal overrides it
    pub collector: EndpointConfig,
    pub traces: TracesConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
    /// Overall deadline for flushing and closing both providers
    pub shutdown_timeout_ms: u64,
    /// Install providers and propagator into `opentelemetry::global`
    pub install_global: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            collector: EndpointConfig::default(),
            traces: TracesConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
            shutdown_timeout_ms: 10_000,
            install_global: true,
        }
    }
}

impl TelemetryConfig {
    /// Configuration equivalent to the four-argument start call.
    pub fn for_service(
        service_name: impl Into<String>,
        collector_address: impl Into<String>,
        insecure: bool,
        sampling_ratio: f64,
    ) -> Self {
        let mut config = Self::default();
        config.service = ServiceConfig::named(service_name);
        config.collector = EndpointConfig::new(
            collector_address,
            TransportSecurity::from_insecure_flag(insecure),
        );
        config.traces.sampling_ratio = sampling_ratio;
        config
    }

    pub fn trace_endpoint(&self) -> &EndpointConfig {
        self.traces.endpoint.as_ref().unwrap_or(&self.collector)
    }

    pub fn metric_endpoint(&self) -> &EndpointConfig {
        self.metrics.endpoint.as_ref().unwrap_or(&self.collector)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn tracer_name(&self) -> String {
        self.traces
            .tracer_name
            .clone()
            .unwrap_or_else(|| self.service.name.clone())
    }

    pub fn meter_name(&self) -> String {
        self.metrics
            .meter_name
            .clone()
            .unwrap_or_else(|| self.service.name.clone())
    }
}

impl ConfigValidator for TelemetryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.service.validate()?;
        self.traces.validate()?;
        self.metrics.validate()?;
        self.logging.validate()?;
        ValidationUtils::validate_positive_ms(self.shutdown_timeout_ms, "shutdown_timeout_ms")?;

        // The shared collector only matters when a signal falls back to it.
        let traces_need_collector =
            self.traces.endpoint.is_none() && self.traces.exporters.contains(&ExporterKind::Otlp);
        let metrics_need_collector = self.metrics.endpoint.is_none()
            && self.metrics.exporters.contains(&ExporterKind::Otlp);
        if traces_need_collector || metrics_need_collector {
            self.collector.validate()?;
        }

        Ok(())
    }
}
