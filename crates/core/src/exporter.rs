use std::fmt;
use std::time::Duration;

use opentelemetry_otlp::tonic_types::transport::ClientTlsConfig;
use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SpanExporter, TracerProviderBuilder,
};
use telemetry_config::{BatchConfig, EndpointConfig, ExporterKind, TelemetryConfig, TransportSecurity};
use tracing::debug;

use crate::error::{TelemetryError, TelemetryResult};

type AttachSpans = Box<dyn FnOnce(TracerProviderBuilder, &BatchConfig) -> TracerProviderBuilder + Send>;
type AttachMetrics = Box<dyn FnOnce(MeterProviderBuilder, Duration) -> MeterProviderBuilder + Send>;

/// A span exporter, ready to be wrapped in its own batch processor.
pub struct TraceExporter {
    label: String,
    attach: AttachSpans,
}

impl TraceExporter {
    pub fn new<E>(label: impl Into<String>, exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        Self {
            label: label.into(),
            attach: Box::new(move |builder: TracerProviderBuilder, batch: &BatchConfig| {
                let processor = BatchSpanProcessor::builder(exporter)
                    .with_batch_config(
                        BatchConfigBuilder::default()
                            .with_max_queue_size(batch.max_queue_size)
                            .with_scheduled_delay(batch.scheduled_delay())
                            .with_max_export_batch_size(batch.max_export_batch_size)
                            .build(),
                    )
                    .build();
                builder.with_span_processor(processor)
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn attach(
        self,
        builder: TracerProviderBuilder,
        batch: &BatchConfig,
    ) -> TracerProviderBuilder {
        (self.attach)(builder, batch)
    }
}

impl fmt::Debug for TraceExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TraceExporter").field(&self.label).finish()
    }
}

/// A push metric exporter, ready to be driven by a periodic reader.
pub struct MetricExporter {
    label: String,
    attach: AttachMetrics,
}

impl MetricExporter {
    pub fn new<E>(label: impl Into<String>, exporter: E) -> Self
    where
        E: PushMetricExporter,
    {
        Self {
            label: label.into(),
            attach: Box::new(move |builder: MeterProviderBuilder, interval: Duration| {
                let reader = PeriodicReader::builder(exporter)
                    .with_interval(interval)
                    .build();
                builder.with_reader(reader)
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn attach(
        self,
        builder: MeterProviderBuilder,
        interval: Duration,
    ) -> MeterProviderBuilder {
        (self.attach)(builder, interval)
    }
}

impl fmt::Debug for MetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MetricExporter").field(&self.label).finish()
    }
}

/// The tonic channel is created lazily but still spawns onto the current
/// Tokio runtime, so construction outside one must fail instead of abort.
fn ensure_runtime() -> TelemetryResult<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|e| TelemetryError::RuntimeUnavailable(e.to_string()))
}

fn endpoint_uri(endpoint: &EndpointConfig) -> TelemetryResult<String> {
    endpoint
        .uri()
        .map_err(|e| TelemetryError::InvalidEndpoint(e.to_string()))
}

fn tls_config(endpoint: &EndpointConfig) -> Option<ClientTlsConfig> {
    match endpoint.security {
        TransportSecurity::Tls => Some(ClientTlsConfig::new().with_native_roots()),
        TransportSecurity::Insecure => None,
    }
}

/// OTLP/gRPC span exporter bound to `endpoint`. Connects lazily.
pub fn build_trace_exporter(endpoint: &EndpointConfig) -> TelemetryResult<TraceExporter> {
    let uri = endpoint_uri(endpoint)?;
    ensure_runtime()?;

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(uri.clone())
        .with_timeout(endpoint.timeout());
    if let Some(tls) = tls_config(endpoint) {
        builder = builder.with_tls_config(tls);
    }

    let exporter = builder
        .build()
        .map_err(|e| TelemetryError::TraceExporter(format!("{uri}: {e}")))?;

    debug!(endpoint = %uri, security = ?endpoint.security, "OTLP span exporter created");
    Ok(TraceExporter::new(format!("otlp {uri}"), exporter))
}

/// OTLP/gRPC metric exporter bound to `endpoint`. Connects lazily.
pub fn build_metric_exporter(endpoint: &EndpointConfig) -> TelemetryResult<MetricExporter> {
    let uri = endpoint_uri(endpoint)?;
    ensure_runtime()?;

    let mut builder = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(uri.clone())
        .with_timeout(endpoint.timeout());
    if let Some(tls) = tls_config(endpoint) {
        builder = builder.with_tls_config(tls);
    }

    let exporter = builder
        .build()
        .map_err(|e| TelemetryError::MetricExporter(format!("{uri}: {e}")))?;

    debug!(endpoint = %uri, security = ?endpoint.security, "OTLP metric exporter created");
    Ok(MetricExporter::new(format!("otlp {uri}"), exporter))
}

pub fn stdout_trace_exporter() -> TraceExporter {
    TraceExporter::new("stdout", opentelemetry_stdout::SpanExporter::default())
}

pub fn stdout_metric_exporter() -> MetricExporter {
    MetricExporter::new("stdout", opentelemetry_stdout::MetricExporter::default())
}

/// Source of exporters for the lifecycle manager.
///
/// Trace exporters are always requested first; if that fails the metric
/// side is never asked.
pub trait ExporterFactory: Send + Sync {
    fn trace_exporters(&self, config: &TelemetryConfig) -> TelemetryResult<Vec<TraceExporter>>;
    fn metric_exporters(&self, config: &TelemetryConfig) -> TelemetryResult<Vec<MetricExporter>>;
}

/// Builds whatever `traces.exporters` / `metrics.exporters` list.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredExporters;

impl ExporterFactory for ConfiguredExporters {
    fn trace_exporters(&self, config: &TelemetryConfig) -> TelemetryResult<Vec<TraceExporter>> {
        config
            .traces
            .exporters
            .iter()
            .map(|kind| match kind {
                ExporterKind::Otlp => build_trace_exporter(config.trace_endpoint()),
                ExporterKind::Stdout => Ok(stdout_trace_exporter()),
            })
            .collect()
    }

    fn metric_exporters(&self, config: &TelemetryConfig) -> TelemetryResult<Vec<MetricExporter>> {
        config
            .metrics
            .exporters
            .iter()
            .map(|kind| match kind {
                ExporterKind::Otlp => build_metric_exporter(config.metric_endpoint()),
                ExporterKind::Stdout => Ok(stdout_metric_exporter()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insecure(address: &str) -> EndpointConfig {
        EndpointConfig::new(address, TransportSecurity::Insecure)
    }

    #[tokio::test]
    async fn test_exporters_build_without_a_reachable_collector() {
        let endpoint = insecure("collector.invalid:4317");

        let trace = build_trace_exporter(&endpoint).unwrap();
        assert_eq!(trace.label(), "otlp http://collector.invalid:4317");

        let metric = build_metric_exporter(&endpoint).unwrap();
        assert_eq!(metric.label(), "otlp http://collector.invalid:4317");
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_an_error() {
        for bad in ["", "collector", "http://collector:4317", "collector:notaport"] {
            let result = build_trace_exporter(&insecure(bad));
            assert!(
                matches!(result, Err(TelemetryError::InvalidEndpoint(_))),
                "{bad:?} should be rejected"
            );
            assert!(matches!(
                build_metric_exporter(&insecure(bad)),
                Err(TelemetryError::InvalidEndpoint(_))
            ));
        }
    }

    #[test]
    fn test_missing_runtime_is_an_error_not_a_panic() {
        let result = build_trace_exporter(&insecure("collector:4317"));
        assert!(matches!(result, Err(TelemetryError::RuntimeUnavailable(_))));

        let result = build_metric_exporter(&insecure("collector:4317"));
        assert!(matches!(result, Err(TelemetryError::RuntimeUnavailable(_))));
    }

    #[tokio::test]
    async fn test_configured_exporters_follow_config() {
        let mut config = TelemetryConfig::for_service("svc", "collector:4317", true, 1.0);
        config.traces.exporters = vec![ExporterKind::Otlp, ExporterKind::Stdout];
        config.metrics.exporters = vec![ExporterKind::Stdout];

        let traces = ConfiguredExporters.trace_exporters(&config).unwrap();
        let labels: Vec<_> = traces.iter().map(TraceExporter::label).collect();
        assert_eq!(labels, vec!["otlp http://collector:4317", "stdout"]);

        let metrics = ConfiguredExporters.metric_exporters(&config).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].label(), "stdout");
    }
}
