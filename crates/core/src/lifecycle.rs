use std::sync::Arc;

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, InstrumentationScope};
use opentelemetry_sdk::Resource;
use telemetry_config::{ConfigValidator, TelemetryConfig};
use tracing::{debug, info, warn};

use crate::error::{StartError, TelemetryError, TelemetryResult};
use crate::exporter::{ConfiguredExporters, ExporterFactory};
use crate::instruments;
use crate::propagation::build_propagator;
use crate::provider::{MeterProviderAssembler, TracerProviderAssembler};
use crate::registry::{MetricsPipeline, Telemetry, TracingPipeline};
use crate::resource::{build_resource, ServiceIdentity};
use crate::sampling::SamplingPolicy;

const INSTRUMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ordered construction of the propagator, tracer provider and meter provider.
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    factory: Arc<dyn ExporterFactory>,
}

impl TelemetryBuilder {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            factory: Arc::new(ConfiguredExporters),
        }
    }

    pub fn with_exporter_factory(mut self, factory: impl ExporterFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Must run inside a Tokio runtime when OTLP exporters are configured.
    ///
    /// A metrics failure leaves the tracing pipeline running; it comes back
    /// inside [`StartError::Metrics`].
    pub fn start(self) -> Result<Telemetry, StartError> {
        // 所有校验在修改全局状态之前完成
        self.config
            .validate()
            .map_err(|e| StartError::Configuration(e.into()))?;
        let sampling = SamplingPolicy::ratio(self.config.traces.sampling_ratio)
            .map_err(StartError::Configuration)?;
        let interval = self.config.metrics.export_interval();
        if interval.is_zero() {
            return Err(StartError::Configuration(
                TelemetryError::InvalidExportInterval(interval),
            ));
        }

        let identity = ServiceIdentity::from_config(&self.config.service);
        let resource = build_resource(&identity);
        info!(
            service = %identity.name,
            sampling_ratio = sampling.as_ratio(),
            install_global = self.config.install_global,
            "开始初始化遥测"
        );

        if self.config.install_global {
            global::set_text_map_propagator(build_propagator());
        }

        let tracing = self
            .start_tracing(resource.clone(), sampling)
            .map_err(StartError::Tracing)?;

        let metrics = match self.start_metrics(resource, interval) {
            Ok(metrics) => metrics,
            Err(source) => {
                warn!(error = %source, "指标管道初始化失败，追踪管道保持运行");
                return Err(StartError::Metrics {
                    source,
                    tracing: Box::new(tracing),
                });
            }
        };

        info!(service = %identity.name, "遥测初始化完成");
        Ok(Telemetry::new(
            identity,
            build_propagator(),
            tracing,
            metrics,
            self.config.shutdown_timeout(),
        ))
    }

    fn start_tracing(
        &self,
        resource: Resource,
        sampling: SamplingPolicy,
    ) -> TelemetryResult<TracingPipeline> {
        let exporters = self.factory.trace_exporters(&self.config)?;
        if exporters.is_empty() {
            warn!("未配置追踪导出器，span将不会被导出");
        }

        let provider = TracerProviderAssembler::new(resource, sampling)
            .with_parent_based(self.config.traces.parent_based)
            .with_batch(self.config.traces.batch.clone())
            .with_exporters(exporters)
            .build();

        if self.config.install_global {
            global::set_tracer_provider(provider.clone());
        }

        let scope = InstrumentationScope::builder(self.config.tracer_name())
            .with_version(INSTRUMENTATION_VERSION)
            .build();
        let tracer = provider.tracer_with_scope(scope);
        debug!(tracer = %self.config.tracer_name(), "追踪管道已就绪");

        Ok(TracingPipeline::new(provider, tracer))
    }

    fn start_metrics(
        &self,
        resource: Resource,
        interval: std::time::Duration,
    ) -> TelemetryResult<MetricsPipeline> {
        let exporters = self.factory.metric_exporters(&self.config)?;
        if exporters.is_empty() {
            warn!("未配置指标导出器，指标将不会被导出");
        }

        let provider = MeterProviderAssembler::new(resource, interval)?
            .with_exporters(exporters)
            .build();

        if self.config.install_global {
            global::set_meter_provider(provider.clone());
        }

        let scope = InstrumentationScope::builder(self.config.meter_name())
            .with_version(INSTRUMENTATION_VERSION)
            .build();
        let meter = provider.meter_with_scope(scope);
        let request_counter = instruments::request_counter(&meter);
        debug!(meter = %self.config.meter_name(), "指标管道已就绪");

        Ok(MetricsPipeline::new(provider, meter, request_counter))
    }
}

/// Four-argument form: OTLP for both signals, shared collector, globals installed.
pub fn start(
    service_name: &str,
    collector_endpoint: &str,
    insecure: bool,
    sampling_ratio: f64,
) -> Result<Telemetry, StartError> {
    TelemetryBuilder::new(TelemetryConfig::for_service(
        service_name,
        collector_endpoint,
        insecure,
        sampling_ratio,
    ))
    .start()
}
