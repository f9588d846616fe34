use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use telemetry_config::BatchConfig;
use tracing::debug;

use crate::exporter::TraceExporter;
use crate::sampling::SamplingPolicy;

/// Composes exporters, resource and sampler into a tracer provider.
///
/// Every exporter gets its own batch span processor.
pub struct TracerProviderAssembler {
    resource: Resource,
    sampling: SamplingPolicy,
    parent_based: bool,
    batch: BatchConfig,
    exporters: Vec<TraceExporter>,
}

impl TracerProviderAssembler {
    pub fn new(resource: Resource, sampling: SamplingPolicy) -> Self {
        Self {
            resource,
            sampling,
            parent_based: true,
            batch: BatchConfig::default(),
            exporters: Vec::new(),
        }
    }

    pub fn with_parent_based(mut self, parent_based: bool) -> Self {
        self.parent_based = parent_based;
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_exporter(mut self, exporter: TraceExporter) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn with_exporters(mut self, exporters: impl IntoIterator<Item = TraceExporter>) -> Self {
        self.exporters.extend(exporters);
        self
    }

    pub fn build(self) -> SdkTracerProvider {
        let mut builder = SdkTracerProvider::builder()
            .with_resource(self.resource)
            .with_sampler(self.sampling.to_sampler(self.parent_based));

        for exporter in self.exporters {
            debug!(exporter = exporter.label(), "attaching span exporter");
            builder = exporter.attach(builder, &self.batch);
        }

        builder.build()
    }
}
