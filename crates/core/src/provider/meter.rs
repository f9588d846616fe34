use std::time::Duration;

use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing::debug;

use crate::error::{TelemetryError, TelemetryResult};
use crate::exporter::MetricExporter;

/// Wraps each metric exporter in a periodic reader running at `interval`.
///
/// A failed push is logged by the SDK and the next cycle runs as scheduled.
pub struct MeterProviderAssembler {
    resource: Resource,
    interval: Duration,
    exporters: Vec<MetricExporter>,
}

impl MeterProviderAssembler {
    pub fn new(resource: Resource, interval: Duration) -> TelemetryResult<Self> {
        if interval.is_zero() {
            return Err(TelemetryError::InvalidExportInterval(interval));
        }

        Ok(Self {
            resource,
            interval,
            exporters: Vec::new(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn with_exporter(mut self, exporter: MetricExporter) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn with_exporters(mut self, exporters: impl IntoIterator<Item = MetricExporter>) -> Self {
        self.exporters.extend(exporters);
        self
    }

    pub fn build(self) -> SdkMeterProvider {
        let mut builder = SdkMeterProvider::builder().with_resource(self.resource);

        for exporter in self.exporters {
            debug!(
                exporter = exporter.label(),
                interval_ms = self.interval.as_millis() as u64,
                "attaching periodic metric reader"
            );
            builder = exporter.attach(builder, self.interval);
        }

        builder.build()
    }
}
