//! OpenTelemetry bootstrap for a single service.
//!
//! [`TelemetryBuilder`] builds the W3C propagator, a tracer provider and a
//! meter provider in that order, optionally installs them into
//! `opentelemetry::global`, and returns a [`Telemetry`] registry whose
//! [`ShutdownHandle`] tears both providers down exactly once.

pub mod error;
pub mod exporter;
pub mod instruments;
pub mod lifecycle;
pub mod logging;
pub mod propagation;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod sampling;
pub mod shutdown;

pub use error::{
    FlushError, ProviderError, ShutdownError, StartError, TelemetryError, TelemetryResult,
};
pub use exporter::{
    build_metric_exporter, build_trace_exporter, ConfiguredExporters, ExporterFactory,
    MetricExporter, TraceExporter,
};
pub use lifecycle::{start, TelemetryBuilder};
pub use logging::{init_logging, LoggingHandle};
pub use propagation::build_propagator;
pub use provider::{MeterProviderAssembler, TracerProviderAssembler};
pub use registry::{MetricsPipeline, Telemetry, TracingPipeline};
pub use resource::{build_resource, ServiceIdentity};
pub use sampling::SamplingPolicy;
pub use shutdown::{
    ManagedProvider, ProviderOutcome, ProviderSlot, ProviderState, ShutdownHandle, ShutdownReport,
    SignalKind,
};

pub use telemetry_config::TelemetryConfig;
