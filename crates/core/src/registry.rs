use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::propagation::{Extractor, Injector, TextMapCompositePropagator};
use opentelemetry::Context;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

use crate::error::{FlushError, ShutdownError};
use crate::propagation;
use crate::resource::ServiceIdentity;
use crate::shutdown::{ProviderSlot, ProviderState, ShutdownHandle, ShutdownReport, SignalKind};

/// Live tracer provider plus the named tracer handed to callers.
#[derive(Clone)]
pub struct TracingPipeline {
    pub(crate) provider: SdkTracerProvider,
    pub(crate) tracer: SdkTracer,
    pub(crate) slot: Arc<ProviderSlot>,
}

impl TracingPipeline {
    pub(crate) fn new(provider: SdkTracerProvider, tracer: SdkTracer) -> Self {
        let slot = Arc::new(ProviderSlot::active(
            SignalKind::Traces,
            Arc::new(provider.clone()),
        ));
        Self {
            provider,
            tracer,
            slot,
        }
    }

    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }

    pub fn provider(&self) -> &SdkTracerProvider {
        &self.provider
    }

    pub fn state(&self) -> ProviderState {
        self.slot.state()
    }

    /// Shutdown handle covering only this pipeline.
    pub fn shutdown_handle(&self, default_timeout: Duration) -> ShutdownHandle {
        ShutdownHandle::new(Some(self.slot.clone()), None, default_timeout)
    }
}

impl fmt::Debug for TracingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingPipeline")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct MetricsPipeline {
    pub(crate) provider: SdkMeterProvider,
    pub(crate) meter: Meter,
    pub(crate) request_counter: Counter<u64>,
    pub(crate) slot: Arc<ProviderSlot>,
}

impl MetricsPipeline {
    pub(crate) fn new(provider: SdkMeterProvider, meter: Meter, request_counter: Counter<u64>) -> Self {
        let slot = Arc::new(ProviderSlot::active(
            SignalKind::Metrics,
            Arc::new(provider.clone()),
        ));
        Self {
            provider,
            meter,
            request_counter,
            slot,
        }
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    pub fn state(&self) -> ProviderState {
        self.slot.state()
    }
}

/// Everything a started service needs: identity, handles and shutdown.
///
/// Clones share the same providers.
#[derive(Clone)]
pub struct Telemetry {
    identity: ServiceIdentity,
    propagator: Arc<TextMapCompositePropagator>,
    tracing: TracingPipeline,
    metrics: MetricsPipeline,
    shutdown: ShutdownHandle,
}

impl Telemetry {
    pub(crate) fn new(
        identity: ServiceIdentity,
        propagator: TextMapCompositePropagator,
        tracing: TracingPipeline,
        metrics: MetricsPipeline,
        shutdown_timeout: Duration,
    ) -> Self {
        let shutdown = ShutdownHandle::new(
            Some(tracing.slot.clone()),
            Some(metrics.slot.clone()),
            shutdown_timeout,
        );
        Self {
            identity,
            propagator: Arc::new(propagator),
            tracing,
            metrics,
            shutdown,
        }
    }

    pub fn service(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn tracer(&self) -> &SdkTracer {
        self.tracing.tracer()
    }

    pub fn meter(&self) -> &Meter {
        self.metrics.meter()
    }

    /// `http_server_duration_count`
    pub fn request_counter(&self) -> &Counter<u64> {
        &self.metrics.request_counter
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        self.tracing.provider()
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        self.metrics.provider()
    }

    pub fn propagator(&self) -> &TextMapCompositePropagator {
        &self.propagator
    }

    pub fn inject_context(&self, cx: &Context, carrier: &mut dyn Injector) {
        propagation::inject_context(self.propagator.as_ref(), cx, carrier);
    }

    pub fn extract_context(&self, carrier: &dyn Extractor) -> Context {
        propagation::extract_context(self.propagator.as_ref(), carrier)
    }

    pub fn state(&self, signal: SignalKind) -> ProviderState {
        self.shutdown.state(signal)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub async fn shutdown(&self) -> Result<ShutdownReport, ShutdownError> {
        self.shutdown.shutdown().await
    }

    pub async fn shutdown_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<ShutdownReport, ShutdownError> {
        self.shutdown.shutdown_with_timeout(timeout).await
    }

    /// Export whatever is buffered now instead of waiting for the next cycle.
    /// Export failures that would otherwise only be logged surface here.
    pub async fn force_flush(&self) -> Result<(), FlushError> {
        self.shutdown.force_flush().await
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("service", &self.identity.name)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
