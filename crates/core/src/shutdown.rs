use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{FlushError, ProviderError, ShutdownError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Traces,
    Metrics,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Traces => f.write_str("traces"),
            SignalKind::Metrics => f.write_str("metrics"),
        }
    }
}

/// Lifecycle of one provider. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProviderState {
    Uninitialized = 0,
    Active = 1,
    ShuttingDown = 2,
    Shutdown = 3,
}

impl ProviderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ProviderState::Active,
            2 => ProviderState::ShuttingDown,
            3 => ProviderState::Shutdown,
            _ => ProviderState::Uninitialized,
        }
    }
}

/// What a shutdown call did to one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    ShutDown,
    AlreadyShutdown,
    NotInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub traces: ProviderOutcome,
    pub metrics: ProviderOutcome,
}

impl ShutdownReport {
    pub fn is_noop(&self) -> bool {
        self.traces != ProviderOutcome::ShutDown && self.metrics != ProviderOutcome::ShutDown
    }
}

/// Blocking flush/shutdown surface shared by both SDK providers.
pub trait ManagedProvider: Send + Sync {
    fn shutdown(&self) -> OTelSdkResult;
    fn force_flush(&self) -> OTelSdkResult;
}

impl ManagedProvider for SdkTracerProvider {
    fn shutdown(&self) -> OTelSdkResult {
        SdkTracerProvider::shutdown(self)
    }

    fn force_flush(&self) -> OTelSdkResult {
        SdkTracerProvider::force_flush(self)
    }
}

impl ManagedProvider for SdkMeterProvider {
    fn shutdown(&self) -> OTelSdkResult {
        SdkMeterProvider::shutdown(self)
    }

    fn force_flush(&self) -> OTelSdkResult {
        SdkMeterProvider::force_flush(self)
    }
}

/// Owns one provider until it is shut down.
///
/// The async mutex serializes concurrent shutdown callers; whoever takes the
/// provider out performs the shutdown, everyone after sees an empty slot.
pub struct ProviderSlot {
    signal: SignalKind,
    state: AtomicU8,
    provider: Mutex<Option<Arc<dyn ManagedProvider>>>,
}

impl ProviderSlot {
    pub fn active(signal: SignalKind, provider: Arc<dyn ManagedProvider>) -> Self {
        Self {
            signal,
            state: AtomicU8::new(ProviderState::Active as u8),
            provider: Mutex::new(Some(provider)),
        }
    }

    pub fn signal(&self) -> SignalKind {
        self.signal
    }

    pub fn state(&self) -> ProviderState {
        ProviderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ProviderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub async fn shutdown(&self, deadline: Instant) -> Result<ProviderOutcome, ProviderError> {
        let mut guard = self.provider.lock().await;
        let Some(provider) = guard.take() else {
            debug!(signal = %self.signal, "提供者已关闭，跳过");
            return Ok(ProviderOutcome::AlreadyShutdown);
        };

        self.set_state(ProviderState::ShuttingDown);
        let result = run_blocking(self.signal, deadline, move || provider.shutdown()).await;
        // Terminal even on failure: the SDK never accepts a second shutdown.
        self.set_state(ProviderState::Shutdown);

        match result {
            Ok(()) => Ok(ProviderOutcome::ShutDown),
            Err(ProviderError::Sdk {
                source: OTelSdkError::AlreadyShutdown,
                ..
            }) => Ok(ProviderOutcome::AlreadyShutdown),
            Err(e) => Err(e),
        }
    }

    pub async fn force_flush(&self, deadline: Instant) -> Result<(), ProviderError> {
        let provider = self.provider.lock().await.clone();
        match provider {
            Some(provider) => {
                run_blocking(self.signal, deadline, move || provider.force_flush()).await
            }
            None => Err(ProviderError::Sdk {
                signal: self.signal,
                source: OTelSdkError::AlreadyShutdown,
            }),
        }
    }
}

impl fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("signal", &self.signal)
            .field("state", &self.state())
            .finish()
    }
}

/// Upper bound for a caller-supplied timeout; `Duration::MAX` means "no deadline".
const MAX_TIMEOUT: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_TIMEOUT))
        .or_else(|| now.checked_add(Duration::from_secs(86400)))
        .unwrap_or(now)
}

async fn run_blocking<F>(signal: SignalKind, deadline: Instant, op: F) -> Result<(), ProviderError>
where
    F: FnOnce() -> OTelSdkResult + Send + 'static,
{
    let budget = deadline.saturating_duration_since(Instant::now());
    let task = tokio::task::spawn_blocking(op);
    if budget.is_zero() {
        // Deadline spent by an earlier provider; the operation still runs detached.
        return Err(ProviderError::Timeout {
            signal,
            timeout: budget,
        });
    }

    match timeout_at(deadline, task).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(source))) => Err(ProviderError::Sdk { signal, source }),
        Ok(Err(join)) => Err(ProviderError::Join {
            signal,
            message: join.to_string(),
        }),
        Err(_) => Err(ProviderError::Timeout {
            signal,
            timeout: budget,
        }),
    }
}

struct HandleInner {
    traces: Option<Arc<ProviderSlot>>,
    metrics: Option<Arc<ProviderSlot>>,
    default_timeout: Duration,
}

/// Composite, idempotent shutdown for the tracer and meter providers.
///
/// Cheap to clone; every clone drives the same slots.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<HandleInner>,
}

impl ShutdownHandle {
    pub fn new(
        traces: Option<Arc<ProviderSlot>>,
        metrics: Option<Arc<ProviderSlot>>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                traces,
                metrics,
                default_timeout,
            }),
        }
    }

    pub fn state(&self, signal: SignalKind) -> ProviderState {
        self.slot(signal)
            .map(|slot| slot.state())
            .unwrap_or(ProviderState::Uninitialized)
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    fn slot(&self, signal: SignalKind) -> Option<&Arc<ProviderSlot>> {
        match signal {
            SignalKind::Traces => self.inner.traces.as_ref(),
            SignalKind::Metrics => self.inner.metrics.as_ref(),
        }
    }

    pub async fn shutdown(&self) -> Result<ShutdownReport, ShutdownError> {
        self.shutdown_with_timeout(self.inner.default_timeout).await
    }

    /// Shuts down traces first, then metrics, under one deadline.
    /// A failure in one provider never skips the other.
    pub async fn shutdown_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<ShutdownReport, ShutdownError> {
        let deadline = deadline_after(timeout);
        let mut failures = Vec::new();

        let traces = shutdown_slot(self.inner.traces.as_deref(), deadline, &mut failures).await;
        let metrics = shutdown_slot(self.inner.metrics.as_deref(), deadline, &mut failures).await;
        let report = ShutdownReport { traces, metrics };

        if failures.is_empty() {
            if !report.is_noop() {
                info!(traces = ?report.traces, metrics = ?report.metrics, "遥测提供者已关闭");
            }
            Ok(report)
        } else {
            warn!(failures = failures.len(), "遥测提供者关闭时出现错误");
            Err(ShutdownError { failures })
        }
    }

    pub async fn force_flush(&self) -> Result<(), FlushError> {
        self.force_flush_with_timeout(self.inner.default_timeout)
            .await
    }

    pub async fn force_flush_with_timeout(&self, timeout: Duration) -> Result<(), FlushError> {
        let deadline = deadline_after(timeout);
        let mut failures = Vec::new();

        for slot in [self.inner.traces.as_deref(), self.inner.metrics.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = slot.force_flush(deadline).await {
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlushError { failures })
        }
    }
}

async fn shutdown_slot(
    slot: Option<&ProviderSlot>,
    deadline: Instant,
    failures: &mut Vec<ProviderError>,
) -> ProviderOutcome {
    let Some(slot) = slot else {
        return ProviderOutcome::NotInstalled;
    };

    match slot.shutdown(deadline).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(signal = %slot.signal(), error = %e, "关闭提供者失败");
            failures.push(e);
            ProviderOutcome::ShutDown
        }
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("traces", &self.state(SignalKind::Traces))
            .field("metrics", &self.state(SignalKind::Metrics))
            .field("default_timeout", &self.inner.default_timeout)
            .finish()
    }
}
