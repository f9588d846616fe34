use opentelemetry_sdk::trace::SdkTracer;
use telemetry_config::{LogFormat, LoggingConfig};
use tracing::{info, Dispatch};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::error::{TelemetryError, TelemetryResult};

type BridgeLayer = Option<OpenTelemetryLayer<Registry, SdkTracer>>;

/// Slot for the OpenTelemetry bridge of an installed subscriber.
///
/// The subscriber starts without a bridge so that events emitted while
/// telemetry itself is starting are already logged.
#[derive(Clone)]
pub struct LoggingHandle {
    bridge: reload::Handle<BridgeLayer, Registry>,
    bridge_spans: bool,
}

impl LoggingHandle {
    /// Record every `tracing` span as an OpenTelemetry span from now on.
    ///
    /// Returns `false` when `bridge_spans` is disabled.
    pub fn attach_tracer(&self, tracer: SdkTracer) -> TelemetryResult<bool> {
        if !self.bridge_spans {
            return Ok(false);
        }

        self.bridge
            .reload(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
            .map_err(|e| TelemetryError::Logging(format!("挂载OpenTelemetry桥接失败: {e}")))?;

        info!("tracing span 已桥接到 OpenTelemetry");
        Ok(true)
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("bridge_spans", &self.bridge_spans)
            .finish_non_exhaustive()
    }
}

/// Install the process-wide `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level`. Attach the tracer later through
/// [`LoggingHandle::attach_tracer`]. Fails instead of panicking when a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> TelemetryResult<LoggingHandle> {
    let (dispatch, handle) = build_dispatch(config)?;
    dispatch
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))?;

    info!(
        logging.format = ?config.format,
        logging.level = %config.level,
        "结构化日志已初始化"
    );

    Ok(handle)
}

fn build_dispatch(config: &LoggingConfig) -> TelemetryResult<(Dispatch, LoggingHandle)> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TelemetryError::Logging(format!("无效的日志级别 {}: {e}", config.level)))?;

    let (bridge_layer, bridge) = reload::Layer::new(BridgeLayer::None);
    let handle = LoggingHandle {
        bridge,
        bridge_spans: config.bridge_spans,
    };

    let registry = tracing_subscriber::registry()
        .with(bridge_layer)
        .with(env_filter);

    let dispatch = match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_id)
                .with_thread_names(config.include_thread_name)
                .with_span_events(FmtSpan::CLOSE);

            Dispatch::new(registry.with(fmt_layer))
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_id)
                .with_thread_names(config.include_thread_name);

            Dispatch::new(registry.with(fmt_layer))
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_ids(config.include_thread_id)
                .with_thread_names(config.include_thread_name);

            Dispatch::new(registry.with(fmt_layer))
        }
    };

    Ok((dispatch, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use tracing::info_span;

    fn rust_log_overrides() -> bool {
        std::env::var("RUST_LOG").is_ok()
    }

    #[test]
    fn test_invalid_directive_is_reported() {
        if rust_log_overrides() {
            return;
        }
        let config = LoggingConfig {
            level: "info,telemetry_core=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            build_dispatch(&config),
            Err(TelemetryError::Logging(_))
        ));
    }

    #[test]
    fn test_spans_are_bridged_only_after_attach() {
        if rust_log_overrides() {
            return;
        }
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let config = LoggingConfig {
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        };
        let (dispatch, handle) = build_dispatch(&config).unwrap();

        tracing::dispatcher::with_default(&dispatch, || {
            info_span!("before-attach").in_scope(|| info!("logged without a tracer"));
            assert!(handle.attach_tracer(provider.tracer("logging")).unwrap());
            info_span!("after-attach").in_scope(|| info!("logged and traced"));
        });

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "after-attach");
        let _ = provider.shutdown();
    }

    #[test]
    fn test_attach_is_skipped_when_bridge_disabled() {
        if rust_log_overrides() {
            return;
        }
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let config = LoggingConfig {
            bridge_spans: false,
            ..LoggingConfig::default()
        };
        let (dispatch, handle) = build_dispatch(&config).unwrap();

        tracing::dispatcher::with_default(&dispatch, || {
            assert!(!handle.attach_tracer(provider.tracer("logging")).unwrap());
            info_span!("not-bridged").in_scope(|| {});
        });

        assert!(exporter.get_finished_spans().unwrap().is_empty());
        let _ = provider.shutdown();
    }
}
