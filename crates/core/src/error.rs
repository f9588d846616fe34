use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkError;
use telemetry_config::ConfigError;
use thiserror::Error;

use crate::registry::TracingPipeline;
use crate::shutdown::SignalKind;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    #[error("无效的采样率: {0}，必须位于 [0.0, 1.0] 区间")]
    InvalidSamplingRatio(f64),
    #[error("无效的指标导出间隔: {0:?}，必须大于0")]
    InvalidExportInterval(Duration),
    #[error("无效的采集端点: {0}")]
    InvalidEndpoint(String),
    #[error("创建追踪导出器失败: {0}")]
    TraceExporter(String),
    #[error("创建指标导出器失败: {0}")]
    MetricExporter(String),
    #[error("当前线程没有可用的Tokio运行时: {0}")]
    RuntimeUnavailable(String),
    #[error("日志初始化失败: {0}")]
    Logging(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failure of `TelemetryBuilder::start`.
///
/// `Metrics` carries the already-running tracing pipeline so the caller can
/// keep using it or shut it down explicitly.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("遥测配置无效: {0}")]
    Configuration(#[source] TelemetryError),
    #[error("追踪管道初始化失败: {0}")]
    Tracing(#[source] TelemetryError),
    #[error("指标管道初始化失败(追踪管道仍在运行): {source}")]
    Metrics {
        #[source]
        source: TelemetryError,
        tracing: Box<TracingPipeline>,
    },
}

impl StartError {
    /// The underlying construction error.
    pub fn cause(&self) -> &TelemetryError {
        match self {
            StartError::Configuration(e) | StartError::Tracing(e) => e,
            StartError::Metrics { source, .. } => source,
        }
    }

    /// Take back the live tracing pipeline left behind by a metrics failure.
    pub fn into_partial(self) -> Option<TracingPipeline> {
        match self {
            StartError::Metrics { tracing, .. } => Some(*tracing),
            _ => None,
        }
    }
}

/// Failure of a single provider during flush or shutdown
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{signal}提供者返回错误: {source}")]
    Sdk {
        signal: SignalKind,
        #[source]
        source: OTelSdkError,
    },
    #[error("{signal}提供者操作超时({timeout:?})")]
    Timeout { signal: SignalKind, timeout: Duration },
    #[error("{signal}提供者后台任务异常: {message}")]
    Join { signal: SignalKind, message: String },
}

impl ProviderError {
    pub fn signal(&self) -> SignalKind {
        match self {
            ProviderError::Sdk { signal, .. }
            | ProviderError::Timeout { signal, .. }
            | ProviderError::Join { signal, .. } => *signal,
        }
    }
}

/// Union of every provider failure seen during one shutdown call.
#[derive(Debug, Error)]
#[error("关闭遥测提供者失败: {}", join_failures(.failures))]
pub struct ShutdownError {
    pub failures: Vec<ProviderError>,
}

#[derive(Debug, Error)]
#[error("刷新遥测数据失败: {}", join_failures(.failures))]
pub struct FlushError {
    pub failures: Vec<ProviderError>,
}

fn join_failures(failures: &[ProviderError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_error_lists_every_failure() {
        let error = ShutdownError {
            failures: vec![
                ProviderError::Sdk {
                    signal: SignalKind::Traces,
                    source: OTelSdkError::InternalFailure("export failed".to_string()),
                },
                ProviderError::Timeout {
                    signal: SignalKind::Metrics,
                    timeout: Duration::from_secs(1),
                },
            ],
        };

        let message = error.to_string();
        assert!(message.contains("traces"));
        assert!(message.contains("export failed"));
        assert!(message.contains("metrics"));
    }

    #[test]
    fn test_start_error_cause() {
        let error = StartError::Tracing(TelemetryError::InvalidEndpoint("bad".to_string()));
        assert!(matches!(error.cause(), TelemetryError::InvalidEndpoint(_)));
        assert!(error.into_partial().is_none());
    }
}
