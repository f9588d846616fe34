use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use opentelemetry::trace::{TraceContextExt, Tracer};
use opentelemetry::KeyValue;
use telemetry_config::{ConfigValidator, LogFormat, TelemetryConfig, TransportSecurity};
use telemetry_core::{init_logging, StartError, Telemetry, TelemetryBuilder};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, info_span, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("telemetry")
        .version(env!("CARGO_PKG_VERSION"))
        .about("服务遥测启动器")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (TOML)"),
        )
        .arg(
            Arg::new("service-name")
                .short('s')
                .long("service-name")
                .value_name("NAME")
                .help("服务名称，覆盖配置文件"),
        )
        .arg(
            Arg::new("endpoint")
                .short('e')
                .long("endpoint")
                .value_name("HOST:PORT")
                .help("OTLP采集器地址，覆盖配置文件"),
        )
        .arg(
            Arg::new("insecure")
                .long("insecure")
                .action(ArgAction::SetTrue)
                .help("使用明文连接采集器"),
        )
        .arg(
            Arg::new("sampling-ratio")
                .long("sampling-ratio")
                .value_name("RATIO")
                .value_parser(clap::value_parser!(f64))
                .help("采样率 [0.0, 1.0]"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "compact"]),
        )
        .arg(
            Arg::new("heartbeat-seconds")
                .long("heartbeat-seconds")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("10")
                .help("心跳span与计数器的发送间隔"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 加载配置
    let mut config = TelemetryConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map(String::as_str).unwrap_or("<默认配置>")
        )
    })?;

    if let Some(name) = matches.get_one::<String>("service-name") {
        config.service.name = name.clone();
    }
    if let Some(endpoint) = matches.get_one::<String>("endpoint") {
        config.collector.address = endpoint.clone();
    }
    if matches.get_flag("insecure") {
        config.collector.security = TransportSecurity::Insecure;
    }
    if let Some(ratio) = matches.get_one::<f64>("sampling-ratio") {
        config.traces.sampling_ratio = *ratio;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = format
            .parse::<LogFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    config.validate().context("命令行参数无效")?;

    let heartbeat = Duration::from_secs(
        matches
            .get_one::<u64>("heartbeat-seconds")
            .copied()
            .unwrap_or(10),
    );

    // 先初始化日志，遥测启动过程中的事件同样会被记录
    let logging = init_logging(&config.logging).context("初始化日志失败")?;

    let telemetry = match TelemetryBuilder::new(config.clone()).start() {
        Ok(telemetry) => telemetry,
        Err(StartError::Metrics { source, tracing }) => {
            // 追踪已在运行，但不以降级模式继续
            if let Err(e) = tracing
                .shutdown_handle(config.shutdown_timeout())
                .shutdown()
                .await
            {
                warn!("关闭追踪管道失败: {e}");
            }
            return Err(anyhow::Error::new(source).context("初始化指标管道失败"));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("初始化遥测失败")),
    };

    // tracing span 同时导出为 OTel span
    logging
        .attach_tracer(telemetry.tracer().clone())
        .context("挂载追踪桥接失败")?;

    info!("启动遥测服务: {}", config.service.name);
    info!(
        "采集器: {}://{}",
        config.collector.security.scheme(),
        config.collector.address
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let heartbeat_task = tokio::spawn(run_heartbeat(telemetry.clone(), heartbeat, stop_rx));

    // 等待关闭信号
    wait_for_shutdown_signal().await;

    info!("收到关闭信号，开始优雅关闭...");

    let _ = stop_tx.send(true);
    if let Err(e) = heartbeat_task.await {
        warn!("心跳任务异常退出: {e}");
    }

    match telemetry.shutdown().await {
        Ok(report) => {
            info!(traces = ?report.traces, metrics = ?report.metrics, "遥测已关闭");
            Ok(())
        }
        Err(e) => {
            error!("遥测关闭时发生错误: {e}");
            Err(anyhow::Error::new(e))
        }
    }
}

/// 周期性发送心跳 span 并递增请求计数器
async fn run_heartbeat(telemetry: Telemetry, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    let mut sequence: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sequence += 1;
                emit_heartbeat(&telemetry, sequence);
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!(sent = sequence, "心跳任务停止");
                    break;
                }
            }
        }
    }
}

fn emit_heartbeat(telemetry: &Telemetry, sequence: u64) {
    let _guard = info_span!("heartbeat", sequence).entered();

    telemetry.tracer().in_span("heartbeat.tick", |cx| {
        cx.span()
            .set_attribute(KeyValue::new("heartbeat.sequence", sequence as i64));
        telemetry
            .request_counter()
            .add(1, &[KeyValue::new("http.route", "/heartbeat")]);
    });

    info!(sequence, "心跳已发送");
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
