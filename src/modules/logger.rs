// 日志初始化
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// 本地时区 RFC 3339 时间戳
fn log_timer() -> fmt::time::ChronoLocal {
    fmt::time::ChronoLocal::rfc_3339()
}

/// 初始化全局日志
///
/// 返回的 guard 必须存活到进程结束，否则缓冲中的日志会丢失。
pub fn init_logger() -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_timer(log_timer());

    let subscriber = tracing_subscriber::registry().with(filter).with(console_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logger already initialized, skipping");
        return guard;
    }

    // 依赖中使用 `log` 宏的日志也转发到 tracing
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("LogTracer not installed: {}", e);
    }

    guard
}
