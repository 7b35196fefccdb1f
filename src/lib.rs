mod modules;
pub mod error;
pub mod proxy; // 反代服务模块

use std::path::Path;

use proxy::common::model_mapping::ModelMapping;
use proxy::AxumServer;
use tracing::{error, info, warn};

/// 启动网关并阻塞到收到退出信号
pub async fn run() -> anyhow::Result<()> {
    // 初始化日志
    let _log_guard = modules::logger::init_logger();

    let config = modules::config::load_app_config()?;
    info!(
        "Gateway config: upstream={} mapping={}",
        config.upstream_url, config.mapping_path
    );

    // 映射文件只在启动时加载一次 (SIGHUP 可重载)
    let mapping = ModelMapping::load(Path::new(&config.mapping_path));

    let (server, handle) = AxumServer::start(config, mapping).await?;

    wait_for_shutdown(&server).await;

    server.stop();
    handle.await?;
    info!("Gateway stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(server: &AxumServer) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("SIGHUP handler unavailable, mapping reload disabled: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            return;
        }
    };

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = hangup.recv() => {
                info!("SIGHUP received, reloading model mapping");
                server.reload_mapping().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_server: &AxumServer) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}
