use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::proxy::common::model_mapping::{self, ModelMapping, SharedMapping};
use crate::proxy::config::ProxyConfig;
use crate::proxy::upstream::client::UpstreamClient;

/// Axum 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 模型映射快照，请求处理期间只读
    pub mapping: SharedMapping,
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(config: &ProxyConfig, mapping: ModelMapping) -> AppResult<Self> {
        Ok(Self {
            mapping: model_mapping::shared(mapping),
            upstream: Arc::new(UpstreamClient::new(config)?),
        })
    }
}

/// 构建路由
///
/// 已知路径上的其它方法与未知路径都落到说明页；OPTIONS 由 CORS 中间件直接应答。
pub fn build_router(state: AppState) -> Router {
    use crate::proxy::handlers;

    Router::new()
        .route(
            "/v1/chat/completions",
            post(handlers::openai::handle_chat_completions).fallback(info_handler),
        )
        .route(
            "/v1/images/generations",
            post(handlers::openai::handle_images_generations).fallback(info_handler),
        )
        .route(
            "/v1/models",
            get(handlers::openai::handle_list_models).fallback(info_handler),
        )
        .fallback(info_handler)
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .layer(axum::middleware::from_fn(
            crate::proxy::middleware::cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Axum 服务器实例
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    mapping: SharedMapping,
    mapping_path: PathBuf,
}

impl AxumServer {
    /// 重新加载模型映射文件
    pub async fn reload_mapping(&self) -> usize {
        model_mapping::reload(&self.mapping, &self.mapping_path).await
    }

    /// 启动 Axum 服务器
    pub async fn start(
        config: ProxyConfig,
        mapping: ModelMapping,
    ) -> AppResult<(Self, tokio::task::JoinHandle<()>)> {
        let state = AppState::new(&config, mapping)?;
        let mapping_state = state.mapping.clone();
        let upstream_endpoint = state.upstream.endpoint().to_string();

        let app = build_router(state);

        // 绑定地址
        let addr = config.get_bind_address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Bind(format!("地址 {} 绑定失败: {}", addr, e)))?;

        tracing::info!("反代服务器启动在 http://{} -> {}", addr, upstream_endpoint);

        // 创建关闭通道
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_instance = Self {
            shutdown_tx: Some(shutdown_tx),
            mapping: mapping_state,
            mapping_path: PathBuf::from(&config.mapping_path),
        };

        // 在新任务中启动服务器
        let handle = tokio::spawn(async move {
            use hyper::server::conn::http1;
            use hyper_util::rt::TokioIo;
            use hyper_util::service::TowerToHyperService;

            loop {
                tokio::select! {
                    res = listener.accept() => {
                        match res {
                            Ok((stream, peer)) => {
                                let io = TokioIo::new(stream);
                                let service = TowerToHyperService::new(app.clone());

                                tokio::task::spawn(async move {
                                    if let Err(err) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .with_upgrades()
                                        .await
                                    {
                                        debug!("连接处理结束或出错 ({}): {:?}", peer, err);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("接收连接失败: {:?}", e);
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("反代服务器停止监听");
                        break;
                    }
                }
            }
        });

        Ok((server_instance, handle))
    }

    /// 停止服务器
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 说明页，兼作健康检查
async fn info_handler() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "POST /v1/chat/completions",
            "images": "POST /v1/images/generations",
            "models": "GET /v1/models"
        }
    }))
    .into_response()
}
