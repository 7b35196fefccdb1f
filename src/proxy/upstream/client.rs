// 上游客户端实现
// 单一 chat-completions 端点，凭证由调用方透传

use reqwest::{Client, Response};
use serde_json::Value;
use tokio::time::Duration;

use crate::error::{AppError, AppResult};
use crate::proxy::config::{ProxyConfig, UpstreamProxyConfig};

pub struct UpstreamClient {
    http_client: Client,
    endpoint: String,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> AppResult<Self> {
        let mut builder = Client::builder()
            // Connection settings (优化连接复用，减少建立开销)
            .connect_timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(16) // 每主机最多 16 个空闲连接
            .pool_idle_timeout(Duration::from_secs(90)) // 空闲连接保持 90 秒
            .tcp_keepalive(Duration::from_secs(60)) // TCP 保活探测 60 秒
            .tcp_nodelay(true);

        if config.request_timeout > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout));
        }

        builder = apply_upstream_proxy(builder, &config.upstream_proxy)?;

        let http_client = builder.build()?;

        Ok(Self {
            http_client,
            endpoint: config.upstream_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 调用上游 chat-completions
    ///
    /// 只有传输层错误 (连接失败、超时) 返回 Err；任何 HTTP 状态码都作为 Ok 返回。
    pub async fn post_chat_completions(
        &self,
        bearer_token: &str,
        body: &Value,
    ) -> Result<Response, reqwest::Error> {
        tracing::debug!("Forwarding request to upstream: {}", self.endpoint);

        // reqwest 的 json() 整体序列化后再发送，带 Content-Length；序列化失败作为 Err 返回
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await?;

        tracing::debug!("✓ Upstream responded | Status: {}", response.status());
        Ok(response)
    }
}

fn apply_upstream_proxy(
    builder: reqwest::ClientBuilder,
    proxy_config: &UpstreamProxyConfig,
) -> AppResult<reqwest::ClientBuilder> {
    if !proxy_config.enabled || proxy_config.url.is_empty() {
        return Ok(builder);
    }

    let proxy = reqwest::Proxy::all(&proxy_config.url)
        .map_err(|e| AppError::Config(format!("Invalid upstream proxy url: {}", e)))?;
    tracing::info!("UpstreamClient enabled proxy: {}", proxy_config.url);
    Ok(builder.proxy(proxy))
}
