use serde::{Deserialize, Serialize};

/// 网关监听端口 (固定)
pub const LISTEN_PORT: u16 = 8000;

/// 网关监听地址
pub const LISTEN_HOST: &str = "0.0.0.0";

/// 反代服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// 上游 chat-completions 端点 (完整 URL)
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// 模型映射文件路径 (相对于工作目录)
    #[serde(default = "default_mapping_path")]
    pub mapping_path: String,

    /// API 请求总超时(秒)，0 表示不限制
    #[serde(default)]
    pub request_timeout: u64,

    /// 上游代理配置
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

/// 上游代理配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    /// 是否启用
    #[serde(default)]
    pub enabled: bool,
    /// 代理地址 (http://, https://, socks5://)
    #[serde(default)]
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            mapping_path: default_mapping_path(),
            request_timeout: 0,
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_upstream_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_mapping_path() -> String {
    "model_mapping.json".to_string()
}

impl ProxyConfig {
    /// 获取实际的监听地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", LISTEN_HOST, LISTEN_PORT)
    }

    /// 校验上游地址，仅允许 http/https
    pub fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.upstream_url)
            .map_err(|e| format!("invalid upstream_url {:?}: {}", self.upstream_url, e))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(format!("unsupported upstream_url scheme: {}", other)),
        }
        if self.mapping_path.trim().is_empty() {
            return Err("mapping_path must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ProxyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.upstream_url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(config.mapping_path, "model_mapping.json");
        assert_eq!(config.request_timeout, 0);
        assert!(!config.upstream_proxy.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address_is_fixed() {
        assert_eq!(ProxyConfig::default().get_bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_validate_rejects_bad_upstream() {
        let mut config = ProxyConfig::default();
        config.upstream_url = "ftp://example.com/chat".to_string();
        assert!(config.validate().is_err());

        config.upstream_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
