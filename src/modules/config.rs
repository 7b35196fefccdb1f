use std::fs;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::proxy::ProxyConfig;

const CONFIG_FILE: &str = "gateway_config.json";
const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";
const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";
const MAPPING_PATH_ENV: &str = "MODEL_MAPPING_PATH";

/// 加载网关配置
///
/// 配置文件路径取 `GATEWAY_CONFIG`，默认 `gateway_config.json`；文件不存在时使用默认值，
/// 随后应用环境变量覆盖并校验。
pub fn load_app_config() -> AppResult<ProxyConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE.to_string());
    let config = load_app_config_from(Path::new(&path))?;
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());

    config.validate().map_err(AppError::Config)?;
    Ok(config)
}

/// 从指定文件读取配置，文件缺失时返回默认配置
pub fn load_app_config_from(path: &Path) -> AppResult<ProxyConfig> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(ProxyConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("解析配置文件失败 {}: {}", path.display(), e)))?;

    tracing::info!("Loaded gateway config from {}", path.display());
    Ok(config)
}

/// 环境变量优先于配置文件
pub fn apply_env_overrides<F>(mut config: ProxyConfig, lookup: F) -> ProxyConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(UPSTREAM_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.upstream_url = url.trim().to_string();
    }
    if let Some(path) = lookup(MAPPING_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        config.mapping_path = path.trim().to_string();
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_app_config_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.mapping_path, "model_mapping.json");
    }

    #[test]
    fn test_file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"upstream_url": "https://llm.internal/v1/chat/completions", "request_timeout": 30,
                "upstream_proxy": {{"enabled": true, "url": "socks5://127.0.0.1:1080"}}}}"#
        )
        .unwrap();

        let config = load_app_config_from(file.path()).unwrap();
        assert_eq!(config.upstream_url, "https://llm.internal/v1/chat/completions");
        assert_eq!(config.request_timeout, 30);
        assert!(config.upstream_proxy.enabled);
        // 未出现的字段保持默认
        assert_eq!(config.mapping_path, "model_mapping.json");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            load_app_config_from(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (UPSTREAM_URL_ENV, "http://localhost:9000/v1/chat/completions"),
            (MAPPING_PATH_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let config = apply_env_overrides(ProxyConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });
        assert_eq!(config.upstream_url, "http://localhost:9000/v1/chat/completions");
        // 空白值不覆盖
        assert_eq!(config.mapping_path, "model_mapping.json");
    }
}
