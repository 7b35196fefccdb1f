use thiserror::Error;

/// 启动阶段错误 (请求级错误见 proxy::common::error::ProxyError)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bind error: {0}")]
    Bind(String),
}

// 为 Result 实现别名，简化使用
pub type AppResult<T> = Result<T, AppError>;
