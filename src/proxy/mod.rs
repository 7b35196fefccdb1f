// proxy 模块 - API 反代服务

pub mod config;
pub mod server;

pub mod mappers;    // 协议转换器
pub mod handlers;   // API 端点处理器
pub mod middleware; // Axum 中间件
pub mod upstream;   // 上游客户端
pub mod common;     // 公共工具

pub use config::ProxyConfig;
pub use server::AxumServer;
