// Middleware 模块 - Axum 中间件

pub mod auth;
pub mod cors;

pub use auth::BearerToken;
pub use cors::cors_middleware;
