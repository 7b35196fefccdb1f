// Handlers 模块 - API 端点处理器

pub mod openai;
