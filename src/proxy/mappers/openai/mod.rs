// OpenAI mapper 模块
// 负责 OpenAI 图像/chat 请求 ↔ 上游 chat-completions 的转换

pub mod image;
pub mod models;
pub mod request;

pub use image::*;
pub use models::*;
pub use request::*;
