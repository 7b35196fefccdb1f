// 公共工具

pub mod error;
pub mod model_mapping;
