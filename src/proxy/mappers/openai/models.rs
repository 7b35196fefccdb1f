// OpenAI 数据模型

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proxy::common::model_mapping::IMAGE_MODEL;

/// `POST /v1/images/generations` 请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub n: Option<u32>,
    /// 其余字段 (response_format, user ...) 不参与合成
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_image_model() -> String {
    IMAGE_MODEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageData {
    pub url: String,
    pub revised_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    pub fn from_ids(ids: impl IntoIterator<Item = String>, created: i64) -> Self {
        let data = ids
            .into_iter()
            .map(|id| ModelEntry {
                id,
                object: "model".to_string(),
                created,
                owned_by: "proxy".to_string(),
            })
            .collect();

        Self {
            object: "list".to_string(),
            data,
        }
    }
}
