// 图像生成 <-> chat-completions 转换
//
// 上游没有原生图像端点：把图像请求改写为一条 chat 指令，
// 再从自由文本回复里找出图片 URL 与说明文字。
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::models::{ImageData, ImageGenerationRequest};
use crate::proxy::common::error::ProxyError;

pub const SUPPORTED_SIZE: &str = "1024x1024";
pub const DEFAULT_QUALITY: &str = "standard";
pub const DEFAULT_STYLE: &str = "vivid";
pub const FALLBACK_CAPTION: &str = "Image generated successfully";

const IMAGE_TEMPERATURE: f64 = 0.7;
const IMAGE_MAX_TOKENS: u32 = 1000;
const CAPTION_MAX_CHARS: usize = 100;

/// 裸 URL：遇到空白或右括号结束
static BARE_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https://[^\s)]+").expect("valid bare url regex"));

/// Markdown 图片：![alt](https://url)
static MARKDOWN_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\((https://[^\s)]+)\)").expect("valid markdown image regex")
});

/// 校验后的图像参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub style: String,
    pub n: u32,
}

impl ImageParams {
    /// 校验并补全默认值；size 只接受 1024x1024
    pub fn from_request(req: &ImageGenerationRequest) -> Result<Self, ProxyError> {
        let prompt = req.prompt.trim();
        if prompt.is_empty() {
            return Err(ProxyError::invalid_param("'prompt' is required", "prompt"));
        }

        let size = match req.size.as_deref() {
            None => SUPPORTED_SIZE,
            Some(SUPPORTED_SIZE) => SUPPORTED_SIZE,
            Some(other) => return Err(ProxyError::invalid_size(other)),
        };

        Ok(Self {
            prompt: prompt.to_string(),
            size: size.to_string(),
            quality: req
                .quality
                .clone()
                .unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
            style: req.style.clone().unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            n: req.n.unwrap_or(1).max(1),
        })
    }

    fn instruction(&self) -> String {
        format!(
            "Generate an image based on the following description: {}\n\
             Size: {}\n\
             Quality: {}\n\
             Style: {}\n\
             Number of images: {}\n\
             Reply with the image as a Markdown image link (![caption](https://...)) \
             followed by a short caption.",
            self.prompt, self.size, self.quality, self.style, self.n
        )
    }
}

/// 合成发往上游的 chat-completions 请求
pub fn build_image_chat_request(params: &ImageParams, mapped_model: &str) -> Value {
    json!({
        "model": mapped_model,
        "messages": [
            { "role": "user", "content": params.instruction() }
        ],
        "temperature": IMAGE_TEMPERATURE,
        "max_tokens": IMAGE_MAX_TOKENS,
        "stream": false,
        "size": params.size,
        "quality": params.quality,
        "style": params.style,
    })
}

/// 从上游回复文本中解析出的图片信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReply {
    pub url: Option<String>,
    pub caption: String,
}

/// 解析自由文本中的图片 URL 与说明
///
/// URL：优先 Markdown 图片标签，否则取最后一个裸 URL。
/// 说明：优先非空的 alt 文本，否则取去掉 URL 后的正文 (截断到 100 字符)，再否则用固定文案。
pub fn parse_image_reply(content: &str) -> ImageReply {
    let markdown = MARKDOWN_IMAGE_RE.captures(content);

    let url = match &markdown {
        Some(caps) => Some(caps[2].to_string()),
        None => BARE_URL_RE
            .find_iter(content)
            .last()
            .map(|m| m.as_str().to_string()),
    };

    let alt = markdown
        .as_ref()
        .map(|caps| caps[1].trim().to_string())
        .filter(|alt| !alt.is_empty());

    let caption = alt.unwrap_or_else(|| caption_from_text(content));

    ImageReply { url, caption }
}

fn caption_from_text(content: &str) -> String {
    let without_images = MARKDOWN_IMAGE_RE.replace_all(content, "");
    let without_urls = BARE_URL_RE.replace_all(&without_images, "");
    let text = without_urls.trim();

    if text.is_empty() {
        return FALLBACK_CAPTION.to_string();
    }

    text.chars().take(CAPTION_MAX_CHARS).collect::<String>().trim_end().to_string()
}

/// 取 `choices[0].message.content`
pub fn extract_message_content(response: &Value) -> Option<&str> {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
}

/// 上游 chat 回复 -> 图像数据
pub fn image_data_from_chat_response(response: &Value) -> Result<ImageData, ProxyError> {
    let content = extract_message_content(response).unwrap_or_default();
    let reply = parse_image_reply(content);

    match reply.url {
        Some(url) => Ok(ImageData {
            url,
            revised_prompt: reply.caption,
        }),
        None => Err(ProxyError::Upstream {
            status: 502,
            message: "No image URL found in upstream response".to_string(),
        }),
    }
}
