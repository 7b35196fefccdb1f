// OpenAI Handler
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::proxy::common::error::{extract_upstream_message, ProxyError};
use crate::proxy::common::model_mapping::{self, IMAGE_MODEL};
use crate::proxy::mappers::openai::{
    build_chat_request, build_image_chat_request, image_data_from_chat_response,
    is_stream_request, ImageGenerationRequest, ImageGenerationResponse, ImageParams, ModelList,
};
use crate::proxy::middleware::BearerToken;
use crate::proxy::server::AppState;

const MAPPED_MODEL_HEADER: &str = "x-mapped-model";

/// 处理 `POST /v1/chat/completions`
///
/// 改写模型名并整理参数后转发上游，响应体原样返回 (流式逐块转发，非流式整体缓冲)。
pub async fn handle_chat_completions(
    State(state): State<AppState>,
    token: BearerToken,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let trace_id = new_trace_id();
    let body = parse_json_object(&body)?;

    let mapping = model_mapping::snapshot(&state.mapping).await;
    let requested_model = body
        .get("model")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let mapped_model = requested_model.as_deref().map(|m| mapping.resolve(m));

    let upstream_body = build_chat_request(body, mapped_model.as_deref());
    let stream = is_stream_request(&upstream_body);

    info!(
        "[{}] Chat request | Model: {} -> {} | Stream: {}",
        trace_id,
        requested_model.as_deref().unwrap_or("-"),
        mapped_model.as_deref().unwrap_or("-"),
        stream
    );

    let response = state
        .upstream
        .post_chat_completions(token.as_str(), &upstream_body)
        .await
        .map_err(|e| ProxyError::Network(e.to_string()))?;

    let status = convert_status(response.status());
    info!("[{}] Upstream status: {}", trace_id, status);

    let mut out = if stream {
        let mut out = Response::new(Body::from_stream(passthrough_stream(
            trace_id.clone(),
            response,
        )));
        let headers = out.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        out
    } else {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Network(e.to_string()))?;
        debug!("[{}] Upstream body: {} bytes", trace_id, bytes.len());

        let mut out = Response::new(Body::from(bytes));
        out.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        out
    };

    *out.status_mut() = status;
    if let Some(model) = mapped_model.and_then(|m| HeaderValue::from_str(&m).ok()) {
        out.headers_mut().insert(MAPPED_MODEL_HEADER, model);
    }
    Ok(out)
}

/// 逐块转发上游响应体，上游结束即结束
fn passthrough_stream(
    trace_id: String,
    response: reqwest::Response,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    let mut upstream = response.bytes_stream();

    async_stream::stream! {
        let mut total = 0usize;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(bytes) => {
                    total += bytes.len();
                    debug!("[{}] [SSE] Received chunk: {} bytes", trace_id, bytes.len());
                    yield Ok::<Bytes, std::io::Error>(bytes);
                }
                Err(e) => {
                    warn!("[{}] Upstream stream error after {} bytes: {}", trace_id, total, e);
                    yield Err(std::io::Error::new(std::io::ErrorKind::Other, e));
                    break;
                }
            }
        }
        debug!("[{}] Upstream stream finished ({} bytes)", trace_id, total);
    }
}

/// 处理 `POST /v1/images/generations`
///
/// 上游只有 chat 接口：合成一条 chat 请求，再从回复文本中解析图片。
pub async fn handle_images_generations(
    State(state): State<AppState>,
    token: BearerToken,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let trace_id = new_trace_id();

    let request: ImageGenerationRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::invalid_request(format!("Invalid request body: {}", e)))?;
    let params = ImageParams::from_request(&request)?;

    let mapped_model = model_mapping::snapshot(&state.mapping)
        .await
        .resolve(&request.model);

    info!(
        "[{}] Image request | Model: {} -> {} | Size: {} | Quality: {} | Style: {}",
        trace_id, request.model, mapped_model, params.size, params.quality, params.style
    );

    let chat_body = build_image_chat_request(&params, &mapped_model);
    let response = state
        .upstream
        .post_chat_completions(token.as_str(), &chat_body)
        .await
        .map_err(|e| ProxyError::Network(e.to_string()))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProxyError::Network(e.to_string()))?;

    if !status.is_success() {
        let message = extract_upstream_message(&bytes);
        warn!("[{}] Upstream image request failed ({}): {}", trace_id, status, message);
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    let chat_response: Value = serde_json::from_slice(&bytes).map_err(|e| ProxyError::Upstream {
        status: 502,
        message: format!("Invalid upstream response: {}", e),
    })?;

    let data = image_data_from_chat_response(&chat_response)?;
    info!("[{}] ✓ Image extracted: {}", trace_id, data.url);

    Ok(Json(ImageGenerationResponse {
        created: chrono::Utc::now().timestamp(),
        data: vec![data],
    })
    .into_response())
}

/// 列出可用模型
pub async fn handle_list_models(State(state): State<AppState>) -> Json<ModelList> {
    let mapping = model_mapping::snapshot(&state.mapping).await;

    let mut ids = mapping.model_ids();
    if !ids.iter().any(|id| id == IMAGE_MODEL) {
        ids.push(IMAGE_MODEL.to_string());
        ids.sort();
    }

    Json(ModelList::from_ids(ids, chrono::Utc::now().timestamp()))
}

fn parse_json_object(body: &[u8]) -> Result<Map<String, Value>, ProxyError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProxyError::invalid_request(
            "Request body must be a JSON object",
        )),
        Err(e) => Err(ProxyError::invalid_request(format!(
            "Invalid request body: {}",
            e
        ))),
    }
}

fn convert_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

// 生成随机 Trace ID 用于日志追踪
fn new_trace_id() -> String {
    rand::Rng::sample_iter(rand::thread_rng(), &rand::distributions::Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_object() {
        assert!(parse_json_object(br#"{"model": "m"}"#).is_ok());
        assert!(matches!(
            parse_json_object(b"[1,2]"),
            Err(ProxyError::InvalidRequest { .. })
        ));
        assert!(matches!(
            parse_json_object(b"{oops"),
            Err(ProxyError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_trace_id_shape() {
        let id = new_trace_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
