// 错误处理
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};
use thiserror::Error;

const GENERIC_UPSTREAM_MESSAGE: &str = "Upstream API error";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing Bearer token")]
    MissingToken,

    #[error("{message}")]
    InvalidRequest {
        message: String,
        param: Option<&'static str>,
        code: Option<&'static str>,
    },

    #[error("Upstream API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error or timeout")]
    Network(String),
}

impl ProxyError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: None,
            code: None,
        }
    }

    pub fn invalid_param(message: impl Into<String>, param: &'static str) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: Some(param),
            code: None,
        }
    }

    pub fn invalid_size(size: &str) -> Self {
        Self::InvalidRequest {
            message: format!(
                "Invalid size '{}'. Only 1024x1024 is supported.",
                size
            ),
            param: Some("size"),
            code: Some("invalid_size"),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingToken => StatusCode::UNAUTHORIZED,
            ProxyError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Network(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::MissingToken => "authentication_error",
            ProxyError::InvalidRequest { .. } => "invalid_request_error",
            ProxyError::Upstream { status, .. } => error_type_for_status(*status),
            ProxyError::Network(_) => "timeout_error",
        }
    }

    /// `{error:{message, type, ...}}`
    pub fn to_body(&self) -> Value {
        let mut error = Map::new();
        let message = match self {
            ProxyError::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        };
        error.insert("message".to_string(), Value::String(message));
        error.insert("type".to_string(), Value::String(self.error_type().to_string()));

        if let ProxyError::InvalidRequest { param, code, .. } = self {
            if let Some(param) = param {
                error.insert("param".to_string(), Value::String(param.to_string()));
            }
            if let Some(code) = code {
                error.insert("code".to_string(), Value::String(code.to_string()));
            }
        }

        json!({ "error": error })
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        if let ProxyError::Network(detail) = &self {
            tracing::warn!("Upstream request failed: {}", detail);
        }
        (self.status(), Json(self.to_body())).into_response()
    }
}

/// 上游状态码 -> 错误类型
pub fn error_type_for_status(status: u16) -> &'static str {
    match status {
        400 => "invalid_request_error",
        401 => "authentication_error",
        402 => "insufficient_credits",
        403 => "moderation_error",
        404 => "not_found_error",
        408 => "timeout_error",
        413 => "request_too_large",
        429 => "rate_limit_error",
        502 => "upstream_error",
        529 => "overloaded_error",
        _ => "unknown_error",
    }
}

/// 从上游错误响应体中提取错误信息
pub fn extract_upstream_message(body: &[u8]) -> String {
    let Ok(json) = serde_json::from_slice::<Value>(body) else {
        return GENERIC_UPSTREAM_MESSAGE.to_string();
    };

    json.get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
        .filter(|m| !m.trim().is_empty())
        .map(|m| m.to_string())
        .unwrap_or_else(|| GENERIC_UPSTREAM_MESSAGE.to_string())
}
