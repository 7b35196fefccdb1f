// Bearer Token 提取
// 网关不持有凭证，调用方的 token 原样透传给上游
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::proxy::common::error::ProxyError;

/// 调用方提供的 Bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 从 Authorization 头解析 Bearer token (scheme 不区分大小写)
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<BearerToken, ProxyError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(ProxyError::MissingToken)?
        .trim();

    let (scheme, token) = value.split_once(' ').ok_or(ProxyError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ProxyError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ProxyError::MissingToken);
    }

    Ok(BearerToken(token.to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ProxyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers);
        if token.is_err() {
            tracing::debug!("Rejecting {} {}: missing bearer token", parts.method, parts.uri.path());
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_valid_bearer() {
        let token = extract_bearer_token(&headers_with("Bearer sk-abc")).unwrap();
        assert_eq!(token.as_str(), "sk-abc");

        let token = extract_bearer_token(&headers_with("bearer   sk-xyz ")).unwrap();
        assert_eq!(token.as_str(), "sk-xyz");
    }

    #[test]
    fn test_missing_or_malformed() {
        assert!(matches!(
            extract_bearer_token(&HeaderMap::new()),
            Err(ProxyError::MissingToken)
        ));
        for bad in ["sk-abc", "Basic dXNlcjpwYXNz", "Bearer ", "Bearer"] {
            assert!(
                matches!(extract_bearer_token(&headers_with(bad)), Err(ProxyError::MissingToken)),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
