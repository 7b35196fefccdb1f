// OpenAI 请求构建
// 标准参数原样保留，其余字段收拢到 extra_body
use serde_json::{Map, Number, Value};

/// 允许直接透传给上游的标准参数
pub const STANDARD_PARAMS: &[&str] = &[
    "model",
    "messages",
    "max_tokens",
    "max_completion_tokens",
    "stream",
    "stream_options",
    "top_p",
    "stop",
    "temperature",
    "n",
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "user",
    "functions",
    "function_call",
    "tools",
    "tool_choice",
    "response_format",
    "seed",
    "prompt",
    "size",
    "quality",
    "style",
];

const EXTRA_BODY: &str = "extra_body";
const TEMPERATURE_MIN: f64 = 0.0;
const TEMPERATURE_MAX: f64 = 2.0;

/// 构建发往上游的 chat-completions 请求体
///
/// `mapped_model` 为 None 时保留原始 `model` 字段。
pub fn build_chat_request(mut body: Map<String, Value>, mapped_model: Option<&str>) -> Value {
    let caller_extra = match body.remove(EXTRA_BODY) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::warn!("Ignoring non-object extra_body: {}", other);
            Map::new()
        }
        None => Map::new(),
    };

    if let Some(model) = mapped_model {
        body.insert("model".to_string(), Value::String(model.to_string()));
    }

    let mut out = Map::new();
    let mut extra = Map::new();

    for (key, value) in body {
        if STANDARD_PARAMS.contains(&key.as_str()) {
            let value = if key == "temperature" {
                clamp_temperature(value)
            } else {
                value
            };
            out.insert(key, value);
        } else {
            extra.insert(key, value);
        }
    }

    // 调用方显式提供的 extra_body 优先
    extra.extend(caller_extra);

    if !extra.is_empty() {
        out.insert(EXTRA_BODY.to_string(), Value::Object(extra));
    }

    Value::Object(out)
}

/// 将数值型 temperature 限制在 [0, 2]，范围内的值保持原样
fn clamp_temperature(value: Value) -> Value {
    let Some(t) = value.as_f64() else {
        return value;
    };

    if (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&t) {
        return value;
    }

    let clamped = t.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
    Number::from_f64(clamped).map(Value::Number).unwrap_or(value)
}

/// 请求是否要求流式响应
pub fn is_stream_request(body: &Value) -> bool {
    body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_model_rewritten_and_standard_params_kept() {
        let body = object(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 64,
            "stream": true,
            "tools": [],
            "seed": 7
        }));

        let out = build_chat_request(body, Some("upstream-large"));
        assert_eq!(out["model"], "upstream-large");
        assert_eq!(out["max_tokens"], 64);
        assert_eq!(out["seed"], 7);
        assert!(out.get("extra_body").is_none());
        assert!(is_stream_request(&out));
    }

    #[test]
    fn test_unknown_fields_move_to_extra_body() {
        let body = object(json!({
            "model": "m",
            "messages": [],
            "top_k": 40,
            "reasoning": {"effort": "high"}
        }));

        let out = build_chat_request(body, None);
        assert_eq!(out["model"], "m");
        assert!(out.get("top_k").is_none());
        assert_eq!(out["extra_body"]["top_k"], 40);
        assert_eq!(out["extra_body"]["reasoning"]["effort"], "high");
    }

    #[test]
    fn test_caller_extra_body_wins() {
        let body = object(json!({
            "model": "m",
            "messages": [],
            "top_k": 40,
            "extra_body": {"top_k": 5, "safe_mode": true}
        }));

        let out = build_chat_request(body, None);
        assert_eq!(out["extra_body"]["top_k"], 5);
        assert_eq!(out["extra_body"]["safe_mode"], true);
    }

    #[test]
    fn test_non_object_extra_body_dropped() {
        let body = object(json!({"model": "m", "messages": [], "extra_body": "oops"}));
        let out = build_chat_request(body, None);
        assert!(out.get("extra_body").is_none());
    }

    #[test]
    fn test_temperature_clamped() {
        let high = build_chat_request(object(json!({"temperature": 3.5})), None);
        assert_eq!(high["temperature"].as_f64(), Some(2.0));

        let low = build_chat_request(object(json!({"temperature": -1})), None);
        assert_eq!(low["temperature"].as_f64(), Some(0.0));

        // 范围内的整数不被改写成浮点
        let ok = build_chat_request(object(json!({"temperature": 1})), None);
        assert_eq!(ok["temperature"], json!(1));

        let odd = build_chat_request(object(json!({"temperature": "warm"})), None);
        assert_eq!(odd["temperature"], "warm");
    }

    #[test]
    fn test_stream_flag() {
        assert!(!is_stream_request(&json!({})));
        assert!(!is_stream_request(&json!({"stream": "true"})));
        assert!(is_stream_request(&json!({"stream": true})));
    }
}
