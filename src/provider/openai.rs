// src/provider/openai.rs — OpenAI-compatible Chat Completions provider

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, TokenUsage};
use crate::infra::errors::JudgeError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_RATE_LIMIT_MS: u64 = 5_000;
const MAX_RETRY_AFTER_MS: u64 = 300_000;

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, JudgeError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.into(), request_timeout)
    }

    pub fn with_base_url(
        api_key: String,
        base_url: String,
        request_timeout: Duration,
    ) -> Result<Self, JudgeError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| JudgeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Build the JSON body for `/chat/completions`.
pub(crate) fn request_body(request: &ChatRequest) -> serde_json::Value {
    let mut msgs = Vec::new();

    if let Some(system) = &request.system {
        msgs.push(serde_json::json!({
            "role": "system",
            "content": system,
        }));
    }

    for m in &request.messages {
        msgs.push(serde_json::json!({
            "role": m.role.as_str(),
            "content": m.content,
        }));
    }

    let mut body = serde_json::json!({
        "model": request.model,
        "messages": msgs,
    });

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = serde_json::json!(max_tokens);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    body
}

/// Turn a successful `/chat/completions` payload into a response.
pub(crate) fn parse_response(resp: &serde_json::Value) -> ChatResponse {
    let choice = &resp["choices"][0];
    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match choice["finish_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::Unknown,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}

/// `Retry-After` in seconds, converted to ms and capped at five minutes.
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000).min(MAX_RETRY_AFTER_MS))
        .unwrap_or(DEFAULT_RATE_LIMIT_MS)
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, JudgeError> {
        let body = request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect() || e.is_request(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(JudgeError::RateLimited {
                provider: "openai".into(),
                retry_after_ms: retry_after_ms(response.headers()),
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| JudgeError::Provider {
            provider: "openai".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        let parsed = parse_response(&resp);
        tracing::debug!(
            model = %request.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            total_tokens = parsed.usage.total(),
            "chat completion received"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    #[test]
    fn test_request_body_includes_system_and_params() {
        let req = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("grade this")],
            max_tokens: Some(256),
            temperature: Some(0.0),
            system: Some("You are an impartial grader.".into()),
        };
        let body = request_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "grade this");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_request_body_omits_unset_params() {
        let req = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let body = request_body(&req);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"].as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_parse_response() {
        let resp = serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": "SCORE: 0.9"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8}
        });
        let parsed = parse_response(&resp);
        assert_eq!(parsed.content, "SCORE: 0.9");
        assert_eq!(parsed.usage.total(), 128);
        assert_eq!(parsed.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn test_parse_response_truncated() {
        let resp = serde_json::json!({
            "choices": [{"message": {"content": "SCORE"}, "finish_reason": "length"}]
        });
        let parsed = parse_response(&resp);
        assert_eq!(parsed.stop_reason, StopReason::MaxTokens);
        assert_eq!(parsed.usage.total(), 0);
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), DEFAULT_RATE_LIMIT_MS);
        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("7"),
        );
        assert_eq!(retry_after_ms(&headers), 7000);
    }

    #[test]
    fn test_retry_after_huge_value_is_capped() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("18446744073709551615"),
        );
        assert_eq!(retry_after_ms(&headers), MAX_RETRY_AFTER_MS);

        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("86400"),
        );
        assert_eq!(retry_after_ms(&headers), MAX_RETRY_AFTER_MS);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let p = OpenAIProvider::with_base_url(
            "sk-test".into(),
            "http://localhost:8080/v1/".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(p.base_url(), "http://localhost:8080/v1");
    }
}
