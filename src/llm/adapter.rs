//! 供应商适配器：把统一的 OpenAI 风格请求体转换成各家接口的 HTTP 请求，
//! 并从非流式响应中取出正文。

use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

#[derive(Debug)]
pub enum ProviderError {
    BuildFailed(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::BuildFailed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

pub trait ProviderAdapter: Send + Sync {
    fn build_request(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        body: &Value,
    ) -> Result<ProviderRequest, ProviderError>;

    /// 从完整响应中提取模型输出文本
    fn extract_content(&self, response: &Value) -> Option<String>;
}

/// 打印 API key 掩码信息（仅显示前 4 字符 + ****，避免泄露密钥）
pub(crate) fn mask_key(key: &str) -> String {
    if key.is_empty() {
        "EMPTY".to_string()
    } else if key.chars().count() <= 4 {
        format!("**** (len={})", key.len())
    } else {
        format!(
            "{}**** (len={})",
            key.chars().take(4).collect::<String>(),
            key.len()
        )
    }
}

pub struct OpenAIAdapter;

impl ProviderAdapter for OpenAIAdapter {
    fn build_request(
        &self,
        base_url: &str,
        api_key: &str,
        _model: &str,
        body: &Value,
    ) -> Result<ProviderRequest, ProviderError> {
        let trimmed_key = api_key.trim();
        if trimmed_key.is_empty() {
            return Err(ProviderError::BuildFailed("API key is empty".to_string()));
        }
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        debug!(
            "[OpenAIAdapter] build_request: url={}, api_key={}",
            url,
            mask_key(trimmed_key)
        );

        Ok(ProviderRequest {
            url,
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", trimmed_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: body.clone(),
        })
    }

    fn extract_content(&self, response: &Value) -> Option<String> {
        response
            .get("choices")?
            .as_array()?
            .first()?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter;

impl AnthropicAdapter {
    fn convert_openai_to_anthropic(&self, model: &str, body: &Value) -> Value {
        let max_tokens = body
            .get("max_tokens")
            .and_then(|v| v.as_i64())
            .unwrap_or(1024);

        let mut system_segments: Vec<String> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();
        if let Some(items) = body.get("messages").and_then(|v| v.as_array()) {
            for item in items {
                let role = item.get("role").and_then(|v| v.as_str()).unwrap_or("");
                let content = item.get("content").and_then(|v| v.as_str()).unwrap_or("");
                match role {
                    "system" | "developer" => system_segments.push(content.to_string()),
                    "assistant" => {
                        messages.push(json!({ "role": "assistant", "content": content }))
                    }
                    _ => messages.push(json!({ "role": "user", "content": content })),
                }
            }
        }

        let mut converted = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages,
        });
        if let Some(t) = body.get("temperature").and_then(|v| v.as_f64()) {
            converted["temperature"] = json!(t);
        }
        if !system_segments.is_empty() {
            converted["system"] = json!(system_segments.join("\n\n"));
        }
        converted
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn build_request(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        body: &Value,
    ) -> Result<ProviderRequest, ProviderError> {
        let trimmed_key = api_key.trim();
        if trimmed_key.is_empty() {
            return Err(ProviderError::BuildFailed("API key is empty".to_string()));
        }
        let url = format!("{}/messages", base_url.trim_end_matches('/'));
        debug!(
            "[AnthropicAdapter] build_request: url={}, api_key={}",
            url,
            mask_key(trimmed_key)
        );

        Ok(ProviderRequest {
            url,
            headers: vec![
                ("x-api-key".to_string(), trimmed_key.to_string()),
                (
                    "anthropic-version".to_string(),
                    ANTHROPIC_VERSION.to_string(),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: self.convert_openai_to_anthropic(model, body),
        })
    }

    fn extract_content(&self, response: &Value) -> Option<String> {
        let blocks = response.get("content")?.as_array()?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// 按配置名选择适配器
pub fn adapter_for(provider: &str) -> Box<dyn ProviderAdapter> {
    match provider.trim().to_lowercase().as_str() {
        "anthropic" | "claude" => Box::new(AnthropicAdapter),
        _ => Box::new(OpenAIAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Value {
        json!({
            "model": "m",
            "messages": [
                { "role": "system", "content": "be terse" },
                { "role": "user", "content": "hello" }
            ],
            "temperature": 0.7,
            "max_tokens": 500
        })
    }

    #[test]
    fn test_openai_request_shape() {
        let req = OpenAIAdapter
            .build_request("https://api.example.com/v1/", " sk-abcdef ", "m", &sample_body())
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/v1/chat/completions");
        assert!(req
            .headers
            .contains(&("Authorization".to_string(), "Bearer sk-abcdef".to_string())));
        assert_eq!(req.body["max_tokens"], 500);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(OpenAIAdapter
            .build_request("https://x", "  ", "m", &sample_body())
            .is_err());
    }

    #[test]
    fn test_openai_extract_content() {
        let resp = json!({
            "choices": [ { "message": { "role": "assistant", "content": "hi" } } ]
        });
        assert_eq!(OpenAIAdapter.extract_content(&resp).as_deref(), Some("hi"));
        assert_eq!(OpenAIAdapter.extract_content(&json!({ "choices": [] })), None);
    }

    #[test]
    fn test_anthropic_conversion_moves_system_prompt() {
        let req = AnthropicAdapter
            .build_request("https://api.anthropic.com/v1", "key", "claude", &sample_body())
            .unwrap();
        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(req.body["system"], "be terse");
        assert_eq!(req.body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(req.body["max_tokens"], 500);
    }

    #[test]
    fn test_anthropic_extract_content_joins_text_blocks() {
        let resp = json!({
            "content": [
                { "type": "text", "text": "{\"a\":" },
                { "type": "text", "text": "1}" }
            ]
        });
        assert_eq!(
            AnthropicAdapter.extract_content(&resp).as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "EMPTY");
        assert_eq!(mask_key("sk-123456"), "sk-1**** (len=9)");
    }

    #[test]
    fn test_adapter_for_selects_by_provider_name() {
        let body = sample_body();
        let anthropic = adapter_for(" Anthropic ")
            .build_request("https://api.anthropic.com/v1", "key", "claude", &body)
            .unwrap();
        assert!(anthropic.url.ends_with("/messages"));

        let fallback = adapter_for("unknown")
            .build_request("https://api.openai.com/v1", "key", "gpt", &body)
            .unwrap();
        assert!(fallback.url.ends_with("/chat/completions"));
    }
}
