//! 文本生成能力
//!
//! 流水线只依赖 `TextCompletion` trait；具体供应商通过 `ChatCompletionClient`
//! + `ProviderAdapter` 接入。任何失败（鉴权、限流、响应格式）统一表现为
//! `DeckError::Transport`。

pub mod adapter;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{DeckError, DeckResult};
use adapter::{adapter_for, mask_key, ProviderAdapter};

#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> DeckResult<String>;
}

/// 非流式 chat completions 客户端
pub struct ChatCompletionClient {
    http: reqwest::Client,
    adapter: Box<dyn ProviderAdapter>,
    base_url: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &mask_key(&self.api_key))
            .finish_non_exhaustive()
    }
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> DeckResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DeckError::Configuration("LLM API key is missing".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| DeckError::Configuration(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self {
            http,
            adapter: adapter_for(&config.provider),
            base_url: config.base_url.clone(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "max_tokens": max_tokens,
            "response_format": { "type": "text" },
        })
    }
}

#[async_trait]
impl TextCompletion for ChatCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> DeckResult<String> {
        let body = self.request_body(prompt, temperature, max_tokens);
        let preq = self
            .adapter
            .build_request(&self.base_url, &self.api_key, &self.model, &body)
            .map_err(|e| DeckError::Transport(format!("请求构建失败: {}", e)))?;

        let mut req = self.http.post(&preq.url).json(&preq.body);
        for (k, v) in preq.headers.iter() {
            req = req.header(k.as_str(), v.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let snippet: String = text.chars().take(300).collect();
            return Err(DeckError::Transport(format!("HTTP {}: {}", status, snippet)));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| DeckError::Transport(format!("响应不是合法 JSON: {}", e)))?;
        let content = self
            .adapter
            .extract_content(&json)
            .ok_or_else(|| DeckError::Transport("响应中缺少模型输出".to_string()))?;
        debug!("[LLM] 收到模型输出，长度 {} 字符", content.chars().count());
        Ok(content)
    }
}
