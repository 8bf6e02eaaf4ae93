use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{DeckError, DeckResult};
use crate::llm::TextCompletion;
use crate::tts::SpeechSynthesizer;

/// 按顺序返回预设响应的文本生成替身；响应用完后返回传输错误
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<DeckResult<String>>>,
    prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<(f32, u32)>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<DeckResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    /// 全部为成功响应
    pub fn ok<S: Into<String>>(responses: Vec<S>) -> Self {
        Self::new(responses.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// 每次调用收到的 (temperature, max_tokens)
    pub fn params(&self) -> Vec<(f32, u32)> {
        self.params.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> DeckResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        self.params
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((temperature, max_tokens));
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(DeckError::Transport("no scripted response left".to_string())))
    }
}

/// 记录调用参数的语音合成替身；文本包含 `fail_marker` 时返回合成错误
pub struct RecordingSynthesizer {
    calls: Mutex<Vec<(String, String)>>,
    fail_marker: Option<String>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: None,
        }
    }

    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_marker: Some(marker.into()),
        }
    }

    /// 每次调用的 (text, language_code)
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn synthesize(&self, text: &str, language_code: &str) -> DeckResult<Vec<u8>> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((text.to_string(), language_code.to_string()));
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(DeckError::Synthesis(format!("refused: {}", text)));
            }
        }
        // 假 MP3 帧头 + 文本
        let mut bytes = vec![0xFF, 0xFB, 0x90, 0x00];
        bytes.extend_from_slice(text.as_bytes());
        Ok(bytes)
    }
}
