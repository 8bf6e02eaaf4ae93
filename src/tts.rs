/// TTS 模块 - 为每条例句生成朗读音频
///
/// 引擎：
/// - Google 翻译朗读接口（与 gTTS 相同的端点，输出 MP3，需要网络）
/// - espeak 命令行（离线，输出 WAV）
///
/// 所有引擎只返回音频字节；落盘、命名和清理由打包流程负责。
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{TtsConfig, TtsEngine};
use crate::error::{DeckError, DeckResult};

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language_code: &str) -> DeckResult<Vec<u8>>;

    /// 生成的音频文件扩展名
    fn file_extension(&self) -> &'static str {
        "mp3"
    }
}

/// 按配置创建合成引擎
pub fn build_synthesizer(config: &TtsConfig) -> DeckResult<Arc<dyn SpeechSynthesizer>> {
    match config.engine {
        TtsEngine::Google => Ok(Arc::new(GoogleTranslateTts::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?)),
        TtsEngine::Espeak => Ok(Arc::new(EspeakTts::new(&config.espeak_program))),
    }
}

// ============================================================================
// Google 翻译朗读
// ============================================================================

/// 单次请求的文本上限（按字符计）
const GOOGLE_CHUNK_CHARS: usize = 100;

pub struct GoogleTranslateTts {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateTts {
    pub fn new(base_url: &str, timeout: Duration) -> DeckResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) sentence-deck")
            .build()
            .map_err(|e| DeckError::Configuration(format!("HTTP 客户端创建失败: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        language_code: &str,
        idx: usize,
        total: usize,
    ) -> DeckResult<Vec<u8>> {
        let url = format!("{}/translate_tts", self.base_url);
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language_code),
                ("q", chunk),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DeckError::Synthesis(format!("TTS 请求失败: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeckError::Synthesis(format!("TTS 接口返回 HTTP {}", status)));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DeckError::Synthesis(format!("读取 TTS 音频失败: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// 按单词边界切分文本，每段不超过 `max_chars` 个字符（单个超长单词硬切）
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if word_len > max_chars {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, language_code: &str) -> DeckResult<Vec<u8>> {
        let chunks = split_text(text, GOOGLE_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(DeckError::Synthesis("nothing to synthesize".to_string()));
        }
        debug!(
            "[TTS] Google 朗读: lang={}, chunks={}",
            language_code,
            chunks.len()
        );

        // MP3 帧可以直接拼接
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, language_code, idx, chunks.len()).await?);
        }
        if audio.is_empty() {
            return Err(DeckError::Synthesis("TTS 接口返回空音频".to_string()));
        }
        Ok(audio)
    }
}

// ============================================================================
// espeak
// ============================================================================

pub struct EspeakTts {
    program: String,
}

impl EspeakTts {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn voice_for(language_code: &str) -> &'static str {
        match language_code {
            "de" | "de-DE" => "de",
            "tr" | "tr-TR" => "tr",
            "en-US" | "en" => "en",
            _ => "en",
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakTts {
    async fn synthesize(&self, text: &str, language_code: &str) -> DeckResult<Vec<u8>> {
        // 临时 WAV 在 `wav` 离开作用域时删除，任何返回路径都不会遗留
        let wav = tempfile::Builder::new()
            .prefix("tts_")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| DeckError::Synthesis(format!("创建临时音频文件失败: {}", e)))?;

        let output = tokio::process::Command::new(&self.program)
            .arg("-v")
            .arg(Self::voice_for(language_code))
            .arg("-w")
            .arg(wav.path())
            .arg(text)
            .output()
            .await
            .map_err(|e| DeckError::Synthesis(format!("执行 {} 命令失败: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeckError::Synthesis(format!("TTS 失败: {}", stderr.trim())));
        }

        let bytes = tokio::fs::read(wav.path())
            .await
            .map_err(|e| DeckError::Synthesis(format!("读取临时音频失败: {}", e)))?;
        if bytes.is_empty() {
            return Err(DeckError::Synthesis("espeak 没有输出音频".to_string()));
        }
        Ok(bytes)
    }

    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_text_respects_word_boundaries() {
        let text = "one two three four five";
        let chunks = split_text(text, 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn test_split_text_hard_splits_long_words() {
        let chunks = split_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_text_short_sentence_is_single_chunk() {
        let chunks = split_text("  Er läuft gern am Abend. ", GOOGLE_CHUNK_CHARS);
        assert_eq!(chunks, vec!["Er läuft gern am Abend."]);
        assert!(split_text("   ", 10).is_empty());
    }

    #[test]
    fn test_espeak_voice_mapping() {
        assert_eq!(EspeakTts::voice_for("de"), "de");
        assert_eq!(EspeakTts::voice_for("tr"), "tr");
        assert_eq!(EspeakTts::voice_for("xx"), "en");
    }

    #[tokio::test]
    async fn test_espeak_missing_program_is_synthesis_error() {
        let tts = EspeakTts::new("definitely-not-a-real-espeak-binary");
        let err = tts.synthesize("Hallo", "de").await.unwrap_err();
        assert!(matches!(err, DeckError::Synthesis(_)));
        assert_eq!(tts.file_extension(), "wav");
    }
}
