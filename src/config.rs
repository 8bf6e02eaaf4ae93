//! 运行配置
//!
//! 加载顺序：`.env`（dotenvy）→ `config/sentence_deck.toml`（可选）→
//! `SENTENCE_DECK__*` 环境变量，最后回退读取 `OPENAI_API_KEY`。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DeckError, DeckResult};
use crate::models::Difficulty;

pub const DEFAULT_CONFIG_FILE: &str = "config/sentence_deck.toml";
pub const ENV_PREFIX: &str = "SENTENCE_DECK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    pub tts: TtsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// 适配器："openai"（兼容 OpenAI 的接口）或 "anthropic"
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub language_pair: String,
    pub difficulty: Difficulty,
    pub topic: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            language_pair: "tr-en".to_string(),
            difficulty: Difficulty::Beginner,
            topic: "daily life".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    #[default]
    Google,
    Espeak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub engine: TtsEngine,
    pub base_url: String,
    pub timeout_secs: u64,
    pub espeak_program: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: TtsEngine::Google,
            base_url: "https://translate.google.com".to_string(),
            timeout_secs: 30,
            espeak_program: "espeak".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub file_name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            file_name: None,
        }
    }
}

impl AppConfig {
    pub fn from_env_and_file() -> DeckResult<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// 从指定文件（不存在则跳过）和环境变量加载
    pub fn load_from(path: &Path) -> DeckResult<Self> {
        let mut builder = config::Config::builder();
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let loaded = builder
            .build()
            .map_err(|e| DeckError::Configuration(format!("加载配置失败: {}", e)))?;
        let mut cfg: AppConfig = loaded
            .try_deserialize()
            .map_err(|e| DeckError::Configuration(format!("解析配置失败: {}", e)))?;

        // direct env fallback
        if cfg.llm.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            cfg.llm.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        Ok(cfg)
    }

    pub fn api_key(&self) -> DeckResult<&str> {
        self.llm
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| DeckError::Configuration("LLM API key is missing".to_string()))
    }
}
