//! 语言对与语言特征表
//!
//! 新增语言只需要往静态表里加数据：
//! - `LanguageSignature`：特征字符（变音符号）+ 常用功能词
//! - `LanguagePairConfig`：源/目标语言、校验策略、牌组名称

use crate::error::{DeckError, DeckResult};

/// 单种语言的启发式特征
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSignature {
    pub code: &'static str,
    /// 该语言特有的字符（大小写都列出）
    pub diacritics: &'static str,
    /// 常见功能词（小写）
    pub function_words: &'static [&'static str],
    /// 写入 prompt 的书写提示
    pub prompt_hint: &'static str,
}

impl LanguageSignature {
    pub fn has_signature_char(&self, text: &str) -> bool {
        text.chars().any(|c| self.diacritics.contains(c))
    }

    pub fn has_function_word(&self, text: &str) -> bool {
        words(text).any(|w| self.function_words.contains(&w.as_str()))
    }

    /// 特征字符或功能词任一命中即视为该语言
    pub fn matches(&self, text: &str) -> bool {
        self.has_signature_char(text) || self.has_function_word(text)
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

static SIGNATURES: &[LanguageSignature] = &[
    LanguageSignature {
        code: "tr",
        diacritics: "çğıöşüÇĞİÖŞÜ",
        function_words: &[
            "ve", "bir", "bu", "şu", "ile", "için", "çok", "ama", "da", "de", "mi", "ne", "her",
            "ben", "sen", "biz", "o",
        ],
        prompt_hint: "Write Turkish with its native characters (ç, ğ, ı, İ, ö, ş, ü); never replace them with plain ASCII letters.",
    },
    LanguageSignature {
        code: "de",
        diacritics: "äöüßÄÖÜ",
        function_words: &[
            "der", "die", "das", "den", "dem", "und", "ist", "ich", "nicht", "ein", "eine", "zu",
            "mit", "im", "auf", "sie", "er", "wir",
        ],
        prompt_hint: "Write German with correct umlauts (ä, ö, ü) and ß, and use articles such as der, die, das naturally.",
    },
    LanguageSignature {
        code: "en",
        diacritics: "",
        function_words: &[
            "the", "a", "an", "is", "are", "and", "to", "of", "in", "on", "it", "i", "you", "he",
            "she", "we", "they", "my", "this",
        ],
        prompt_hint: "Write natural, idiomatic English using common function words (the, a, is, to).",
    },
];

pub fn signature_for(code: &str) -> Option<&'static LanguageSignature> {
    SIGNATURES.iter().find(|s| s.code == code)
}

/// 语言对静态配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePairConfig {
    /// 语言对代码，格式为 "源-目标"
    pub code: &'static str,
    pub source_code: &'static str,
    pub target_code: &'static str,
    pub source_language_name: &'static str,
    pub target_language_name: &'static str,
    /// 是否校验译文（源语言）特征
    pub validate_source: bool,
    /// 是否校验例句（目标语言）特征
    pub validate_target: bool,
    pub deck_name: Option<&'static str>,
}

impl LanguagePairConfig {
    pub fn source_signature(&self) -> Option<&'static LanguageSignature> {
        signature_for(self.source_code)
    }

    pub fn target_signature(&self) -> Option<&'static LanguageSignature> {
        signature_for(self.target_code)
    }
}

static LANGUAGE_PAIRS: &[LanguagePairConfig] = &[
    LanguagePairConfig {
        code: "tr-en",
        source_code: "tr",
        target_code: "en",
        source_language_name: "Turkish",
        target_language_name: "English",
        validate_source: true,
        validate_target: true,
        deck_name: Some("English — Listen & Repeat"),
    },
    LanguagePairConfig {
        code: "tr-de",
        source_code: "tr",
        target_code: "de",
        source_language_name: "Turkish",
        target_language_name: "German",
        validate_source: true,
        validate_target: true,
        deck_name: Some("Deutsch — Hören & Wiederholen"),
    },
    LanguagePairConfig {
        code: "en-tr",
        source_code: "en",
        target_code: "tr",
        source_language_name: "English",
        target_language_name: "Turkish",
        validate_source: true,
        validate_target: true,
        deck_name: None,
    },
];

/// 未知语言对使用的通用牌组名
pub const FALLBACK_DECK_NAME: &str = "Language Learning";
/// 未知语言对使用的朗读语言
pub const FALLBACK_TTS_LANGUAGE: &str = "en";

pub fn language_pair(code: &str) -> Option<&'static LanguagePairConfig> {
    let code = code.trim();
    LANGUAGE_PAIRS.iter().find(|p| p.code.eq_ignore_ascii_case(code))
}

pub fn require_language_pair(code: &str) -> DeckResult<&'static LanguagePairConfig> {
    language_pair(code)
        .ok_or_else(|| DeckError::Configuration(format!("unsupported language pair: {}", code)))
}

pub fn supported_language_pairs() -> impl Iterator<Item = &'static LanguagePairConfig> {
    LANGUAGE_PAIRS.iter()
}

pub fn deck_name_for(code: &str) -> &'static str {
    language_pair(code)
        .and_then(|p| p.deck_name)
        .unwrap_or(FALLBACK_DECK_NAME)
}

/// 朗读使用目标语言（例句所用语言）
pub fn tts_language_for(code: &str) -> &'static str {
    language_pair(code)
        .map(|p| p.target_code)
        .unwrap_or(FALLBACK_TTS_LANGUAGE)
}
