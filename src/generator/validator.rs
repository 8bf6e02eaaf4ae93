//! 语言特征启发式校验
//!
//! 只是廉价的过滤器，不判断翻译质量：
//! - 例句（目标语言）命中目标语言特征字符或功能词；
//! - 译文（源语言）命中源语言特征字符或功能词；
//! 任一句任一侧不通过，整组不通过。

use crate::error::{DeckError, DeckResult};
use crate::language::{LanguagePairConfig, LanguageSignature};
use crate::models::{SentenceSet, SENTENCES_PER_SET};

fn side_passes(enabled: bool, signature: Option<&LanguageSignature>, text: &str) -> bool {
    match (enabled, signature) {
        (true, Some(sig)) => sig.matches(text),
        // 未配置特征或该侧被关闭时直接通过
        _ => true,
    }
}

/// 校验并给出第一个不通过的原因
pub fn check(set: &SentenceSet, pair: &LanguagePairConfig) -> DeckResult<()> {
    if set.sentences.len() != SENTENCES_PER_SET {
        return Err(DeckError::Validation(format!(
            "expected {} sentences, got {}",
            SENTENCES_PER_SET,
            set.sentences.len()
        )));
    }

    for s in &set.sentences {
        if s.sentence.trim().is_empty() || s.translation.trim().is_empty() {
            return Err(DeckError::Validation(format!(
                "sentence {} has an empty sentence or translation",
                s.id
            )));
        }
        if !side_passes(pair.validate_target, pair.target_signature(), &s.sentence) {
            return Err(DeckError::Validation(format!(
                "sentence {} does not look like {}: {}",
                s.id, pair.target_language_name, s.sentence
            )));
        }
        if !side_passes(pair.validate_source, pair.source_signature(), &s.translation) {
            return Err(DeckError::Validation(format!(
                "translation {} does not look like {}: {}",
                s.id, pair.source_language_name, s.translation
            )));
        }
    }
    Ok(())
}

pub fn validate(set: &SentenceSet, pair: &LanguagePairConfig) -> bool {
    check(set, pair).is_ok()
}
