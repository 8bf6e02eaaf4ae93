//! 模型输出解析：严格 JSON 解码，只容忍最外层一对 markdown 代码围栏

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{DeckError, DeckResult};
use crate::models::{GenerationRequest, SentenceSet};

static RE_OUTER_CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[\w-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("static regex")
});

fn strip_outer_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_OUTER_CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// 解析模型原始输出，并用请求中的词条/主题/语言对覆盖对应字段
pub fn parse(raw: &str, request: &GenerationRequest) -> DeckResult<SentenceSet> {
    let body = strip_outer_fence(raw);
    if body.is_empty() {
        return Err(DeckError::Parse("empty model response".to_string()));
    }
    let mut set: SentenceSet = serde_json::from_str(body)
        .map_err(|e| DeckError::Parse(format!("invalid sentence set JSON: {}", e)))?;

    set.word = request.word_or_phrase.trim().to_string();
    set.topic = request.topic.trim().to_string();
    set.language_pair = request.language_pair.trim().to_string();
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn request() -> GenerationRequest {
        GenerationRequest::new(" run ", "tr-en", Difficulty::Beginner, "sports")
    }

    const PAYLOAD: &str = r#"{
        "language_pair": "en-tr",
        "sentences": [
            {"id": 1, "sentence": "I run.", "translation": "Koşuyorum.", "context": "c", "tags": ["verb"]}
        ]
    }"#;

    #[test]
    fn test_parse_plain_json_and_stamp_request_fields() {
        let set = parse(PAYLOAD, &request()).unwrap();
        assert_eq!(set.sentences.len(), 1);
        assert_eq!(set.sentences[0].tags, vec!["verb".to_string()]);
        assert_eq!(set.word, "run");
        assert_eq!(set.topic, "sports");
        assert_eq!(set.language_pair, "tr-en");
    }

    #[test]
    fn test_parse_strips_single_outer_fence() {
        let fenced = format!("```json\n{}\n```", PAYLOAD);
        assert!(parse(&fenced, &request()).is_ok());
        let bare_fence = format!("```\n{}```", PAYLOAD);
        assert!(parse(&bare_fence, &request()).is_ok());
    }

    #[test]
    fn test_parse_rejects_prose_around_json() {
        let chatty = format!("Sure! Here you go:\n{}", PAYLOAD);
        assert!(matches!(parse(&chatty, &request()), Err(DeckError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_missing_sentences() {
        let err = parse(r#"{"language_pair": "tr-en"}"#, &request()).unwrap_err();
        assert!(matches!(err, DeckError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(parse("   ", &request()), Err(DeckError::Parse(_))));
    }
}
