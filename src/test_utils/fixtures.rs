use crate::models::{Sentence, SentenceSet};

/// 通过 tr-de 校验的模型输出
pub const GERMAN_RESPONSE: &str = r#"{
    "language_pair": "tr-de",
    "topic": "sports",
    "word": "laufen",
    "sentences": [
        {"id": 1, "sentence": "Ich laufe jeden Morgen im Park.", "translation": "Her sabah parkta koşuyorum.", "context": "Günlük rutin", "tags": ["verb", "routine"]},
        {"id": 2, "sentence": "Die Kinder laufen schnell nach Hause.", "translation": "Çocuklar hızlıca eve koşuyor.", "context": "Okul çıkışı", "tags": ["verb"]},
        {"id": 3, "sentence": "Er läuft gern am Abend.", "translation": "O akşamları koşmayı sever.", "context": "Hobiler", "tags": []}
    ]
}"#;

/// 通过 tr-en 校验的模型输出
pub const ENGLISH_RESPONSE: &str = r#"{
    "language_pair": "tr-en",
    "topic": "sports",
    "word": "run",
    "sentences": [
        {"id": 1, "sentence": "I run every morning in the park.", "translation": "Her sabah parkta koşuyorum.", "context": "Günlük rutin", "tags": ["verb"]},
        {"id": 2, "sentence": "The children run home quickly.", "translation": "Çocuklar hızlıca eve koşuyor.", "context": "Okul çıkışı", "tags": []},
        {"id": 3, "sentence": "She likes to run in the evening.", "translation": "O akşamları koşmayı sever.", "context": "Hobiler", "tags": []}
    ]
}"#;

/// 能解析但例句是英语，tr-de 校验不通过
pub const WRONG_LANGUAGE_RESPONSE: &str = r#"{
    "language_pair": "tr-de",
    "sentences": [
        {"id": 1, "sentence": "I run every morning.", "translation": "Her sabah koşuyorum.", "context": "", "tags": []},
        {"id": 2, "sentence": "Children run home.", "translation": "Çocuklar eve koşuyor.", "context": "", "tags": []},
        {"id": 3, "sentence": "Running feels good.", "translation": "Koşmak iyi hissettiriyor.", "context": "", "tags": []}
    ]
}"#;

/// 只有两句，数量不符
pub const SHORT_RESPONSE: &str = r#"{
    "sentences": [
        {"id": 1, "sentence": "Ich laufe.", "translation": "Koşuyorum.", "context": "", "tags": []},
        {"id": 2, "sentence": "Wir laufen.", "translation": "Koşuyoruz.", "context": "", "tags": []}
    ]
}"#;

pub const MALFORMED_RESPONSE: &str = "Sure! Here are three sentences: 1) Ich laufe ...";

fn sentence(id: u32, sentence: &str, translation: &str, context: &str) -> Sentence {
    Sentence {
        id,
        sentence: sentence.to_string(),
        translation: translation.to_string(),
        context: context.to_string(),
        tags: vec![],
    }
}

/// 已通过校验的 tr-de 例句集合
pub fn german_set(word: &str) -> SentenceSet {
    SentenceSet {
        language_pair: "tr-de".to_string(),
        topic: "sports".to_string(),
        word: word.to_string(),
        sentences: vec![
            sentence(
                1,
                "Ich laufe jeden Morgen im Park.",
                "Her sabah parkta koşuyorum.",
                "Günlük rutin",
            ),
            sentence(
                2,
                "Die Kinder laufen schnell nach Hause.",
                "Çocuklar hızlıca eve koşuyor.",
                "Okul çıkışı",
            ),
            sentence(3, "Er läuft gern am Abend.", "O akşamları koşmayı sever.", "Hobiler"),
        ],
    }
}

/// 已通过校验的 tr-en 例句集合
pub fn english_set(word: &str) -> SentenceSet {
    SentenceSet {
        language_pair: "tr-en".to_string(),
        topic: "sports".to_string(),
        word: word.to_string(),
        sentences: vec![
            sentence(
                1,
                "I run every morning in the park.",
                "Her sabah parkta koşuyorum.",
                "Günlük rutin",
            ),
            sentence(
                2,
                "The children run home quickly.",
                "Çocuklar hızlıca eve koşuyor.",
                "Okul çıkışı",
            ),
            sentence(
                3,
                "She likes to run in the evening.",
                "O akşamları koşmayı sever.",
                "Hobiler",
            ),
        ],
    }
}
