use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DeckError, DeckResult};

/// 每个词条固定生成的例句数量
pub const SENTENCES_PER_SET: usize = 3;

/// 学习者难度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Basic,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Beginner,
        Difficulty::Basic,
        Difficulty::Intermediate,
        Difficulty::UpperIntermediate,
        Difficulty::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Basic => "basic",
            Difficulty::Intermediate => "intermediate",
            Difficulty::UpperIntermediate => "upper-intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// 写入 prompt 的难度说明
    pub fn guidance(&self) -> &'static str {
        match self {
            Difficulty::Beginner => {
                "Use very short sentences (4-7 words), present tense and the most common everyday vocabulary."
            }
            Difficulty::Basic => {
                "Use short sentences (6-9 words) with simple past or future tense and common vocabulary."
            }
            Difficulty::Intermediate => {
                "Use sentences of 8-12 words with some subordinate clauses and everyday idioms."
            }
            Difficulty::UpperIntermediate => {
                "Use sentences of 10-15 words with varied tenses, connectors and less frequent vocabulary."
            }
            Difficulty::Advanced => {
                "Use natural, nuanced sentences of up to 20 words with complex structures and idiomatic usage."
            }
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Difficulty::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| DeckError::InvalidInput(format!("unknown difficulty: {}", s)))
    }
}

/// 单个词条的生成请求，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub word_or_phrase: String,
    /// 语言对代码（如 "tr-de"）
    pub language_pair: String,
    pub difficulty: Difficulty,
    pub topic: String,
}

impl GenerationRequest {
    pub fn new(
        word_or_phrase: impl Into<String>,
        language_pair: impl Into<String>,
        difficulty: Difficulty,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            word_or_phrase: word_or_phrase.into(),
            language_pair: language_pair.into(),
            difficulty,
            topic: topic.into(),
        }
    }
}

/// 单条例句
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: u32,
    /// 目标语言例句
    pub sentence: String,
    /// 源语言译文
    pub translation: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 一个词条的例句集合（校验通过后固定为 3 句）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceSet {
    #[serde(default)]
    pub language_pair: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub word: String,
    pub sentences: Vec<Sentence>,
}

/// 音频资源对应的例句位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SentenceRef {
    /// 本次打包输入中的集合序号
    pub set_index: usize,
    pub sentence_id: u32,
}

/// 打包过程中生成的临时音频资源，仅由打包流程持有
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioAsset {
    pub sentence_ref: SentenceRef,
    /// 包内媒体文件名，单次打包内唯一
    pub file_identifier: String,
    pub language_code: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// 闪卡笔记：字段值按 `NoteLayout` 的字段顺序排列
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub guid: String,
    pub fields: Vec<String>,
    pub tags: Vec<String>,
}

/// 打包时被跳过的单条例句
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNote {
    pub word: String,
    pub sentence_id: u32,
    pub reason: String,
}

/// 打包产物：一个可直接下载的文件
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// 建议的文件名
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub deck_name: String,
    pub note_count: usize,
    pub skipped: Vec<SkippedNote>,
}

impl Artifact {
    pub fn mime_type(&self) -> &'static str {
        crate::packager::ARTIFACT_MIME
    }

    /// 将产物写入目录，返回最终路径
    pub fn write_to(&self, dir: &Path, file_name: Option<&str>) -> DeckResult<PathBuf> {
        std::fs::create_dir_all(dir)
            .map_err(|e| DeckError::Io(format!("创建输出目录失败: {}", e)))?;
        let path = dir.join(file_name.unwrap_or(&self.file_name));
        std::fs::write(&path, &self.bytes)
            .map_err(|e| DeckError::Io(format!("写入牌组文件失败: {}", e)))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!(
            "upper-intermediate".parse::<Difficulty>().unwrap(),
            Difficulty::UpperIntermediate
        );
        assert_eq!(
            "Upper Intermediate".parse::<Difficulty>().unwrap(),
            Difficulty::UpperIntermediate
        );
        assert_eq!("advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_serde_is_kebab_case() {
        let json = serde_json::to_string(&Difficulty::UpperIntermediate).unwrap();
        assert_eq!(json, "\"upper-intermediate\"");
    }

    #[test]
    fn test_sentence_defaults_missing_context_and_tags() {
        let s: Sentence =
            serde_json::from_str(r#"{"id": 1, "sentence": "a", "translation": "b"}"#).unwrap();
        assert_eq!(s.context, "");
        assert!(s.tags.is_empty());
    }

    #[test]
    fn test_artifact_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact {
            file_name: "language_deck.apkg".to_string(),
            bytes: vec![1, 2, 3],
            deck_name: "Test".to_string(),
            note_count: 0,
            skipped: vec![],
        };
        let path = artifact.write_to(dir.path(), None).unwrap();
        assert_eq!(path.file_name().unwrap(), "language_deck.apkg");
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
