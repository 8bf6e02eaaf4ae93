// Sentence Deck library entry
// 词条 → 例句生成（prompt / 解析 / 校验 / 重试）→ 朗读合成 → .apkg 打包。
// 二进制入口见 main.rs。

pub mod accepted;
pub mod apkg_exporter_service;
pub mod config;
pub mod error;
pub mod generator;
pub mod language;
pub mod llm;
pub mod models;
pub mod packager;
pub mod test_utils;
pub mod tts;

pub use error::{DeckError, DeckResult};
pub use generator::{BatchReport, Generator};
pub use models::{Artifact, Difficulty, GenerationRequest, Sentence, SentenceSet};
pub use packager::Packager;
