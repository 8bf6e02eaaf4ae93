//! 牌组打包
//!
//! 对每个例句：合成音频 → 分配唯一媒体文件名 → 暂存到临时目录 → 组装笔记。
//! 全部处理完后一次性写出 .apkg。暂存音频在写入包后立即删除，
//! 构建结束（成功或失败）后再整体清理一遍，清理错误只记录不上抛。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::apkg_exporter_service::{write_apkg, MediaEntry, NoteLayout};
use crate::error::{DeckError, DeckResult};
use crate::language::{deck_name_for, tts_language_for};
use crate::models::{Artifact, AudioAsset, Note, Sentence, SentenceRef, SentenceSet, SkippedNote};
use crate::tts::SpeechSynthesizer;

pub const ARTIFACT_FILE_NAME: &str = "language_deck.apkg";
pub const ARTIFACT_MIME: &str = "application/octet-stream";

/// 媒体文件名冲突时的最多重新生成次数
const MAX_ID_ATTEMPTS: usize = 16;

/// Anki 模型/牌组 ID 取值区间
const ANKI_ID_MIN: i64 = 1 << 30;
const ANKI_ID_MAX: i64 = 1 << 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Empty,
    Accumulating,
    Finalized,
}

/// 单次打包内的媒体文件名分配器
pub struct AssetIdAllocator {
    issued: HashSet<String>,
    source: Box<dyn FnMut() -> String + Send>,
}

impl AssetIdAllocator {
    pub fn new() -> Self {
        Self::with_source(|| Uuid::new_v4().simple().to_string())
    }

    /// 自定义随机源
    pub fn with_source<F>(source: F) -> Self
    where
        F: FnMut() -> String + Send + 'static,
    {
        Self {
            issued: HashSet::new(),
            source: Box::new(source),
        }
    }

    /// 分配 `sentence_<id>.<ext>`，与已分配的名字冲突时重新生成
    pub fn allocate(&mut self, extension: &str) -> DeckResult<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = format!("sentence_{}.{}", (self.source)(), extension);
            if self.issued.insert(candidate.clone()) {
                return Ok(candidate);
            }
            debug!("[Packager] 媒体文件名冲突，重新生成: {}", candidate);
        }
        Err(DeckError::Packaging(format!(
            "could not allocate a unique asset id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for AssetIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[Packager] 删除临时音频失败 {}: {}", path.display(), e),
    }
}

/// 暂存目录：持有本次打包的全部音频资源，离开作用域时清理
struct MediaStaging {
    dir: TempDir,
    assets: Vec<AudioAsset>,
}

impl MediaStaging {
    fn new(root: Option<&Path>) -> DeckResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sentence_deck_");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| DeckError::Packaging(format!("创建暂存目录失败: {}", e)))?;
        Ok(Self {
            dir,
            assets: Vec::new(),
        })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn stage(
        &mut self,
        sentence_ref: SentenceRef,
        file_identifier: String,
        language_code: &str,
        bytes: &[u8],
    ) -> DeckResult<()> {
        let path = self.dir.path().join(&file_identifier);
        fs::write(&path, bytes)
            .map_err(|e| DeckError::Packaging(format!("写入暂存音频失败: {}", e)))?;
        self.assets.push(AudioAsset {
            sentence_ref,
            file_identifier,
            language_code: language_code.to_string(),
            path,
        });
        Ok(())
    }

    fn purge(&mut self) {
        for asset in self.assets.drain(..) {
            remove_quietly(&asset.path);
        }
    }
}

impl Drop for MediaStaging {
    fn drop(&mut self) {
        self.purge();
    }
}

pub struct Packager {
    tts: Arc<dyn SpeechSynthesizer>,
    staging_root: Option<PathBuf>,
}

impl Packager {
    pub fn new(tts: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            tts,
            staging_root: None,
        }
    }

    /// 暂存目录建在指定目录下（默认系统临时目录）
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub async fn synthesize_audio(&self, text: &str, language_code: &str) -> DeckResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DeckError::Synthesis("empty sentence".to_string()));
        }
        let audio = self
            .tts
            .synthesize(text, language_code)
            .await
            .map_err(|e| match e {
                DeckError::Synthesis(_) => e,
                other => DeckError::Synthesis(other.to_string()),
            })?;
        if audio.is_empty() {
            return Err(DeckError::Synthesis("synthesizer returned no audio".to_string()));
        }
        Ok(audio)
    }

    /// 按固定字段顺序组装笔记：Sentence | Translation | Context | Audio | Topic | Word
    ///
    /// 标签原样保留，写入集合时再规范化。
    pub fn assemble_note(
        sentence: &Sentence,
        audio_file_name: &str,
        topic: &str,
        word: &str,
    ) -> Note {
        Note {
            guid: Uuid::new_v4().simple().to_string(),
            fields: vec![
                sentence.sentence.clone(),
                sentence.translation.clone(),
                sentence.context.clone(),
                format!("[sound:{}]", audio_file_name),
                topic.to_string(),
                word.to_string(),
            ],
            tags: sentence.tags.clone(),
        }
    }

    /// 开始一次构建
    pub fn start(&self, language_pair: &str) -> DeckResult<DeckBuild<'_>> {
        let staging = MediaStaging::new(self.staging_root.as_deref())?;
        let mut rng = rand::thread_rng();
        let layout = NoteLayout::listen_and_repeat(rng.gen_range(ANKI_ID_MIN..ANKI_ID_MAX));
        let deck_id = rng.gen_range(ANKI_ID_MIN..ANKI_ID_MAX);
        Ok(DeckBuild {
            packager: self,
            tts_language: tts_language_for(language_pair),
            deck_name: deck_name_for(language_pair).to_string(),
            layout,
            deck_id,
            ids: AssetIdAllocator::new(),
            staging,
            notes: Vec::new(),
            skipped: Vec::new(),
            state: BuildState::Empty,
        })
    }

    /// 把已接受的例句集合打包成一个 .apkg 产物
    pub async fn build_deck<'a, I>(&self, sets: I, language_pair: &str) -> DeckResult<Artifact>
    where
        I: IntoIterator<Item = &'a SentenceSet>,
    {
        let sets: Vec<&SentenceSet> = sets.into_iter().collect();
        if sets.is_empty() {
            return Err(DeckError::InvalidInput("no sentence sets to package".to_string()));
        }

        let mut build = self.start(language_pair)?;
        info!(
            "[Packager] 开始打包：{} 个集合，语言对 {}，朗读语言 {}",
            sets.len(),
            language_pair,
            build.tts_language
        );
        for (set_index, set) in sets.into_iter().enumerate() {
            build.add_set(set_index, set).await?;
        }
        build.finalize()
    }
}

/// 一次进行中的构建：Empty → Accumulating → Finalized
pub struct DeckBuild<'p> {
    packager: &'p Packager,
    tts_language: &'static str,
    deck_name: String,
    layout: NoteLayout,
    deck_id: i64,
    ids: AssetIdAllocator,
    staging: MediaStaging,
    notes: Vec<Note>,
    skipped: Vec<SkippedNote>,
    state: BuildState,
}

impl DeckBuild<'_> {
    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn skipped(&self) -> &[SkippedNote] {
        &self.skipped
    }

    fn transition(&mut self, next: BuildState) -> DeckResult<()> {
        let allowed = matches!(
            (self.state, next),
            (BuildState::Empty, BuildState::Accumulating)
                | (BuildState::Accumulating, BuildState::Accumulating)
                | (BuildState::Empty, BuildState::Finalized)
                | (BuildState::Accumulating, BuildState::Finalized)
        );
        if !allowed {
            return Err(DeckError::Packaging(format!(
                "illegal build transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub async fn add_set(&mut self, set_index: usize, set: &SentenceSet) -> DeckResult<()> {
        for sentence in &set.sentences {
            self.add_sentence(set_index, set, sentence).await?;
        }
        Ok(())
    }

    /// 合成失败只跳过该句；暂存失败视为打包失败
    async fn add_sentence(
        &mut self,
        set_index: usize,
        set: &SentenceSet,
        sentence: &Sentence,
    ) -> DeckResult<()> {
        if self.state == BuildState::Finalized {
            return Err(DeckError::Packaging("build already finalized".to_string()));
        }

        let audio = match self
            .packager
            .synthesize_audio(&sentence.sentence, self.tts_language)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                warn!(
                    "[Packager] 跳过 '{}' 第 {} 句: {}",
                    set.word, sentence.id, e
                );
                self.skipped.push(SkippedNote {
                    word: set.word.clone(),
                    sentence_id: sentence.id,
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let extension = self.packager.tts.file_extension();
        let file_identifier = self.ids.allocate(extension)?;
        let sentence_ref = SentenceRef {
            set_index,
            sentence_id: sentence.id,
        };
        self.staging
            .stage(sentence_ref, file_identifier.clone(), self.tts_language, &audio)?;

        let note = Packager::assemble_note(sentence, &file_identifier, &set.topic, &set.word);
        self.transition(BuildState::Accumulating)?;
        self.notes.push(note);
        Ok(())
    }

    /// 写出 .apkg；无论成功与否都会清理暂存音频
    pub fn finalize(mut self) -> DeckResult<Artifact> {
        self.transition(BuildState::Finalized)?;

        let media: Vec<MediaEntry<'_>> = self
            .staging
            .assets
            .iter()
            .map(|a| MediaEntry {
                file_name: &a.file_identifier,
                path: &a.path,
            })
            .collect();
        let result = write_apkg(
            &self.layout,
            self.deck_id,
            &self.deck_name,
            &self.notes,
            &media,
            self.staging.path(),
            |entry| remove_quietly(entry.path),
        );
        drop(media);
        self.staging.purge();

        let bytes = result?;
        info!(
            "[Packager] 打包完成：牌组 '{}'，{} 条笔记，跳过 {} 条，{} 字节",
            self.deck_name,
            self.notes.len(),
            self.skipped.len(),
            bytes.len()
        );
        Ok(Artifact {
            file_name: ARTIFACT_FILE_NAME.to_string(),
            bytes,
            deck_name: std::mem::take(&mut self.deck_name),
            note_count: self.notes.len(),
            skipped: std::mem::take(&mut self.skipped),
        })
    }
}
