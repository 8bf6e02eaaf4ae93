use anyhow::Result;
use assert_matches::assert_matches;
use rusqlite::Connection;
use sentence_deck_lib::apkg_exporter_service::{COLLECTION_FILE, FIELD_SEPARATOR, MEDIA_MANIFEST};
use sentence_deck_lib::error::DeckError;
use sentence_deck_lib::language::FALLBACK_DECK_NAME;
use sentence_deck_lib::models::SentenceSet;
use sentence_deck_lib::packager::{Packager, ARTIFACT_FILE_NAME};
use sentence_deck_lib::test_utils::fixtures::{english_set, german_set};
use sentence_deck_lib::test_utils::RecordingSynthesizer;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;
use zip::ZipArchive;

struct Unpacked {
    media: serde_json::Map<String, serde_json::Value>,
    notes: Vec<Vec<String>>,
    decks: serde_json::Value,
    media_files: usize,
}

/// 解开 .apkg，读出媒体清单和笔记字段
fn unpack(bytes: &[u8], scratch: &Path) -> Result<Unpacked> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))?;

    let mut manifest = String::new();
    archive.by_name(MEDIA_MANIFEST)?.read_to_string(&mut manifest)?;
    let media: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&manifest)?;

    let mut db_bytes = Vec::new();
    archive.by_name(COLLECTION_FILE)?.read_to_end(&mut db_bytes)?;
    let db_path = scratch.join("unpacked.anki2");
    std::fs::write(&db_path, db_bytes)?;

    let conn = Connection::open(&db_path)?;
    let mut stmt = conn.prepare("SELECT flds FROM notes ORDER BY id")?;
    let notes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(|flds| flds.split(FIELD_SEPARATOR).map(str::to_string).collect())
        .collect();
    let decks: String = conn.query_row("SELECT decks FROM col", [], |r| r.get(0))?;

    let media_files = archive
        .file_names()
        .filter(|n| *n != MEDIA_MANIFEST && *n != COLLECTION_FILE)
        .count();

    Ok(Unpacked {
        media,
        notes,
        decks: serde_json::from_str(&decks)?,
        media_files,
    })
}

/// 暂存根目录下的所有文件（含子目录）
fn staged_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(staged_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

fn deck_names(decks: &serde_json::Value) -> Vec<String> {
    decks
        .as_object()
        .map(|m| {
            m.values()
                .filter_map(|d| d["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_deck_round_trips_note_fields() -> Result<()> {
    let staging = tempdir()?;
    let scratch = tempdir()?;
    let tts = Arc::new(RecordingSynthesizer::new());
    let packager = Packager::new(tts.clone()).with_staging_root(staging.path());

    let sets = vec![german_set("laufen"), german_set("gehen")];
    let artifact = packager.build_deck(&sets, "tr-de").await?;

    assert_eq!(artifact.file_name, ARTIFACT_FILE_NAME);
    assert_eq!(artifact.note_count, 6);
    assert!(artifact.skipped.is_empty());

    let unpacked = unpack(&artifact.bytes, scratch.path())?;
    assert_eq!(unpacked.notes.len(), 6);
    assert_eq!(unpacked.media.len(), 6);
    assert_eq!(unpacked.media_files, 6);

    for (note, sentence) in unpacked
        .notes
        .iter()
        .zip(sets.iter().flat_map(|s| s.sentences.iter()))
    {
        assert_eq!(note[0], sentence.sentence);
        assert_eq!(note[1], sentence.translation);
        assert_eq!(note[2], sentence.context);
        assert!(note[3].starts_with("[sound:sentence_"));
        assert_eq!(note[4], "sports");
    }
    assert_eq!(unpacked.notes[0][5], "laufen");
    assert_eq!(unpacked.notes[3][5], "gehen");
    Ok(())
}

#[tokio::test]
async fn test_audio_references_resolve_to_embedded_media() -> Result<()> {
    let staging = tempdir()?;
    let scratch = tempdir()?;
    let packager =
        Packager::new(Arc::new(RecordingSynthesizer::new())).with_staging_root(staging.path());
    let sets = vec![english_set("run"), english_set("walk"), english_set("jump")];
    let artifact = packager.build_deck(&sets, "tr-en").await?;
    let unpacked = unpack(&artifact.bytes, scratch.path())?;
    assert_eq!(unpacked.media.len(), 9);

    let embedded: HashSet<String> = unpacked
        .media
        .values()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    // 跨集合的媒体文件名两两不同
    assert_eq!(embedded.len(), 9);

    for note in &unpacked.notes {
        let name = note[3]
            .trim_start_matches("[sound:")
            .trim_end_matches(']')
            .to_string();
        assert!(embedded.contains(&name), "missing media {}", name);
    }
    Ok(())
}

#[tokio::test]
async fn test_no_staged_audio_left_after_build() -> Result<()> {
    let staging = tempdir()?;
    let packager =
        Packager::new(Arc::new(RecordingSynthesizer::new())).with_staging_root(staging.path());
    packager.build_deck([&german_set("laufen")], "tr-de").await?;

    let leftovers: Vec<_> = std::fs::read_dir(staging.path())?.collect();
    assert!(leftovers.is_empty(), "leftover staging entries: {:?}", leftovers);
    Ok(())
}

#[tokio::test]
async fn test_no_staged_audio_left_when_build_is_abandoned() -> Result<()> {
    let staging = tempdir()?;
    let packager =
        Packager::new(Arc::new(RecordingSynthesizer::new())).with_staging_root(staging.path());
    let mut build = packager.start("tr-de")?;
    build.add_set(0, &german_set("laufen")).await?;
    drop(build);

    let leftovers: Vec<_> = std::fs::read_dir(staging.path())?.collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_packaging_failure_still_removes_staged_audio() -> Result<()> {
    let staging = tempdir()?;
    let packager =
        Packager::new(Arc::new(RecordingSynthesizer::new())).with_staging_root(staging.path());
    let mut build = packager.start("tr-de")?;
    build.add_set(0, &german_set("laufen")).await?;

    let staged = staged_files(staging.path())?;
    assert_eq!(staged.len(), 3);
    // 让第一个媒体文件在写包时无法打开
    std::fs::remove_file(&staged[0])?;

    let err = build.finalize().unwrap_err();
    assert_matches!(err, DeckError::Packaging(_));

    let leftovers: Vec<_> = std::fs::read_dir(staging.path())?.collect();
    assert!(leftovers.is_empty(), "leftover staging entries: {:?}", leftovers);
    Ok(())
}

#[tokio::test]
async fn test_tts_uses_target_language_of_pair() -> Result<()> {
    let cases: [(&str, SentenceSet, &str); 3] = [
        ("tr-de", german_set("laufen"), "de"),
        ("tr-en", english_set("run"), "en"),
        ("xx-yy", english_set("run"), "en"),
    ];
    for (pair, set, expected) in cases {
        let tts = Arc::new(RecordingSynthesizer::new());
        let packager = Packager::new(tts.clone());
        packager.build_deck([&set], pair).await?;
        let calls = tts.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(_, lang)| lang == expected), "{}: {:?}", pair, calls);
        assert_eq!(calls[0].0, set.sentences[0].sentence);
    }
    Ok(())
}

#[tokio::test]
async fn test_deck_name_per_language_pair() -> Result<()> {
    let scratch = tempdir()?;
    let cases = [
        ("tr-en", "English — Listen & Repeat"),
        ("tr-de", "Deutsch — Hören & Wiederholen"),
        ("en-tr", FALLBACK_DECK_NAME),
    ];
    for (pair, expected) in cases {
        let packager = Packager::new(Arc::new(RecordingSynthesizer::new()));
        let artifact = packager.build_deck([&english_set("run")], pair).await?;
        assert_eq!(artifact.deck_name, expected);
        let unpacked = unpack(&artifact.bytes, scratch.path())?;
        assert!(deck_names(&unpacked.decks).iter().any(|n| n == expected));
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_synthesis_skips_only_that_note() -> Result<()> {
    let staging = tempdir()?;
    let scratch = tempdir()?;
    let tts = Arc::new(RecordingSynthesizer::failing_on("Kinder"));
    let packager = Packager::new(tts).with_staging_root(staging.path());

    let artifact = packager.build_deck([&german_set("laufen")], "tr-de").await?;
    assert_eq!(artifact.note_count, 2);
    assert_eq!(artifact.skipped.len(), 1);
    assert_eq!(artifact.skipped[0].word, "laufen");
    assert_eq!(artifact.skipped[0].sentence_id, 2);

    let unpacked = unpack(&artifact.bytes, scratch.path())?;
    assert_eq!(unpacked.notes.len(), 2);
    assert_eq!(unpacked.media.len(), 2);
    assert!(std::fs::read_dir(staging.path())?.next().is_none());
    Ok(())
}

#[tokio::test]
async fn test_artifact_written_to_output_dir() -> Result<()> {
    let out = tempdir()?;
    let packager = Packager::new(Arc::new(RecordingSynthesizer::new()));
    let artifact = packager.build_deck([&german_set("laufen")], "tr-de").await?;
    let path = artifact.write_to(out.path(), None)?;
    assert_eq!(path, out.path().join(ARTIFACT_FILE_NAME));
    assert_eq!(std::fs::read(&path)?, artifact.bytes);
    Ok(())
}
