//! .apkg 写入
//!
//! .apkg 实际上是一个 zip：
//! - `collection.anki2`：SQLite 集合（col / notes / cards / revlog / graves）
//! - `0`, `1`, ...：媒体文件，按序号命名
//! - `media`：JSON，序号 -> 原始文件名

use chrono::Utc;
use regex::Regex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DeckError, DeckResult};
use crate::models::Note;

pub const COLLECTION_FILE: &str = "collection.anki2";
pub const MEDIA_MANIFEST: &str = "media";
pub const MODEL_NAME: &str = "Sentence Model with Audio";
/// 笔记字段顺序，`Note.fields` 与之一一对应
pub const FIELD_NAMES: [&str; 6] = ["Sentence", "Translation", "Context", "Audio", "Topic", "Word"];
pub const FIELD_SEPARATOR: char = '\x1f';

const DEFAULT_DECK_ID: i64 = 1;

static RE_HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

#[derive(Serialize, Deserialize)]
struct AnkiModel {
    #[serde(rename = "vers")]
    version: Vec<i32>,
    name: String,
    #[serde(rename = "type")]
    model_type: i32,
    #[serde(rename = "mod")]
    modified: i64,
    #[serde(rename = "usn")]
    update_sequence_number: i32,
    #[serde(rename = "sortf")]
    sort_field: i32,
    #[serde(rename = "did")]
    deck_id: i64,
    #[serde(rename = "tmpls")]
    templates: Vec<AnkiTemplate>,
    #[serde(rename = "flds")]
    fields: Vec<AnkiField>,
    css: String,
    #[serde(rename = "latexPre")]
    latex_pre: String,
    #[serde(rename = "latexPost")]
    latex_post: String,
    tags: Vec<String>,
    id: i64,
    req: Vec<Vec<serde_json::Value>>,
}

#[derive(Serialize, Deserialize)]
struct AnkiTemplate {
    name: String,
    ord: i32,
    qfmt: String,
    afmt: String,
    #[serde(rename = "bqfmt")]
    browser_qfmt: String,
    #[serde(rename = "bafmt")]
    browser_afmt: String,
    #[serde(rename = "did")]
    deck_id: Option<i64>,
    #[serde(rename = "bfont")]
    browser_font: String,
    #[serde(rename = "bsize")]
    browser_size: i32,
}

#[derive(Serialize, Deserialize)]
struct AnkiField {
    name: String,
    ord: i32,
    sticky: bool,
    rtl: bool,
    font: String,
    size: i32,
    #[serde(rename = "media")]
    media: Vec<String>,
    description: String,
}

/// 本次运行共享的笔记类型：字段布局 + 卡片模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteLayout {
    pub model_id: i64,
    pub name: String,
    pub fields: Vec<String>,
    pub front_template: String,
    pub back_template: String,
    pub css: String,
}

impl NoteLayout {
    /// 正面：例句 + 朗读 + 主题/词条提示；背面：译文 + 语境
    pub fn listen_and_repeat(model_id: i64) -> Self {
        Self {
            model_id,
            name: MODEL_NAME.to_string(),
            fields: FIELD_NAMES.iter().map(|f| f.to_string()).collect(),
            front_template: "<div class=\"sentence\">{{Sentence}}</div>\n{{Audio}}\n<div class=\"hint\">{{Topic}} · {{Word}}</div>".to_string(),
            back_template: "{{FrontSide}}\n\n<hr id=answer>\n\n<div class=\"translation\">{{Translation}}</div>\n<br>\n<div class=\"context\">Context: {{Context}}</div>".to_string(),
            css: ".card {\n font-family: arial;\n font-size: 22px;\n text-align: center;\n color: black;\n background-color: white;\n}\n.hint {\n font-size: 14px;\n color: #888;\n margin-top: 12px;\n}\n.context {\n font-size: 16px;\n color: #555;\n}".to_string(),
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    fn to_anki_model(&self, deck_id: i64, now: i64) -> AnkiModel {
        let fields = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, field_name)| AnkiField {
                name: field_name.clone(),
                ord: i as i32,
                sticky: false,
                rtl: false,
                font: "Arial".to_string(),
                size: 20,
                media: vec![],
                description: "".to_string(),
            })
            .collect();

        AnkiModel {
            version: vec![],
            name: self.name.clone(),
            model_type: 0,
            modified: now,
            update_sequence_number: -1,
            sort_field: 0,
            deck_id,
            templates: vec![AnkiTemplate {
                name: "Card 1".to_string(),
                ord: 0,
                qfmt: self.front_template.clone(),
                afmt: self.back_template.clone(),
                browser_qfmt: "".to_string(),
                browser_afmt: "".to_string(),
                deck_id: None,
                browser_font: "Arial".to_string(),
                browser_size: 12,
            }],
            fields,
            css: self.css.clone(),
            latex_pre: "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n".to_string(),
            latex_post: "\\end{document}".to_string(),
            tags: vec![],
            id: self.model_id,
            // 第 0 个字段非空即可生成卡片
            req: vec![vec![
                serde_json::Value::from(0),
                serde_json::Value::from("any"),
                serde_json::Value::Array(vec![serde_json::Value::from(0)]),
            ]],
        }
    }
}

/// 待写入包内的媒体文件
#[derive(Debug, Clone, Copy)]
pub struct MediaEntry<'a> {
    pub file_name: &'a str,
    pub path: &'a Path,
}

fn deck_json(deck_id: i64, name: &str, now: i64) -> serde_json::Value {
    serde_json::json!({
        "id": deck_id,
        "name": name,
        "extendRev": 50,
        "usn": 0,
        "collapsed": false,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0],
        "dyn": 0,
        "extendNew": 10,
        "conf": 1,
        "desc": "",
        "browserCollapsed": true,
        "mod": now
    })
}

/// 初始化集合数据库结构并写入 col 行
fn initialize_collection(
    conn: &Connection,
    layout: &NoteLayout,
    deck_id: i64,
    deck_name: &str,
) -> DeckResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE col (
            id              integer primary key,
            crt             integer not null,
            mod             integer not null,
            scm             integer not null,
            ver             integer not null,
            dty             integer not null,
            usn             integer not null,
            ls              integer not null,
            conf            text not null,
            models          text not null,
            decks           text not null,
            dconf           text not null,
            tags            text not null
        );

        CREATE TABLE notes (
            id              integer primary key,
            guid            text not null unique,
            mid             integer not null,
            mod             integer not null,
            usn             integer not null,
            tags            text not null,
            flds            text not null,
            sfld            text not null,
            csum            integer not null,
            flags           integer not null,
            data            text not null
        );

        CREATE TABLE cards (
            id              integer primary key,
            nid             integer not null,
            did             integer not null,
            ord             integer not null,
            mod             integer not null,
            usn             integer not null,
            type            integer not null,
            queue           integer not null,
            due             integer not null,
            ivl             integer not null,
            factor          integer not null,
            reps            integer not null,
            lapses          integer not null,
            left            integer not null,
            odue            integer not null,
            odid            integer not null,
            flags           integer not null,
            data            text not null
        );

        CREATE TABLE revlog (
            id              integer primary key,
            cid             integer not null,
            usn             integer not null,
            ease            integer not null,
            ivl             integer not null,
            lastIvl         integer not null,
            factor          integer not null,
            time            integer not null,
            type            integer not null
        );

        CREATE TABLE graves (
            usn             integer not null,
            oid             integer not null,
            type            integer not null
        );

        CREATE INDEX ix_cards_nid on cards (nid);
        CREATE INDEX ix_cards_sched on cards (did, queue, due);
        CREATE INDEX ix_cards_usn on cards (usn);
        CREATE INDEX ix_notes_usn on notes (usn);
        CREATE INDEX ix_notes_csum on notes (csum);
        CREATE INDEX ix_revlog_usn on revlog (usn);
        CREATE INDEX ix_revlog_cid on revlog (cid);
    "#,
    )?;

    let now = Utc::now().timestamp();

    let mut decks = serde_json::Map::new();
    decks.insert(
        DEFAULT_DECK_ID.to_string(),
        deck_json(DEFAULT_DECK_ID, "Default", now),
    );
    decks.insert(deck_id.to_string(), deck_json(deck_id, deck_name, now));

    let mut models = serde_json::Map::new();
    models.insert(
        layout.model_id.to_string(),
        serde_json::to_value(layout.to_anki_model(deck_id, now))
            .map_err(|e| DeckError::Packaging(format!("序列化笔记类型失败: {}", e)))?,
    );

    let conf = serde_json::json!({
        "nextPos": 1,
        "estTimes": true,
        "activeDecks": [deck_id],
        "sortType": "noteFld",
        "timeLim": 0,
        "sortBackwards": false,
        "addToCur": true,
        "curDeck": deck_id,
        "newBury": 0,
        "newSpread": 0,
        "dueCounts": true,
        "curModel": layout.model_id.to_string(),
        "collapseTime": 1200
    });

    let dconf = serde_json::json!({
        "1": {
            "id": 1,
            "name": "Default",
            "replayq": true,
            "lapse": {
                "leechFails": 8,
                "minInt": 1,
                "leechAction": 0,
                "delays": [10],
                "mult": 0.0
            },
            "rev": {
                "perDay": 200,
                "ivlFct": 1.0,
                "maxIvl": 36500,
                "ease4": 1.3,
                "bury": true,
                "minSpace": 1
            },
            "timer": 0,
            "maxTaken": 60,
            "usn": 0,
            "new": {
                "perDay": 20,
                "delays": [1, 10],
                "separate": true,
                "ints": [1, 4, 7],
                "initialFactor": 2500,
                "bury": true,
                "order": 1
            },
            "mod": now,
            "autoplay": true
        }
    });

    conn.execute(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags) VALUES (1, ?, ?, ?, 11, 0, 0, 0, ?, ?, ?, ?, '{}')",
        params![
            now,
            now * 1000,
            now * 1000,
            conf.to_string(),
            serde_json::Value::Object(models).to_string(),
            serde_json::Value::Object(decks).to_string(),
            dconf.to_string()
        ],
    )?;
    Ok(())
}

/// 排序字段：去掉 HTML 标签
pub fn strip_html(text: &str) -> String {
    RE_HTML_TAG.replace_all(text, "").trim().to_string()
}

/// 字段校验和：排序字段 SHA1 的前 8 位十六进制
pub fn field_checksum(text: &str) -> i64 {
    let digest = Sha1::digest(strip_html(text).as_bytes());
    i64::from(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

fn format_tags(tags: &[String]) -> String {
    let cleaned: Vec<String> = tags
        .iter()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join("_"))
        .filter(|t| !t.is_empty())
        .collect();
    if cleaned.is_empty() {
        String::new()
    } else {
        format!(" {} ", cleaned.join(" "))
    }
}

fn insert_notes(
    conn: &mut Connection,
    layout: &NoteLayout,
    deck_id: i64,
    notes: &[Note],
) -> DeckResult<()> {
    let now = Utc::now().timestamp();
    let base_id = Utc::now().timestamp_millis();
    let tx = conn.transaction()?;
    for (i, note) in notes.iter().enumerate() {
        if note.fields.len() != layout.fields.len() {
            return Err(DeckError::Packaging(format!(
                "note {} has {} fields, layout expects {}",
                note.guid,
                note.fields.len(),
                layout.fields.len()
            )));
        }
        let note_id = base_id + i as i64;
        let flds = note
            .fields
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&FIELD_SEPARATOR.to_string());
        let sort_field = strip_html(&note.fields[0]);

        tx.execute(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data) VALUES (?, ?, ?, ?, -1, ?, ?, ?, ?, 0, '')",
            params![
                note_id,
                note.guid,
                layout.model_id,
                now,
                format_tags(&note.tags),
                flds,
                sort_field,
                field_checksum(&note.fields[0])
            ],
        )?;

        // 每条笔记只有一个模板，对应一张新卡
        tx.execute(
            "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor, reps, lapses, left, odue, odid, flags, data) VALUES (?, ?, ?, 0, ?, -1, 0, 0, ?, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            params![note_id, note_id, deck_id, now, i as i64 + 1],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// 生成 .apkg 字节。
///
/// 每个媒体文件写入 zip 后立即回调 `on_embedded`，调用方可借此删除临时文件。
/// `work_dir` 用于存放临时集合数据库，返回前删除。
pub fn write_apkg<F>(
    layout: &NoteLayout,
    deck_id: i64,
    deck_name: &str,
    notes: &[Note],
    media: &[MediaEntry<'_>],
    work_dir: &Path,
    mut on_embedded: F,
) -> DeckResult<Vec<u8>>
where
    F: FnMut(&MediaEntry<'_>),
{
    let db_path = work_dir.join(COLLECTION_FILE);
    if db_path.exists() {
        fs::remove_file(&db_path)
            .map_err(|e| DeckError::Packaging(format!("清理旧集合文件失败: {}", e)))?;
    }

    let result = (|| -> DeckResult<Vec<u8>> {
        let mut conn = Connection::open(&db_path)?;
        initialize_collection(&conn, layout, deck_id, deck_name)?;
        insert_notes(&mut conn, layout, deck_id, notes)?;
        conn.close().map_err(|(_, e)| DeckError::from(e))?;

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        let db_content = fs::read(&db_path)
            .map_err(|e| DeckError::Packaging(format!("读取集合数据库失败: {}", e)))?;
        zip.start_file(COLLECTION_FILE, options)?;
        zip.write_all(&db_content)
            .map_err(|e| DeckError::Packaging(format!("写入集合数据库失败: {}", e)))?;

        let mut manifest = serde_json::Map::new();
        for (i, entry) in media.iter().enumerate() {
            let ordinal = i.to_string();
            {
                let mut file = File::open(entry.path).map_err(|e| {
                    DeckError::Packaging(format!("打开媒体文件 {} 失败: {}", entry.file_name, e))
                })?;
                zip.start_file(ordinal.as_str(), options)?;
                std::io::copy(&mut file, &mut zip).map_err(|e| {
                    DeckError::Packaging(format!("写入媒体文件 {} 失败: {}", entry.file_name, e))
                })?;
            }
            on_embedded(entry);
            manifest.insert(ordinal, serde_json::Value::from(entry.file_name));
        }

        zip.start_file(MEDIA_MANIFEST, options)?;
        zip.write_all(serde_json::Value::Object(manifest).to_string().as_bytes())
            .map_err(|e| DeckError::Packaging(format!("写入媒体清单失败: {}", e)))?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    })();

    if let Err(e) = fs::remove_file(&db_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("[Apkg] 清理集合数据库失败: {}", e);
        }
    }
    if let Ok(bytes) = &result {
        debug!(
            "[Apkg] 写入完成：{} 条笔记，{} 个媒体文件，{} 字节",
            notes.len(),
            media.len(),
            bytes.len()
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn note(sentence: &str) -> Note {
        Note {
            guid: uuid::Uuid::new_v4().simple().to_string(),
            fields: vec![
                sentence.to_string(),
                "çeviri".to_string(),
                "bağlam".to_string(),
                "[sound:a.mp3]".to_string(),
                "travel".to_string(),
                "gehen".to_string(),
            ],
            tags: vec!["verb".to_string(), "daily life".to_string()],
        }
    }

    #[test]
    fn test_layout_fields() {
        let layout = NoteLayout::listen_and_repeat(1_500_000_000);
        assert_eq!(layout.fields.len(), 6);
        assert_eq!(layout.field_index("Audio"), Some(3));
        assert!(layout.front_template.contains("{{Sentence}}"));
        assert!(layout.front_template.contains("{{Audio}}"));
        assert!(layout.back_template.contains("{{Translation}}"));
        assert!(layout.back_template.contains("{{Context}}"));
    }

    #[test]
    fn test_field_checksum_ignores_html() {
        assert_eq!(field_checksum("<b>Hallo</b>"), field_checksum("Hallo"));
        assert_ne!(field_checksum("Hallo"), field_checksum("Tschüss"));
        assert!(field_checksum("Hallo") >= 0);
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(
            format_tags(&["verb".to_string(), "daily life".to_string()]),
            " verb daily_life "
        );
        assert_eq!(format_tags(&[]), "");
    }

    #[test]
    fn test_write_apkg_embeds_media_and_reports_each_file() {
        let work = tempfile::tempdir().unwrap();
        let audio_path = work.path().join("a.mp3");
        fs::write(&audio_path, b"ID3audio").unwrap();

        let layout = NoteLayout::listen_and_repeat(1_600_000_000);
        let notes = vec![note("Wir gehen.")];
        let media = [MediaEntry {
            file_name: "a.mp3",
            path: &audio_path,
        }];
        let mut embedded = Vec::new();
        let bytes = write_apkg(
            &layout,
            1_700_000_000,
            "Test Deck",
            &notes,
            &media,
            work.path(),
            |m| embedded.push(m.file_name.to_string()),
        )
        .unwrap();

        assert_eq!(embedded, vec!["a.mp3".to_string()]);
        // 临时集合数据库已删除
        assert!(!work.path().join(COLLECTION_FILE).exists());

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut manifest = String::new();
        archive
            .by_name(MEDIA_MANIFEST)
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(manifest["0"], "a.mp3");

        let mut audio = Vec::new();
        archive.by_name("0").unwrap().read_to_end(&mut audio).unwrap();
        assert_eq!(audio, b"ID3audio");

        let db_out = work.path().join("extracted.anki2");
        let mut db_bytes = Vec::new();
        archive
            .by_name(COLLECTION_FILE)
            .unwrap()
            .read_to_end(&mut db_bytes)
            .unwrap();
        fs::write(&db_out, db_bytes).unwrap();
        let conn = Connection::open(&db_out).unwrap();
        let (flds, tags, sfld): (String, String, String) = conn
            .query_row("SELECT flds, tags, sfld FROM notes", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(flds.split(FIELD_SEPARATOR).count(), 6);
        assert_eq!(sfld, "Wir gehen.");
        assert_eq!(tags, " verb daily_life ");
        let cards: i64 = conn
            .query_row("SELECT COUNT(*) FROM cards WHERE did = 1700000000", [], |r| r.get(0))
            .unwrap();
        assert_eq!(cards, 1);
        let decks: String = conn.query_row("SELECT decks FROM col", [], |r| r.get(0)).unwrap();
        assert!(decks.contains("Test Deck"));
    }

    #[test]
    fn test_write_apkg_rejects_wrong_field_count() {
        let work = tempfile::tempdir().unwrap();
        let layout = NoteLayout::listen_and_repeat(1);
        let mut bad = note("x");
        bad.fields.pop();
        let err = write_apkg(&layout, 2, "d", &[bad], &[], work.path(), |_| {}).unwrap_err();
        assert!(matches!(err, DeckError::Packaging(_)));
        assert!(!work.path().join(COLLECTION_FILE).exists());
    }
}
