//! `.apkg` package writing and inspection
//!
//! Package layout:
//! ```text
//! deck.apkg (zip)
//! ├── collection.anki2   # SQLite collection, schema version 11
//! └── media              # JSON map of media files, always "{}"
//! ```
//!
//! Every timestamp and row id comes from the caller's build time, and zip
//! entries carry that time too, so equal inputs give equal bytes.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike};
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::models::{Deck, Note, NoteModel, FIELD_SEPARATOR};
use super::{DeckError, Result};

const COLLECTION_FILE: &str = "collection.anki2";
const MEDIA_FILE: &str = "media";

const SCHEMA: &str = r#"
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
    guid            text not null,
    mid             integer not null,
    mod             integer not null,
    usn             integer not null,
    tags            text not null,
    flds            text not null,
    sfld            integer not null,
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
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
"#;

/// Collection-wide settings
fn collection_conf(deck_id: i64, model_id: i64) -> Value {
    json!({
        "activeDecks": [deck_id],
        "addToCur": true,
        "collapseTime": 1200,
        "curDeck": deck_id,
        "curModel": model_id.to_string(),
        "dueCounts": true,
        "estTimes": true,
        "newBury": true,
        "newSpread": 0,
        "nextPos": 1,
        "sortBackwards": false,
        "sortType": "noteFld",
        "timeLim": 0,
    })
}

/// Default review options ("options group" 1)
fn deck_conf(mod_time: i64) -> Value {
    json!({
        "1": {
            "autoplay": true,
            "id": 1,
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
            "maxTaken": 60,
            "mod": mod_time,
            "name": "Default",
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "replayq": true,
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
            "timer": 0,
            "usn": 0,
        }
    })
}

fn default_deck(mod_time: i64) -> Value {
    let mut deck = Deck::new(1, "Default".to_string()).to_collection_json(mod_time);
    deck["usn"] = json!(0);
    deck
}

/// Zip entry time for a Unix timestamp; zip cannot represent years before 1980
fn zip_time(timestamp: i64) -> zip::DateTime {
    DateTime::from_timestamp(timestamp, 0)
        .and_then(|dt| {
            let dt = dt.naive_utc();
            zip::DateTime::from_date_and_time(
                u16::try_from(dt.year()).ok()?,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

fn write_collection(
    path: &Path,
    deck: &Deck,
    model: &NoteModel,
    notes: &[Note],
    timestamp: i64,
) -> Result<()> {
    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;

    let models = json!({ model.id.to_string(): model.to_collection_json(deck.id, timestamp) });
    let decks = json!({
        "1": default_deck(timestamp),
        deck.id.to_string(): deck.to_collection_json(timestamp),
    });

    tx.execute(
        "INSERT INTO col VALUES (NULL, ?1, ?2, ?3, 11, 0, 0, 0, ?4, ?5, ?6, ?7, '{}')",
        params![
            timestamp,
            timestamp * 1000,
            timestamp * 1000,
            serde_json::to_string(&collection_conf(deck.id, model.id))?,
            serde_json::to_string(&models)?,
            serde_json::to_string(&decks)?,
            serde_json::to_string(&deck_conf(timestamp))?,
        ],
    )?;

    let mut next_id = timestamp * 1000;
    for (position, note) in notes.iter().enumerate() {
        let note_id = next_id;
        next_id += 1;

        tx.execute(
            "INSERT INTO notes VALUES (?1, ?2, ?3, ?4, -1, ?5, ?6, ?7, ?8, 0, '')",
            params![
                note_id,
                note.guid,
                model.id,
                timestamp,
                note.tags_string(),
                note.joined_fields(),
                note.sort_field(),
                note.checksum(),
            ],
        )?;

        for ord in 0..model.templates.len() {
            let card_id = next_id;
            next_id += 1;
            tx.execute(
                "INSERT INTO cards VALUES (?1, ?2, ?3, ?4, ?5, -1, 0, 0, ?6, 0, 0, 0, 0, 0, 0, 0, 0, '')",
                params![card_id, note_id, deck.id, ord as i64, timestamp, position as i64 + 1],
            )?;
        }
    }

    tx.commit()?;
    conn.close().map_err(|(_, e)| DeckError::Sqlite(e))?;
    Ok(())
}

/// Write a package with one deck, one note type and the given notes
pub fn write_package(
    output: &Path,
    deck: &Deck,
    model: &NoteModel,
    notes: &[Note],
    timestamp: i64,
) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let scratch = tempfile::TempDir::new()?;
    let db_path = scratch.path().join(COLLECTION_FILE);
    write_collection(&db_path, deck, model, notes, timestamp)?;
    let collection = fs::read(&db_path)?;

    let file = File::create(output)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip_time(timestamp));

    zip.start_file(COLLECTION_FILE, options)?;
    zip.write_all(&collection)?;
    zip.start_file(MEDIA_FILE, options)?;
    zip.write_all(b"{}")?;
    zip.finish()?;

    log::debug!(
        "Wrote {} notes ({} bytes of collection) to {:?}",
        notes.len(),
        collection.len(),
        output
    );
    Ok(())
}

/// A note as stored in a package
#[derive(Debug, Clone, Serialize)]
pub struct NoteRecord {
    pub guid: String,
    pub fields: Vec<String>,
    pub tags: Vec<String>,
}

/// What a package contains
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub name: String,
    pub description: String,
    pub note_count: usize,
    pub card_count: usize,
    pub tags: BTreeSet<String>,
    pub notes: Vec<NoteRecord>,
}

/// Open a package and summarise its deck and notes
pub fn read_summary(path: &Path) -> Result<DeckSummary> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let scratch = tempfile::TempDir::new()?;
    let db_path = scratch.path().join(COLLECTION_FILE);
    {
        let mut entry = archive.by_name(COLLECTION_FILE).map_err(|_| {
            DeckError::InvalidPackage(format!("{} has no {}", path.display(), COLLECTION_FILE))
        })?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        fs::write(&db_path, bytes)?;
    }

    let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let decks_json: String = conn.query_row("SELECT decks FROM col", [], |row| row.get(0))?;
    let decks: Value = serde_json::from_str(&decks_json)?;
    let deck = decks
        .as_object()
        .and_then(|map| map.values().find(|d| d["id"].as_i64() != Some(1)))
        .ok_or_else(|| DeckError::InvalidPackage("no deck in collection".to_string()))?;

    let card_count: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;

    let mut stmt = conn.prepare("SELECT guid, flds, tags FROM notes ORDER BY id")?;
    let notes = stmt
        .query_map([], |row| {
            let guid: String = row.get(0)?;
            let flds: String = row.get(1)?;
            let tags: String = row.get(2)?;
            Ok(NoteRecord {
                guid,
                fields: flds.split(FIELD_SEPARATOR).map(str::to_string).collect(),
                tags: tags.split_whitespace().map(str::to_string).collect(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let tags = notes.iter().flat_map(|n| n.tags.iter().cloned()).collect();

    Ok(DeckSummary {
        name: deck["name"].as_str().unwrap_or_default().to_string(),
        description: deck["desc"].as_str().unwrap_or_default().to_string(),
        note_count: notes.len(),
        card_count: card_count as usize,
        tags,
        notes,
    })
}
