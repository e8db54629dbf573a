//! Deck generation from section exports
//!
//! Every export is a TSV with a header row whose first column names the
//! condition. Conditions are merged across exports (first occurrence wins,
//! later ones only add their section as a block tag) and each populated
//! column becomes one note.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;

use crate::stamp::VersionStamp;

use super::identity::{guid_for, stable_id};
use super::models::{CardTemplate, Deck, Note, NoteModel};
use super::package::write_package;
use super::{DeckError, Result, DEFAULT_VOICE, FALLBACK_VOICES};

const NEVER_MISS_COLUMN: &str = "Never Miss";
const MORE_INFO_COLUMN: &str = "More Info";
const SIGNS_COLUMN: &str = "Salient Signs & Symptoms";
const DIAGNOSTICS_COLUMN: &str = "Diagnostics";
const PRESENTATION_COLUMN: &str = "USMLE Classic Presentation";

const CARD_CSS: &str = r#"
.card { font-family: arial; font-size: 20px; text-align: center; color: black; background-color: white; }
.label { font-size: 16px; color: #666; margin-bottom: 10px; }
.answer { margin-top: 20px; }
.warning { color: red; font-weight: bold; font-size: 16px; border: 2px solid red; padding: 10px; margin-top: 15px; display: inline-block;}
.more-info { margin-top: 15px; font-size: 16px; }
.more-info a { color: #007bff; text-decoration: none; font-weight: bold; }
.tags-display { font-size: 12px; color: #aaa; margin-top: 30px; font-style: italic; }
"#;

/// Inputs of one deck build
#[derive(Debug, Clone)]
pub struct DeckOptions {
    pub title: String,
    pub output: PathBuf,
    /// Version label embedded in the deck; normally a [`VersionStamp`]
    pub version: String,
    pub voice: String,
    pub tag_prefix: String,
}

impl DeckOptions {
    pub fn new(title: &str, output: PathBuf, version: &str) -> Self {
        Self {
            title: title.to_string(),
            output,
            version: version.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            tag_prefix: "TRISH".to_string(),
        }
    }

    /// Timestamp written into the package. A stamp label pins it so that
    /// rebuilding the same content yields the same bytes.
    pub fn build_time(&self) -> i64 {
        VersionStamp::parse(&self.version)
            .map(|s| s.epoch_seconds())
            .unwrap_or_else(|_| Utc::now().timestamp())
    }
}

/// Default package name for a deck title
pub fn default_output_path(title: &str) -> PathBuf {
    let safe: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    PathBuf::from(format!("{}.apkg", safe))
}

/// Outcome of a deck build
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub title: String,
    pub output: PathBuf,
    pub version: String,
    pub inputs: usize,
    pub conditions: usize,
    /// Notes generated from spreadsheet cells, excluding the version note
    pub content_notes: usize,
    pub voice: String,
}

/// One parsed export
#[derive(Debug, Clone)]
pub struct SectionTable {
    /// Upper-cased file stem, used as the block tag
    pub block: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A condition after merging all exports
#[derive(Debug, Clone)]
pub struct Condition {
    pub name: String,
    pub cells: HashMap<String, String>,
    pub blocks: BTreeSet<String>,
}

impl Condition {
    fn cell(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or_default()
    }
}

/// Conditions in first-seen order plus the column layout
#[derive(Debug, Clone, Default)]
pub struct MergedConditions {
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
}

/// Read one TSV export
pub fn load_section(path: &Path) -> Result<SectionTable> {
    if !path.exists() {
        return Err(DeckError::InputNotFound(path.to_path_buf()));
    }

    let block = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = dedupe_headers(reader.headers()?.iter());
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DeckError::Malformed {
            path: path.to_path_buf(),
            reason: "missing header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    log::debug!("Loaded {} rows from {:?} (block {})", rows.len(), path, block);
    Ok(SectionTable { block, headers, rows })
}

/// Suffix repeated header names with `.1`, `.2`, ... so every column keeps its cells
fn dedupe_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::new();

    for name in names {
        let mut header = name.to_string();
        let mut n = 0;
        while !seen.insert(header.clone()) {
            n += 1;
            header = format!("{}.{}", name, n);
        }
        headers.push(header);
    }
    headers
}

/// Merge sections, de-duplicating conditions case-insensitively
pub fn merge_sections(sections: &[SectionTable]) -> MergedConditions {
    let mut merged = MergedConditions::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for section in sections {
        if section.rows.is_empty() {
            continue;
        }
        if merged.columns.is_empty() {
            merged.columns = section.headers.clone();
        }

        for row in &section.rows {
            let name = row.first().map(|c| c.trim()).unwrap_or_default();
            if name.is_empty() {
                continue;
            }

            let key = name.to_lowercase();
            match index.get(&key) {
                Some(&i) => {
                    merged.conditions[i].blocks.insert(section.block.clone());
                }
                None => {
                    let cells = section
                        .headers
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect();
                    index.insert(key, merged.conditions.len());
                    merged.conditions.push(Condition {
                        name: name.to_string(),
                        cells,
                        blocks: BTreeSet::from([section.block.clone()]),
                    });
                }
            }
        }
    }

    merged
}

/// Tag-safe form of a name
pub fn clean_tag(text: &str) -> String {
    text.trim().replace(' ', "_").replace('&', "and")
}

/// Plain text for speech: line breaks become pauses, markup is dropped
pub fn clean_for_tts(text: &str) -> String {
    let text = text.replace('\n', ". ");
    let tag_re = Regex::new(r"<[^<]+?>").unwrap();
    tag_re.replace_all(&text, "").trim().to_string()
}

/// Preferred voice first, then the fallbacks it does not duplicate
pub fn voice_list(preferred: &str) -> Vec<String> {
    let preferred = preferred.replace(' ', "_");
    let mut voices = vec![preferred.clone()];
    voices.extend(
        FALLBACK_VOICES
            .iter()
            .filter(|v| **v != preferred)
            .map(|v| v.to_string()),
    );
    voices
}

/// The note type shared by every card of a deck
pub fn deck_model(title: &str, voice: &str) -> NoteModel {
    let voices = voice_list(voice).join(",");
    let qfmt = format!(
        r#"
{{{{Question_Display}}}}
<div style="display:none">{{{{tts en_US voices={voices}:Question_TTS}}}}</div>
"#
    );
    let afmt = format!(
        r#"
{{{{FrontSide}}}}
<hr id=answer>
<div class='answer'>{{{{Answer_Display}}}}</div>
{{{{#NeverMiss}}}}<br><br><div class='warning'>Never Miss</div>{{{{/NeverMiss}}}}

{{{{#MoreInfo}}}}
    <div class='more-info'>
        <br><br>
        <a href="{{{{MoreInfo}}}}">📖 Read More</a>
    </div>
{{{{/MoreInfo}}}}

<div class='tags-display'>{{{{BlockTags}}}}</div>

<div style="display:none">{{{{tts en_US voices={voices}:Answer_TTS}}}}</div>
"#
    );

    NoteModel {
        id: stable_id(&format!("{}_Unified_Model_v4", title)),
        name: format!("{} TTS Model v4", title),
        fields: [
            "Question_Display",
            "Answer_Display",
            "Question_TTS",
            "Answer_TTS",
            "NeverMiss",
            "MoreInfo",
            "BlockTags",
        ]
        .iter()
        .map(|f| f.to_string())
        .collect(),
        templates: vec![CardTemplate {
            name: "Card 1".to_string(),
            qfmt,
            afmt,
        }],
        css: CARD_CSS.to_string(),
    }
}

/// The note announcing the deck version
pub fn version_note(title: &str, version: &str, conditions: usize, tag_prefix: &str) -> Note {
    Note {
        guid: guid_for(&["DECK_INFO_CARD", title]),
        fields: vec![
            format!("<b>{}</b><br>Version Information", title),
            format!(
                "Last Updated: <b>{}</b><br>Unique Conditions: {}<br><br>Check for updates regularly.",
                version, conditions
            ),
            "Deck Version Information".to_string(),
            format!("Updated to version {}", version),
            String::new(),
            String::new(),
            String::new(),
        ],
        tags: vec![format!("{}::MetaData", tag_prefix)],
    }
}

/// Prompt shown on the question side, and its spoken form
fn prompts(column: &str) -> (String, String) {
    match column {
        SIGNS_COLUMN => (
            "What are the <u>Salient Signs & Symptoms</u> of".to_string(),
            "What are the Salient Signs and Symptoms of".to_string(),
        ),
        DIAGNOSTICS_COLUMN => (
            "How would you <u>Diagnose</u>".to_string(),
            "How would you Diagnose".to_string(),
        ),
        PRESENTATION_COLUMN => (
            "What <u>condition</u> presents as:".to_string(),
            "What condition presents as".to_string(),
        ),
        other => (
            format!("What is the <u>{}</u> of", other),
            format!("What is the {} of", other),
        ),
    }
}

/// Notes for one condition, one per populated content column
pub fn condition_notes(
    condition: &Condition,
    columns: &[String],
    title: &str,
    tag_prefix: &str,
) -> Vec<Note> {
    let never_miss = condition.cell(NEVER_MISS_COLUMN).to_string();
    let more_info = condition.cell(MORE_INFO_COLUMN).trim().to_string();
    let more_info = if more_info.is_empty() {
        String::new()
    } else {
        condition.cell(MORE_INFO_COLUMN).to_string()
    };

    let block_tags: Vec<String> = condition
        .blocks
        .iter()
        .map(|b| format!("{}::Blocks::{}", tag_prefix, clean_tag(b)))
        .collect();
    let block_display = condition
        .blocks
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let cond_display = html_escape::encode_safe(&condition.name).to_string();
    let cond_tts = clean_for_tts(&condition.name);
    let primary = columns.first().map(String::as_str).unwrap_or_default();

    let mut notes = Vec::new();
    for column in columns {
        if column == primary || column == NEVER_MISS_COLUMN || column == MORE_INFO_COLUMN {
            continue;
        }
        let value = condition.cell(column);
        if value.trim().is_empty() {
            continue;
        }

        let (prompt_html, prompt_text) = prompts(column);
        let value_display = value.replace('\n', "<br>");
        let value_tts = clean_for_tts(value);

        let mut tags = block_tags.clone();
        tags.push(format!(
            "{}::Conditions::{}",
            tag_prefix,
            clean_tag(&condition.name)
        ));

        let (question, answer, question_tts, answer_tts, guid) = if column == PRESENTATION_COLUMN
        {
            tags.push(format!("{}::Presentation", tag_prefix));
            (
                format!("<div class='label'>{}</div><br>{}", prompt_html, value_display),
                cond_display.clone(),
                format!("{}: {}", prompt_text, value_tts),
                cond_tts.clone(),
                guid_for(&[title, condition.name.as_str(), "Presentation"]),
            )
        } else {
            tags.push(format!("{}::{}", tag_prefix, clean_tag(column)));
            (
                format!("<div class='label'>{}</div><br>{}", prompt_html, cond_display),
                value_display,
                format!("{} {}?", prompt_text, cond_tts),
                value_tts,
                guid_for(&[title, condition.name.as_str(), column.as_str()]),
            )
        };

        if never_miss.trim().starts_with('Y') {
            tags.push(format!("{}::Never_Miss", tag_prefix));
        }

        notes.push(Note {
            guid,
            fields: vec![
                question,
                answer,
                question_tts,
                answer_tts,
                never_miss.clone(),
                more_info.clone(),
                block_display.clone(),
            ],
            tags,
        });
    }
    notes
}

/// Build one deck package from one or more exports
pub fn build_deck(options: &DeckOptions, inputs: &[PathBuf]) -> Result<BuildSummary> {
    log::info!(
        "Loading {} files for deck '{}'",
        inputs.len(),
        options.title
    );

    let sections = inputs
        .iter()
        .map(|path| load_section(path))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge_sections(&sections);

    if merged.conditions.is_empty() {
        return Err(DeckError::NoData(options.title.clone()));
    }
    log::info!(
        "Processed {} unique conditions for deck '{}' (version {})",
        merged.conditions.len(),
        options.title,
        options.version
    );

    let model = deck_model(&options.title, &options.voice);
    let mut deck = Deck::new(stable_id(&options.title), options.title.clone());
    deck.description = format!("Version {}", options.version);

    let mut notes = vec![version_note(
        &options.title,
        &options.version,
        merged.conditions.len(),
        &options.tag_prefix,
    )];
    for condition in &merged.conditions {
        notes.extend(condition_notes(
            condition,
            &merged.columns,
            &options.title,
            &options.tag_prefix,
        ));
    }

    write_package(&options.output, &deck, &model, &notes, options.build_time())?;

    let voice = voice_list(&options.voice)
        .into_iter()
        .next()
        .unwrap_or_default();
    log::info!("Deck '{}' saved to {:?}", options.title, options.output);

    Ok(BuildSummary {
        title: options.title.clone(),
        output: options.output.clone(),
        version: options.version.clone(),
        inputs: inputs.len(),
        conditions: merged.conditions.len(),
        content_notes: notes.len() - 1,
        voice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::package::read_summary;
    use std::fs;
    use tempfile::TempDir;

    fn write_tsv(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn table(block: &str, headers: &[&str], rows: &[&[&str]]) -> SectionTable {
        SectionTable {
            block: block.to_string(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_clean_helpers() {
        assert_eq!(clean_tag(" Signs & Symptoms "), "Signs_and_Symptoms");
        assert_eq!(
            clean_for_tts("Fever\n<b>rash</b> on <i>palms</i>"),
            "Fever. rash on palms"
        );
    }

    #[test]
    fn test_voice_list_dedupes_preferred() {
        assert_eq!(
            voice_list("Microsoft Zira"),
            vec![
                "Microsoft_Zira",
                "Apple_Evan_(Enhanced)",
                "Microsoft_David",
                "Google_US_English"
            ]
        );
        assert_eq!(voice_list(DEFAULT_VOICE).len(), 4);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path("TRISH::Cardio v2"), PathBuf::from("TRISH__Cardio_v2.apkg"));
    }

    #[test]
    fn test_merge_dedupes_and_collects_blocks() {
        let cardio = table(
            "CARDIO",
            &["Condition", "Diagnostics"],
            &[&["Sarcoidosis", "Biopsy"], &["", "ignored"], &["Endocarditis", "Blood cultures"]],
        );
        let pulm = table(
            "PULM",
            &["Condition", "Diagnostics"],
            &[&["  sarcoidosis ", "Chest X-ray"]],
        );
        let merged = merge_sections(&[cardio, pulm]);

        assert_eq!(merged.conditions.len(), 2);
        let sarc = &merged.conditions[0];
        assert_eq!(sarc.name, "Sarcoidosis");
        assert_eq!(sarc.cell("Diagnostics"), "Biopsy");
        assert_eq!(
            sarc.blocks.iter().cloned().collect::<Vec<_>>(),
            vec!["CARDIO", "PULM"]
        );
        assert_eq!(merged.conditions[1].name, "Endocarditis");
    }

    #[test]
    fn test_condition_notes_forward_and_reversed() {
        let section = table(
            "CARDIO",
            &[
                "Condition",
                "Salient Signs & Symptoms",
                "USMLE Classic Presentation",
                "Treatment",
                "Never Miss",
                "More Info",
            ],
            &[&[
                "Aortic Dissection",
                "Tearing chest pain\nradiating to back",
                "Tall man with <b>tearing</b> pain",
                "",
                "Yes",
                "https://example.org/ad",
            ]],
        );
        let merged = merge_sections(&[section]);
        let notes = condition_notes(&merged.conditions[0], &merged.columns, "TRISH", "TRISH");

        // Blank Treatment makes no card; special columns make none either
        assert_eq!(notes.len(), 2);

        let signs = &notes[0];
        assert_eq!(
            signs.fields[0],
            "<div class='label'>What are the <u>Salient Signs & Symptoms</u> of</div><br>Aortic Dissection"
        );
        assert_eq!(signs.fields[1], "Tearing chest pain<br>radiating to back");
        assert_eq!(
            signs.fields[2],
            "What are the Salient Signs and Symptoms of Aortic Dissection?"
        );
        assert_eq!(signs.fields[3], "Tearing chest pain. radiating to back");
        assert_eq!(signs.fields[4], "Yes");
        assert_eq!(signs.fields[5], "https://example.org/ad");
        assert_eq!(signs.fields[6], "CARDIO");
        assert_eq!(
            signs.tags,
            vec![
                "TRISH::Blocks::CARDIO",
                "TRISH::Conditions::Aortic_Dissection",
                "TRISH::Salient_Signs_and_Symptoms",
                "TRISH::Never_Miss",
            ]
        );
        assert_eq!(
            signs.guid,
            guid_for(&["TRISH", "Aortic Dissection", "Salient Signs & Symptoms"])
        );

        let presentation = &notes[1];
        assert_eq!(presentation.fields[1], "Aortic Dissection");
        assert_eq!(
            presentation.fields[2],
            "What condition presents as: Tall man with tearing pain"
        );
        assert!(presentation.tags.contains(&"TRISH::Presentation".to_string()));
        assert_eq!(
            presentation.guid,
            guid_for(&["TRISH", "Aortic Dissection", "Presentation"])
        );
    }

    #[test]
    fn test_repeated_headers_keep_both_columns() {
        let temp = TempDir::new().unwrap();
        let path = write_tsv(
            temp.path(),
            "Cardio.tsv",
            "Condition\tTreatment\tTreatment\nAngina\tAspirin\tNitrates\n",
        );
        let section = load_section(&path).unwrap();
        assert_eq!(section.headers, vec!["Condition", "Treatment", "Treatment.1"]);

        let merged = merge_sections(&[section]);
        let notes = condition_notes(&merged.conditions[0], &merged.columns, "TRISH", "TRISH");
        assert_eq!(notes.len(), 2);
        assert_ne!(notes[0].guid, notes[1].guid);
        assert_eq!(notes[0].fields[1], "Aspirin");
        assert_eq!(notes[1].fields[1], "Nitrates");
    }

    #[test]
    fn test_condition_name_is_escaped_on_display() {
        let section = table("RENAL", &["Condition", "Diagnostics"], &[&["A<B", "Labs"]]);
        let merged = merge_sections(&[section]);
        let notes = condition_notes(&merged.conditions[0], &merged.columns, "T", "T");
        assert!(notes[0].fields[0].ends_with("A&lt;B"));
    }

    #[test]
    fn test_build_deck_counts_and_version() {
        let temp = TempDir::new().unwrap();
        let input = write_tsv(
            temp.path(),
            "Cardio.tsv",
            "Condition\tDiagnostics\nAortic Stenosis\tEcho\nPericarditis\tECG\nMyocardial Infarction\tTroponin\n",
        );
        let output = temp.path().join("deck.apkg");
        let options = DeckOptions::new("TRISH", output.clone(), "v2026.10.19.14-05");

        let summary = build_deck(&options, &[input]).unwrap();
        assert_eq!(summary.conditions, 3);
        assert_eq!(summary.content_notes, 3);
        assert_eq!(summary.voice, DEFAULT_VOICE);

        let deck = read_summary(&output).unwrap();
        assert_eq!(deck.name, "TRISH");
        assert_eq!(deck.description, "Version v2026.10.19.14-05");
        assert_eq!(deck.note_count, 4);
        assert_eq!(deck.card_count, 4);

        let content: Vec<_> = deck
            .notes
            .iter()
            .filter(|n| n.tags.contains(&"TRISH::Blocks::CARDIO".to_string()))
            .collect();
        assert_eq!(content.len(), 3);
        assert!(deck.notes.iter().any(|n| n.tags == vec!["TRISH::MetaData"]
            && n.fields[1].contains("v2026.10.19.14-05")));
    }

    #[test]
    fn test_rebuild_with_same_stamp_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let input = write_tsv(
            temp.path(),
            "Renal.tsv",
            "Condition\tDiagnostics\nNephrotic syndrome\tUrine protein\n",
        );
        let first = temp.path().join("a.apkg");
        let second = temp.path().join("b.apkg");

        build_deck(&DeckOptions::new("TRISH", first.clone(), "v2026.10.19.14-05"), &[input.clone()])
            .unwrap();
        build_deck(&DeckOptions::new("TRISH", second.clone(), "v2026.10.19.14-05"), &[input])
            .unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_guids_survive_content_edits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Renal.tsv");
        let output = temp.path().join("deck.apkg");
        let options = DeckOptions::new("TRISH", output.clone(), "v2026.10.19.14-05");

        fs::write(&path, "Condition\tDiagnostics\nNephrotic syndrome\tUrine protein\n").unwrap();
        build_deck(&options, &[path.clone()]).unwrap();
        let before = read_summary(&output).unwrap();

        fs::write(&path, "Condition\tDiagnostics\nNephrotic syndrome\t24h urine protein > 3.5 g\n")
            .unwrap();
        build_deck(&options, &[path]).unwrap();
        let after = read_summary(&output).unwrap();

        let guids = |s: &crate::deck::DeckSummary| {
            s.notes.iter().map(|n| n.guid.clone()).collect::<BTreeSet<_>>()
        };
        assert_eq!(guids(&before), guids(&after));
    }

    #[test]
    fn test_missing_input_fails() {
        let temp = TempDir::new().unwrap();
        let options = DeckOptions::new("TRISH", temp.path().join("d.apkg"), "Unknown");
        let err = build_deck(&options, &[temp.path().join("nope.tsv")]).unwrap_err();
        assert!(matches!(err, DeckError::InputNotFound(_)));
        assert!(!temp.path().join("d.apkg").exists());
    }

    #[test]
    fn test_empty_inputs_fail() {
        let temp = TempDir::new().unwrap();
        let input = write_tsv(temp.path(), "Skin.tsv", "Condition\tDiagnostics\n");
        let options = DeckOptions::new("TRISH", temp.path().join("d.apkg"), "Unknown");
        assert!(matches!(
            build_deck(&options, &[input]),
            Err(DeckError::NoData(_))
        ));

        let blank = write_tsv(temp.path(), "Blank.tsv", "");
        assert!(matches!(
            build_deck(&options, &[blank]),
            Err(DeckError::Malformed { .. })
        ));
    }
}
