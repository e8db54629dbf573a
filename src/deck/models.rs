//! Data models for generated decks
//!
//! These mirror the records a study client keeps in its collection: a
//! deck, a note type ("model") with fields and card templates, and notes.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use super::identity::field_checksum;

/// Separator between a note's fields in the collection database
pub const FIELD_SEPARATOR: char = '\x1f';

/// A deck of cards
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl Deck {
    pub fn new(id: i64, name: String) -> Self {
        Self {
            id,
            name,
            description: String::new(),
        }
    }

    pub(crate) fn to_collection_json(&self, mod_time: i64) -> Value {
        json!({
            "collapsed": false,
            "conf": 1,
            "desc": self.description,
            "dyn": 0,
            "extendNew": 0,
            "extendRev": 50,
            "id": self.id,
            "lrnToday": [0, 0],
            "mod": mod_time,
            "name": self.name,
            "newToday": [0, 0],
            "revToday": [0, 0],
            "timeToday": [0, 0],
            "usn": -1,
        })
    }
}

/// A card template of a note type
#[derive(Debug, Clone, Serialize)]
pub struct CardTemplate {
    pub name: String,
    /// Question format
    pub qfmt: String,
    /// Answer format
    pub afmt: String,
}

/// A note type: named fields plus the templates that render them
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteModel {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
    pub templates: Vec<CardTemplate>,
    pub css: String,
}

impl NoteModel {
    /// Field indexes each template needs to be non-empty, in the
    /// `[ord, "any", [field, ...]]` form the collection expects
    fn required_fields(&self) -> Value {
        let reference = Regex::new(r"\{\{([^}]+)\}\}").unwrap();
        let reqs: Vec<Value> = self
            .templates
            .iter()
            .enumerate()
            .map(|(ord, template)| {
                let mut needed = BTreeSet::new();
                for caps in reference.captures_iter(&template.qfmt) {
                    let name = caps[1].rsplit(':').next().unwrap_or_default();
                    let name = name.trim_start_matches(['#', '^', '/']).trim();
                    if let Some(idx) = self.fields.iter().position(|f| f == name) {
                        needed.insert(idx);
                    }
                }
                json!([ord, "any", needed.into_iter().collect::<Vec<_>>()])
            })
            .collect();
        Value::Array(reqs)
    }

    pub(crate) fn to_collection_json(&self, deck_id: i64, mod_time: i64) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .enumerate()
            .map(|(ord, name)| {
                json!({
                    "font": "Liberation Sans",
                    "media": [],
                    "name": name,
                    "ord": ord,
                    "rtl": false,
                    "size": 20,
                    "sticky": false,
                })
            })
            .collect();

        let templates: Vec<Value> = self
            .templates
            .iter()
            .enumerate()
            .map(|(ord, t)| {
                json!({
                    "afmt": t.afmt,
                    "bafmt": "",
                    "bqfmt": "",
                    "did": null,
                    "name": t.name,
                    "ord": ord,
                    "qfmt": t.qfmt,
                })
            })
            .collect();

        json!({
            "css": self.css,
            "did": deck_id,
            "flds": fields,
            "id": self.id.to_string(),
            "latexPost": "\\end{document}",
            "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
            "mod": mod_time,
            "name": self.name,
            "req": self.required_fields(),
            "sortf": 0,
            "tags": [],
            "tmpls": templates,
            "type": 0,
            "usn": -1,
            "vers": [],
        })
    }
}

/// One note; every template of its model yields one card
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub guid: String,
    pub fields: Vec<String>,
    pub tags: Vec<String>,
}

impl Note {
    /// Tags in collection form: space separated, padded with spaces
    pub fn tags_string(&self) -> String {
        if self.tags.is_empty() {
            String::new()
        } else {
            format!(" {} ", self.tags.join(" "))
        }
    }

    pub fn joined_fields(&self) -> String {
        let mut joined = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                joined.push(FIELD_SEPARATOR);
            }
            joined.push_str(field);
        }
        joined
    }

    /// First field with markup removed, used for sorting and duplicate checks
    pub fn sort_field(&self) -> String {
        strip_html_media(self.fields.first().map(String::as_str).unwrap_or_default())
    }

    pub fn checksum(&self) -> i64 {
        field_checksum(&self.sort_field())
    }
}

/// Strip tags, keep media file names, decode entities
pub fn strip_html_media(html: &str) -> String {
    let img_re = Regex::new(r#"(?i)<img[^>]*?src=["']?([^"'>\s]+)["']?[^>]*>"#).unwrap();
    let text = img_re.replace_all(html, " $1 ");
    let tag_re = Regex::new(r"(?s)<[^>]+>").unwrap();
    let text = tag_re.replace_all(&text, "");
    html_escape::decode_html_entities(&text).trim().to_string()
}
