//! Download page rewriting
//!
//! The page carries a few markers that point at the current deck. Each
//! marker has its own rule; a rule matches its own output, so running the
//! updater again with the same stamp leaves the page unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::config::PageConfig;
use crate::stamp::VersionStamp;

use super::Result;

/// What the rules look for in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarkers {
    /// Literal token present only before the first run
    pub placeholder: String,
    /// Class of the download button whose text shows the stamp
    pub button_class: String,
    /// `name` attribute of the version meta tag
    pub meta_name: String,
    /// `id` of the footer element holding the version label
    pub footer_id: String,
    pub footer_label: String,
}

impl Default for PageMarkers {
    fn default() -> Self {
        Self::from(&PageConfig::default())
    }
}

impl From<&PageConfig> for PageMarkers {
    fn from(config: &PageConfig) -> Self {
        Self {
            placeholder: config.placeholder.clone(),
            button_class: config.button_class.clone(),
            meta_name: config.meta_name.clone(),
            footer_id: config.footer_id.clone(),
            footer_label: config.footer_label.clone(),
        }
    }
}

/// One rewrite rule, applied in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageRule {
    Placeholder,
    DownloadButton,
    MetaTag,
    Footer,
    DownloadLink,
}

impl PageRule {
    pub const ALL: [PageRule; 5] = [
        PageRule::Placeholder,
        PageRule::DownloadButton,
        PageRule::MetaTag,
        PageRule::Footer,
        PageRule::DownloadLink,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PageRule::Placeholder => "placeholder",
            PageRule::DownloadButton => "download-button",
            PageRule::MetaTag => "meta-tag",
            PageRule::Footer => "footer",
            PageRule::DownloadLink => "download-link",
        }
    }

    /// Rewrite `html`, or `None` when the rule's marker is absent
    pub fn apply(
        &self,
        html: &str,
        stamp: &str,
        artifact: &str,
        markers: &PageMarkers,
    ) -> Option<String> {
        match self {
            PageRule::Placeholder => {
                if markers.placeholder.is_empty() || !html.contains(&markers.placeholder) {
                    None
                } else {
                    Some(html.replace(&markers.placeholder, stamp))
                }
            }
            PageRule::DownloadButton => rewrite_button(html, stamp, &markers.button_class),
            PageRule::MetaTag => rewrite_meta(html, stamp, &markers.meta_name),
            PageRule::Footer => {
                let label = format!("{}{}", markers.footer_label, stamp);
                rewrite_footer(html, &label, &markers.footer_id)
            }
            PageRule::DownloadLink => rewrite_links(html, artifact, &markers.button_class),
        }
    }
}

/// Opening tags with a `class` attribute; group 1 is the tag, group 2 the classes
fn class_tag_re() -> Regex {
    Regex::new(r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\sclass\s*=\s*["']([^"']*)["'][^>]*>"#).unwrap()
}

fn has_class(classes: &str, class: &str) -> bool {
    classes.split_whitespace().any(|c| c == class)
}

/// Replace stamps in the text of every element carrying `class`
fn rewrite_button(html: &str, stamp: &str, class: &str) -> Option<String> {
    let open_re = class_tag_re();
    let stamp_re = VersionStamp::pattern();

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    let mut found = false;

    for caps in open_re.captures_iter(html) {
        let open = caps.get(0).unwrap();
        if open.start() < cursor || !has_class(&caps[2], class) {
            continue;
        }
        let closing_re = Regex::new(&format!(r"(?i)</{}\s*>", regex::escape(&caps[1]))).unwrap();
        let Some(closing) = closing_re.find(&html[open.end()..]) else {
            continue;
        };
        let inner_end = open.end() + closing.start();

        found = true;
        out.push_str(&html[cursor..open.end()]);
        out.push_str(&stamp_re.replace_all(&html[open.end()..inner_end], stamp));
        cursor = inner_end;
    }

    if !found {
        return None;
    }
    out.push_str(&html[cursor..]);
    Some(out)
}

fn rewrite_meta(html: &str, stamp: &str, name: &str) -> Option<String> {
    let name = regex::escape(name);
    let name_first = Regex::new(&format!(
        r#"(?i)(<meta\b[^>]*\sname\s*=\s*["']{name}["'][^>]*\scontent\s*=\s*["'])([^"']*)(["'])"#
    ))
    .unwrap();
    let content_first = Regex::new(&format!(
        r#"(?i)(<meta\b[^>]*\scontent\s*=\s*["'])([^"']*)(["'][^>]*\sname\s*=\s*["']{name}["'])"#
    ))
    .unwrap();

    let replace = |caps: &Captures| format!("{}{}{}", &caps[1], stamp, &caps[3]);
    if name_first.is_match(html) {
        Some(name_first.replace_all(html, replace).into_owned())
    } else if content_first.is_match(html) {
        Some(content_first.replace_all(html, replace).into_owned())
    } else {
        None
    }
}

fn rewrite_footer(html: &str, label: &str, id: &str) -> Option<String> {
    let footer_re = Regex::new(&format!(
        r#"(?i)(<[a-z][a-z0-9]*\b[^>]*\sid\s*=\s*["']{}["'][^>]*>)([^<]*)"#,
        regex::escape(id)
    ))
    .unwrap();

    if !footer_re.is_match(html) {
        return None;
    }
    Some(
        footer_re
            .replace_all(html, |caps: &Captures| format!("{}{}", &caps[1], label))
            .into_owned(),
    )
}

/// Point the `href` and `download` attributes of the download button at the
/// new artifact, keeping any directory prefix
fn rewrite_links(html: &str, artifact: &str, class: &str) -> Option<String> {
    let open_re = class_tag_re();
    let link_re = Regex::new(
        r#"(?i)(\s(?:href|download)\s*=\s*["'])((?:[^"']*/)?)([^"'/]*\.apkg)(["'])"#,
    )
    .unwrap();

    let mut found = false;
    let text = open_re.replace_all(html, |caps: &Captures| {
        let tag = &caps[0];
        if !has_class(&caps[2], class) || !link_re.is_match(tag) {
            return tag.to_string();
        }
        found = true;
        link_re
            .replace_all(tag, |link: &Captures| {
                format!("{}{}{}{}", &link[1], &link[2], artifact, &link[4])
            })
            .into_owned()
    });

    if found {
        Some(text.into_owned())
    } else {
        None
    }
}

/// Result of running every rule over a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub applied: Vec<PageRule>,
    pub skipped: Vec<PageRule>,
}

/// Run the rules in order over `html`
pub fn apply_rules(
    html: &str,
    stamp: &VersionStamp,
    artifact: &str,
    markers: &PageMarkers,
) -> Rewrite {
    let stamp = stamp.to_string();
    let mut text = html.to_string();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for rule in PageRule::ALL {
        match rule.apply(&text, &stamp, artifact, markers) {
            Some(next) => {
                text = next;
                applied.push(rule);
            }
            None => {
                log::debug!("Page marker for rule '{}' not found", rule.name());
                skipped.push(rule);
            }
        }
    }

    Rewrite {
        text,
        applied,
        skipped,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// No page file; nothing to do
    Missing,
    Unchanged,
    Updated,
}

/// Outcome of updating the download page
#[derive(Debug, Clone, Serialize)]
pub struct PageUpdate {
    pub path: PathBuf,
    pub status: PageStatus,
    pub applied: Vec<PageRule>,
    pub skipped: Vec<PageRule>,
}

/// Rewrite the page at `path` in place
pub fn update_page(
    path: &Path,
    stamp: &VersionStamp,
    artifact: &str,
    markers: &PageMarkers,
) -> Result<PageUpdate> {
    if !path.exists() {
        log::warn!("Page {:?} not found, skipping update", path);
        return Ok(PageUpdate {
            path: path.to_path_buf(),
            status: PageStatus::Missing,
            applied: Vec::new(),
            skipped: Vec::new(),
        });
    }

    let original = fs::read_to_string(path)?;
    let rewrite = apply_rules(&original, stamp, artifact, markers);

    let status = if rewrite.text == original {
        PageStatus::Unchanged
    } else {
        fs::write(path, &rewrite.text)?;
        PageStatus::Updated
    };

    for rule in &rewrite.skipped {
        log::warn!("Page {:?} has no {} marker", path, rule.name());
    }
    log::info!(
        "Page {:?} {:?} ({} rules applied) for {}",
        path,
        status,
        rewrite.applied.len(),
        stamp
    );

    Ok(PageUpdate {
        path: path.to_path_buf(),
        status,
        applied: rewrite.applied,
        skipped: rewrite.skipped,
    })
}
