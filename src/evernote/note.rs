//! Note payloads, with Evernote's data-model limits applied up front so a
//! bad title or tag doesn't cost a round trip ending in BAD_DATA_FORMAT.

use std::collections::HashSet;

/// Title used when the page had none.
pub const DEFAULT_TITLE: &str = "无标题文档";

const TITLE_MAX_LEN: usize = 255;
const TAG_MAX_LEN: usize = 100;
const MAX_TAGS_PER_NOTE: usize = 100;
const ATTRIBUTE_MAX_LEN: usize = 4096;

const ENML_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#,
);

/// Wrap an ENML fragment in the `en-note` document envelope.
pub fn wrap_enml(body: &str) -> String {
    format!("{ENML_HEADER}<en-note>{body}</en-note>")
}

/// A note ready to be sent to `NoteStore.createNote`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    /// Complete ENML document.
    pub content: String,
    pub tag_names: Vec<String>,
    pub source_url: Option<String>,
    /// `None` saves into the account's default notebook.
    pub notebook_guid: Option<String>,
}

impl NoteDraft {
    pub fn new(
        title: Option<&str>,
        enml_body: &str,
        tags: &[String],
        source_url: Option<&str>,
    ) -> Self {
        Self {
            title: normalize_title(title),
            content: wrap_enml(enml_body),
            tag_names: normalize_tags(tags),
            source_url: source_url.and_then(normalize_source_url),
            notebook_guid: None,
        }
    }
}

/// Strip control characters and surrounding whitespace, cap at 255 chars.
pub fn normalize_title(title: Option<&str>) -> String {
    let cleaned: String = title
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let truncated: String = cleaned.trim().chars().take(TITLE_MAX_LEN).collect();
    let truncated = truncated.trim_end();

    if truncated.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        truncated.to_string()
    }
}

/// Tag names may not contain commas or control characters, must be
/// 1..=100 chars, and are unique per note ignoring case.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for tag in tags {
        let cleaned: String = tag
            .chars()
            .filter(|c| *c != ',' && !c.is_control())
            .collect();
        let cleaned: String = cleaned.trim().chars().take(TAG_MAX_LEN).collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            out.push(cleaned.to_string());
        }
        if out.len() == MAX_TAGS_PER_NOTE {
            break;
        }
    }
    out
}

fn normalize_source_url(url: &str) -> Option<String> {
    let url = url.trim();
    let parsed = url::Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || url.len() > ATTRIBUTE_MAX_LEN {
        return None;
    }
    Some(url.to_string())
}
