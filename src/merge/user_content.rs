//! Recover human-written text from a document and put it back after a
//! re-render.
//!
//! Anything written after a chapter's end marker and before the next heading
//! belongs to the reader. Everything between a start and an end marker
//! belongs to the exporter and is regenerated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::UserContentMap;

use super::line::Line;

/// What to do with text whose chapter vanished from the new render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Discard it (logged by the caller)
    #[default]
    Drop,

    /// Append it after the last chapter
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractState {
    BeforeAnyChapter,
    InChapter,
    AfterEndMarker,
}

/// Collect every block of human text, keyed by the chapter it trails
pub fn extract_user_content(document: &str) -> UserContentMap {
    let mut map = UserContentMap::new();
    let mut state = ExtractState::BeforeAnyChapter;
    let mut chapter: Option<String> = None;
    let mut block: Vec<&str> = Vec::new();

    for raw in document.lines() {
        match Line::classify(raw) {
            Line::Heading(name) => {
                flush(&mut map, chapter.as_deref(), &mut block);
                chapter = Some(name.trim().to_string());
                state = ExtractState::InChapter;
            }
            Line::EndMarker => {
                state = ExtractState::AfterEndMarker;
            }
            Line::StartMarker => {
                state = ExtractState::InChapter;
            }
            _ if state == ExtractState::AfterEndMarker => block.push(raw),
            _ => {}
        }
    }

    flush(&mut map, chapter.as_deref(), &mut block);
    map
}

fn flush(map: &mut UserContentMap, chapter: Option<&str>, block: &mut Vec<&str>) {
    let text = block.join("\n");
    block.clear();

    let text = text.trim();
    if text.is_empty() {
        return;
    }

    match chapter {
        Some(name) => map.insert_chapter(name, text.to_string()),
        None => map.set_trailing(text.to_string()),
    }
}

/// Result of putting preserved text back into a render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reinserted {
    pub document: String,

    /// Chapters whose preserved text had nowhere to go
    pub orphaned: Vec<String>,
}

/// Re-attach preserved blocks right after each chapter's end marker
pub fn reinsert_user_content(
    rendered: &str,
    content: &UserContentMap,
    orphans: OrphanPolicy,
) -> Reinserted {
    let mut out: Vec<&str> = Vec::new();
    let mut chapter: Option<&str> = None;
    let mut emitted: HashSet<String> = HashSet::new();

    for raw in rendered.lines() {
        out.push(raw);
        match Line::classify(raw) {
            Line::Heading(name) => chapter = Some(name.trim()),
            Line::EndMarker => {
                let Some(name) = chapter else { continue };
                if emitted.contains(name) {
                    continue;
                }
                if let Some(block) = content.chapter(name) {
                    out.push("");
                    out.push(block);
                    emitted.insert(name.to_string());
                }
            }
            _ => {}
        }
    }

    if let Some(block) = content.trailing() {
        out.push("");
        out.push(block);
    }

    let orphaned: Vec<String> = content
        .chapter_names()
        .filter(|name| !emitted.contains(*name))
        .map(str::to_string)
        .collect();

    if orphans == OrphanPolicy::Trailing {
        for name in &orphaned {
            if let Some(block) = content.chapter(name) {
                out.push("");
                out.push(block);
            }
        }
    }

    let mut document = out.join("\n");
    if rendered.ends_with('\n') {
        document.push('\n');
    }

    Reinserted { document, orphaned }
}
