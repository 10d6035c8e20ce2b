//! Canonical rendering of a book from a layout template.
//!
//! Templates are plain markdown with `{{name}}` placeholders. `{{highlights}}`
//! expands to the chapter sections in the layout the merge strategy expects.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{BookDetails, ChapterMap, DefinitionMap, Highlight, DEFINITION_PLACEHOLDER};
use crate::merge::append::notes_section;
use crate::merge::line::{note_line, quote_line, vocabulary_line, END_MARKER, START_MARKER};

/// Written in place of a document when the template cannot be rendered
pub const RENDER_ERROR_SENTINEL: &str =
    "%% kobo-highlights: the template could not be rendered, check its placeholders %%";

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = r#"---
title: "{{title}}"
author: "{{author}}"
publisher: "{{publisher}}"
isbn: "{{isbn}}"
series: "{{series}} {{series_number}}"
last_read: "{{date_last_read}}"
status: "{{read_status}}"
progress: "{{percent_read}}"
time_spent: "{{time_spent_reading}}"
language: "{{language}}"
---

# {{title}}

{{highlights}}
"#;

/// How chapter sections are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `## chapter` headings with machine-owned marker regions
    #[default]
    Marked,

    /// One `## Highlights` section with `### chapter` subsections
    Notes,
}

/// A layout template and the layout its highlights expand into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub source: String,
    pub layout: Layout,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            layout: Layout::Marked,
        }
    }
}

impl Template {
    pub fn new(source: impl Into<String>, layout: Layout) -> Self {
        Self {
            source: source.into(),
            layout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    #[error("Unknown placeholder: {{{{{0}}}}}")]
    UnknownPlaceholder(String),
}

/// Render a book, returning [`RENDER_ERROR_SENTINEL`] if the template is
/// malformed
pub fn render(
    template: &Template,
    chapters: &ChapterMap,
    details: &BookDetails,
    definitions: &DefinitionMap,
    language: &str,
) -> String {
    match try_render(template, chapters, details, definitions, language) {
        Ok(text) => text,
        Err(e) => {
            warn!(book = %details.title, error = %e, "Template rendering failed");
            RENDER_ERROR_SENTINEL.to_string()
        }
    }
}

/// Render a book, reporting template errors
pub fn try_render(
    template: &Template,
    chapters: &ChapterMap,
    details: &BookDetails,
    definitions: &DefinitionMap,
    language: &str,
) -> Result<String, TemplateError> {
    let source = template.source.as_str();
    let mut out = String::with_capacity(source.len() * 2);
    let mut rest = source;
    let mut offset = 0usize;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after
            .find("}}")
            .ok_or(TemplateError::Unclosed(offset + open))?;
        let name = after[..close].trim();

        let value = match name {
            "highlights" => match template.layout {
                Layout::Marked => marked_sections(chapters, definitions),
                Layout::Notes => notes_section(chapters, definitions),
            },
            "language" => language.to_string(),
            other => book_field(details, other)
                .ok_or_else(|| TemplateError::UnknownPlaceholder(other.to_string()))?,
        };
        out.push_str(&value);

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    Ok(out)
}

fn book_field(details: &BookDetails, name: &str) -> Option<String> {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let value = match name {
        "title" => details.title.clone(),
        "author" => details.author.clone(),
        "publisher" => opt(&details.publisher),
        "isbn" => opt(&details.isbn),
        "series" => opt(&details.series),
        "series_number" => opt(&details.series_number),
        "date_last_read" => details
            .date_last_read
            .as_deref()
            .map(format_date)
            .unwrap_or_default(),
        "read_status" => details.read_status.to_string(),
        "percent_read" => details
            .percent_read
            .map(|p| format!("{}%", p))
            .unwrap_or_default(),
        "time_spent_reading" => details
            .time_spent_reading
            .map(format_duration)
            .unwrap_or_default(),
        "description" => opt(&details.description),
        _ => return None,
    };
    Some(value)
}

/// Kobo stores RFC 3339 timestamps; show the date part when it parses
fn format_date(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.format("%Y-%m-%d").to_string())
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn format_duration(seconds: i64) -> String {
    let minutes = seconds.max(0) / 60;
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

/// Lines for one highlight (plus its note, if any)
pub fn highlight_lines(highlight: &Highlight, definitions: &DefinitionMap) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);
    if highlight.is_vocabulary() {
        let definition = definitions
            .get(&highlight.text)
            .unwrap_or(DEFINITION_PLACEHOLDER);
        lines.push(vocabulary_line(&highlight.text, definition));
    } else {
        lines.push(quote_line(&highlight.text));
    }
    if let Some(note) = &highlight.note {
        lines.push(note_line(note));
    }
    lines
}

fn marked_sections(chapters: &ChapterMap, definitions: &DefinitionMap) -> String {
    chapters
        .iter()
        .filter(|c| !c.highlights.is_empty())
        .map(|chapter| {
            let mut section = vec![format!("## {}", chapter.name), START_MARKER.to_string()];
            for highlight in &chapter.highlights {
                section.extend(highlight_lines(highlight, definitions));
            }
            section.push(END_MARKER.to_string());
            section.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
