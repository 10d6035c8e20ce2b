//! Highlights and the per-book chapter index built from them.

use serde::{Deserialize, Serialize};

/// Kobo highlight color that marks a vocabulary lookup rather than a quote
pub const VOCABULARY_COLOR: i64 = 1;

/// Chapter name used when the source has none for a highlight
pub const UNKNOWN_CHAPTER: &str = "Unknown chapter";

/// What a highlight represents in the rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// A passage quoted from the book
    Quote,

    /// A single term to be defined and turned into a flashcard
    Vocabulary,
}

impl HighlightKind {
    pub fn from_color(color: i64) -> Self {
        if color == VOCABULARY_COLOR {
            HighlightKind::Vocabulary
        } else {
            HighlightKind::Quote
        }
    }
}

/// A single highlight read from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Highlighted text, folded onto one line
    pub text: String,

    /// Annotation typed on the device (if any)
    pub note: Option<String>,

    /// Raw Kobo color classifier
    pub color: i64,
}

impl Highlight {
    /// Create a highlight, folding the text onto a single line.
    ///
    /// Returns `None` when nothing but whitespace was highlighted.
    pub fn new(text: &str, note: Option<&str>, color: i64) -> Option<Self> {
        let text = fold_line(text);
        if text.is_empty() {
            return None;
        }

        let note = note.map(fold_line).filter(|n| !n.is_empty());

        Some(Self { text, note, color })
    }

    /// Convenience constructor for a quote without a note
    pub fn quote(text: &str) -> Self {
        Self {
            text: fold_line(text),
            note: None,
            color: 0,
        }
    }

    /// Convenience constructor for a vocabulary term
    pub fn vocabulary(term: &str) -> Self {
        Self {
            text: fold_line(term),
            note: None,
            color: VOCABULARY_COLOR,
        }
    }

    pub fn kind(&self) -> HighlightKind {
        HighlightKind::from_color(self.color)
    }

    pub fn is_vocabulary(&self) -> bool {
        self.kind() == HighlightKind::Vocabulary
    }
}

/// Collapse all whitespace runs (newlines included) into single spaces
pub fn fold_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One chapter and its highlights, in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Name as first seen in the source (untrimmed)
    pub name: String,

    pub highlights: Vec<Highlight>,
}

impl Chapter {
    fn contains_text(&self, text: &str) -> bool {
        self.highlights.iter().any(|h| h.text == text)
    }
}

/// Ordered mapping from chapter name to highlights.
///
/// Names compare trimmed but are stored exactly as first seen. A highlight
/// whose text is already present in the chapter is not added again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMap {
    chapters: Vec<Chapter>,
}

impl ChapterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a highlight under a chapter, creating the chapter if needed.
    ///
    /// A blank name is filed under [`UNKNOWN_CHAPTER`] so it can always be
    /// written as a heading.
    ///
    /// Returns `false` if the chapter already held the same text.
    pub fn push(&mut self, chapter_name: &str, highlight: Highlight) -> bool {
        let chapter_name = if chapter_name.trim().is_empty() {
            UNKNOWN_CHAPTER
        } else {
            chapter_name
        };
        let chapter = match self.position(chapter_name) {
            Some(idx) => &mut self.chapters[idx],
            None => {
                self.chapters.push(Chapter {
                    name: chapter_name.to_string(),
                    highlights: Vec::new(),
                });
                let last = self.chapters.len() - 1;
                &mut self.chapters[last]
            }
        };

        if chapter.contains_text(&highlight.text) {
            return false;
        }
        chapter.highlights.push(highlight);
        true
    }

    /// Look up a chapter by (trimmed) name
    pub fn get(&self, chapter_name: &str) -> Option<&Chapter> {
        self.position(chapter_name).map(|idx| &self.chapters[idx])
    }

    fn position(&self, chapter_name: &str) -> Option<usize> {
        let key = chapter_name.trim();
        self.chapters.iter().position(|c| c.name.trim() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Total number of highlights across all chapters
    pub fn highlight_count(&self) -> usize {
        self.chapters.iter().map(|c| c.highlights.len()).sum()
    }

    /// Vocabulary terms in source order
    pub fn vocabulary_terms(&self) -> Vec<String> {
        self.chapters
            .iter()
            .flat_map(|c| c.highlights.iter())
            .filter(|h| h.is_vocabulary())
            .map(|h| h.text.clone())
            .collect()
    }
}
