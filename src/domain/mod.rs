//! Domain types for kobo-highlights.
//!
//! This module contains the core data structures:
//! - Highlight/ChapterMap: What was read from the device
//! - BookDetails: Book metadata
//! - DefinitionMap/UserContentMap: What was recovered from a document

pub mod book;
pub mod document;
pub mod highlight;

// Re-export commonly used types
pub use book::{BookDetails, ReadStatus};
pub use document::{DefinitionMap, UserContentMap, DEFINITION_PLACEHOLDER};
pub use highlight::{
    fold_line, Chapter, ChapterMap, Highlight, HighlightKind, UNKNOWN_CHAPTER, VOCABULARY_COLOR,
};
