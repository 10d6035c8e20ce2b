//! Adapter interfaces for external systems.
//!
//! Two collaborators sit outside the merge engine: the device database that
//! highlights are read from, and the service that defines vocabulary terms.

pub mod definitions;
pub mod kobo;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::domain::{BookDetails, ChapterMap};

pub use definitions::DefinitionClient;
pub use kobo::{KoboDatabase, SourceError};

/// Where highlights come from
pub trait HighlightSource {
    /// Book title to its chapters, in the requested order
    fn all_highlights(
        &self,
        sort_by_progress: bool,
    ) -> Result<BTreeMap<String, ChapterMap>, SourceError>;

    /// Book title to the device's identifier for it
    fn all_books(&self) -> Result<BTreeMap<String, String>, SourceError>;

    /// Metadata for a book; unknown titles get bare details
    fn book_details(&self, title: &str) -> Result<BookDetails, SourceError>;

    fn empty_content_map(&self) -> ChapterMap {
        ChapterMap::new()
    }
}

/// Trait for definition services
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Whether a model is set up; when false every term gets the placeholder
    fn is_configured(&self) -> bool;

    /// Define every term. Never fails: a term that cannot be defined maps to
    /// the placeholder.
    async fn get_definitions(&self, terms: &[String], language: &str) -> HashMap<String, String>;
}
