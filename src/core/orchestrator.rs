//! Export orchestration.
//!
//! Books are exported one at a time. For each book the existing document is
//! read once, definitions are looked up for new vocabulary, the book is
//! rendered, and the result is merged with what the reader wrote before being
//! written back exactly once.

use std::path::PathBuf;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{DefinitionClient, DefinitionProvider, HighlightSource, KoboDatabase, SourceError};
use crate::config::ExportConfig;
use crate::domain::{BookDetails, ChapterMap};
use crate::merge::{
    append_new_highlights, detect_language, detect_language_default, merge_document,
    read_definition_cache, MergeStrategy, OrphanPolicy,
};

use super::render::{render, Template, RENDER_ERROR_SENTINEL};
use super::storage::{DocumentStore, FsDocumentStore, StorageError};

/// Errors that end a run
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No Kobo database configured or found")]
    NoSource,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What happened to one book's document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookAction {
    Created,
    Updated,
    /// Template failed on an existing document; it was left as is
    RenderFailed,
}

/// Outcome for one book
#[derive(Debug, Clone, Serialize)]
pub struct BookOutcome {
    pub title: String,
    pub path: PathBuf,
    pub action: BookAction,
    pub language: String,
    /// Terms sent to the definition service
    pub fetched_terms: usize,
    /// Chapters whose preserved text no longer had a home
    pub orphaned: Vec<String>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub run_id: Uuid,
    pub books: Vec<BookOutcome>,
}

impl ExportSummary {
    pub fn count(&self, action: BookAction) -> usize {
        self.books.iter().filter(|b| b.action == action).count()
    }
}

/// Exports every book's highlights into its document
pub struct Exporter {
    store: Box<dyn DocumentStore>,
    definitions: Option<Box<dyn DefinitionProvider>>,
    template: Template,
    strategy: MergeStrategy,
    orphans: OrphanPolicy,
    sort_by_progress: bool,
    sampling_seed: Option<u64>,
}

impl Exporter {
    /// Create an exporter with no definition service. The merge strategy is
    /// the one matching the template's layout.
    pub fn new(store: impl DocumentStore + 'static, template: Template) -> Self {
        let strategy = MergeStrategy::for_layout(template.layout);
        Self {
            store: Box::new(store),
            definitions: None,
            template,
            strategy,
            orphans: OrphanPolicy::default(),
            sort_by_progress: true,
            sampling_seed: None,
        }
    }

    /// Build an exporter from resolved configuration
    pub fn from_config(config: &ExportConfig) -> anyhow::Result<Self> {
        let template = config.load_template()?;
        let mut exporter = Self::new(FsDocumentStore::new(config.folder.clone()), template)
            .with_strategy(config.strategy)
            .with_orphan_policy(config.orphaned_notes)
            .with_sort_by_progress(config.sort_by_progress);

        if config.definitions.model.is_some() {
            exporter =
                exporter.with_definitions(DefinitionClient::from_settings(&config.definitions));
        }

        Ok(exporter)
    }

    pub fn with_definitions(mut self, provider: impl DefinitionProvider + 'static) -> Self {
        self.definitions = Some(Box::new(provider));
        self
    }

    /// Select the merge strategy; the template layout follows it
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self.template.layout = strategy.layout();
        self
    }

    pub fn with_orphan_policy(mut self, orphans: OrphanPolicy) -> Self {
        self.orphans = orphans;
        self
    }

    pub fn with_sort_by_progress(mut self, sort_by_progress: bool) -> Self {
        self.sort_by_progress = sort_by_progress;
        self
    }

    /// Make language sampling reproducible
    pub fn with_sampling_seed(mut self, seed: u64) -> Self {
        self.sampling_seed = Some(seed);
        self
    }

    /// Open the configured database and export everything in it
    pub async fn export_from_config(config: &ExportConfig) -> anyhow::Result<ExportSummary> {
        let sqlite = config.sqlite.as_ref().ok_or(ExportError::NoSource)?;
        let database = KoboDatabase::open(sqlite)
            .with_context(|| format!("Failed to open {}", sqlite.display()))?;
        let exporter = Self::from_config(config)?;
        Ok(exporter.export_all(&database).await?)
    }

    /// Export every book that has highlights
    #[instrument(skip(self, source), fields(strategy = %self.strategy))]
    pub async fn export_all(
        &self,
        source: &dyn HighlightSource,
    ) -> Result<ExportSummary, ExportError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting export");

        // Index is built once; nothing below goes back to the device
        let highlights = source.all_highlights(self.sort_by_progress)?;
        let library = source.all_books()?;
        debug!(library = library.len(), with_highlights = highlights.len(), "Indexed books");

        let mut index = Vec::with_capacity(highlights.len());
        for (title, chapters) in highlights {
            let details = source.book_details(&title)?;
            index.push((title, chapters, details));
        }

        let mut books = Vec::with_capacity(index.len());
        for (title, chapters, details) in &index {
            books.push(self.export_book(title, chapters, details).await?);
        }

        let summary = ExportSummary { run_id, books };
        info!(
            %run_id,
            created = summary.count(BookAction::Created),
            updated = summary.count(BookAction::Updated),
            failed = summary.count(BookAction::RenderFailed),
            "Export completed"
        );
        Ok(summary)
    }

    /// Export one book's document
    #[instrument(skip(self, chapters, details))]
    pub async fn export_book(
        &self,
        title: &str,
        chapters: &ChapterMap,
        details: &BookDetails,
    ) -> Result<BookOutcome, ExportError> {
        let path = self.store.path_for(title);

        let existing = if self.store.exists(&path).await {
            Some(self.store.read(&path).await?)
        } else {
            None
        };

        let mut definitions = read_definition_cache(existing.as_deref());
        let terms = chapters.vocabulary_terms();

        let missing: Vec<String> = terms
            .iter()
            .filter(|t| definitions.needs_definition(t))
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let language = match self.sampling_seed {
            Some(seed) => detect_language(&terms, &mut StdRng::seed_from_u64(seed)),
            None => detect_language_default(&terms),
        };

        let mut fetched_terms = 0;
        if let Some(provider) = self.definitions.as_ref().filter(|p| p.is_configured()) {
            if !missing.is_empty() {
                debug!(
                    cached = definitions.len(),
                    missing = missing.len(),
                    provider = provider.name(),
                    "Fetching definitions"
                );
                let fetched = provider.get_definitions(&missing, language).await;
                fetched_terms = missing.len();
                definitions.merge_fetched(fetched);
            }
        }

        let canonical = render(&self.template, chapters, details, &definitions, language);

        let (action, content, orphaned) = match existing {
            None => (BookAction::Created, canonical, Vec::new()),
            Some(_) if canonical == RENDER_ERROR_SENTINEL => {
                warn!(path = %path.display(), "Template failed, leaving existing document untouched");
                return Ok(BookOutcome {
                    title: title.to_string(),
                    path,
                    action: BookAction::RenderFailed,
                    language: language.to_string(),
                    fetched_terms,
                    orphaned: Vec::new(),
                });
            }
            Some(existing) => match self.strategy {
                MergeStrategy::Regenerate => {
                    let merged = merge_document(&canonical, &existing, self.orphans);
                    (BookAction::Updated, merged.document, merged.orphaned)
                }
                MergeStrategy::Append => {
                    let appended = append_new_highlights(&existing, chapters, &definitions);
                    debug!(added = appended.added, "Appended new highlights");
                    (BookAction::Updated, appended.document, Vec::new())
                }
            },
        };

        if !orphaned.is_empty() {
            match self.orphans {
                OrphanPolicy::Drop => warn!(
                    chapters = ?orphaned,
                    "Dropped notes whose chapter no longer exists"
                ),
                OrphanPolicy::Trailing => warn!(
                    chapters = ?orphaned,
                    "Moved notes whose chapter no longer exists to the end"
                ),
            }
        }

        self.store.write(&path, &content).await?;
        info!(path = %path.display(), ?action, language, "Wrote document");

        Ok(BookOutcome {
            title: title.to_string(),
            path,
            action,
            language: language.to_string(),
            fetched_terms,
            orphaned,
        })
    }
}
