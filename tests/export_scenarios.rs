//! Export Integration Tests
//!
//! End-to-end runs of the exporter against an in-memory highlight source and
//! documents stored in a temporary folder.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kobo_highlights::adapters::{DefinitionProvider, HighlightSource, SourceError};
use kobo_highlights::config::resolve_config;
use kobo_highlights::core::{
    BookAction, DocumentStore, ExportError, Exporter, FsDocumentStore, Layout, StorageError,
    Template, RENDER_ERROR_SENTINEL,
};
use kobo_highlights::domain::{BookDetails, ChapterMap, Highlight};
use kobo_highlights::merge::{MergeStrategy, OrphanPolicy};
use tempfile::TempDir;

/// Highlight source backed by a map
#[derive(Default)]
struct FakeSource {
    books: BTreeMap<String, ChapterMap>,
}

impl FakeSource {
    fn with(mut self, book: &str, chapter: &str, highlight: Highlight) -> Self {
        self.books
            .entry(book.to_string())
            .or_default()
            .push(chapter, highlight);
        self
    }
}

impl HighlightSource for FakeSource {
    fn all_highlights(&self, _: bool) -> Result<BTreeMap<String, ChapterMap>, SourceError> {
        Ok(self.books.clone())
    }

    fn all_books(&self) -> Result<BTreeMap<String, String>, SourceError> {
        Ok(self
            .books
            .keys()
            .enumerate()
            .map(|(i, title)| (title.clone(), format!("book-{}", i)))
            .collect())
    }

    fn book_details(&self, title: &str) -> Result<BookDetails, SourceError> {
        Ok(BookDetails {
            author: "Test Author".to_string(),
            ..BookDetails::titled(title)
        })
    }
}

/// Definition provider that records every request
#[derive(Clone, Default)]
struct RecordingProvider {
    answers: HashMap<String, String>,
    calls: Arc<Mutex<Vec<(Vec<String>, String)>>>,
}

impl RecordingProvider {
    fn answering(pairs: &[(&str, &str)]) -> Self {
        Self {
            answers: pairs
                .iter()
                .map(|(t, d)| (t.to_string(), d.to_string()))
                .collect(),
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DefinitionProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn get_definitions(&self, terms: &[String], language: &str) -> HashMap<String, String> {
        self.calls
            .lock()
            .unwrap()
            .push((terms.to_vec(), language.to_string()));

        // Unknown terms behave like failed requests
        terms
            .iter()
            .map(|t| {
                let definition = self.answers.get(t).cloned().unwrap_or_else(|| "...".to_string());
                (t.clone(), definition)
            })
            .collect()
    }
}

/// File store that counts writes
#[derive(Clone)]
struct CountingStore {
    inner: FsDocumentStore,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn path_for(&self, title: &str) -> PathBuf {
        self.inner.path_for(title)
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<String, StorageError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, content).await
    }
}

fn exporter(temp: &TempDir) -> Exporter {
    Exporter::new(FsDocumentStore::new(temp.path()), Template::default())
}

fn read(temp: &TempDir, title: &str) -> String {
    std::fs::read_to_string(temp.path().join(format!("{}.md", title))).unwrap()
}

#[tokio::test]
async fn test_new_book_gets_canonical_document() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default().with("Book", "Intro", Highlight::quote("Hello world"));

    let summary = exporter(&temp).export_all(&source).await.unwrap();
    assert_eq!(summary.books.len(), 1);
    assert_eq!(summary.books[0].action, BookAction::Created);

    let doc = read(&temp, "Book");
    assert_eq!(doc.matches("## Intro").count(), 1);
    assert!(doc.contains("> Quote : Hello world"));
    assert!(doc.contains("author: \"Test Author\""));
}

#[tokio::test]
async fn test_personal_note_survives_rerun() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default().with("Book", "Intro", Highlight::quote("Hello world"));
    let exporter = exporter(&temp);

    exporter.export_all(&source).await.unwrap();
    let path = temp.path().join("Book.md");
    let edited = read(&temp, "Book").replace(
        "%% kobo-highlights-end %%\n",
        "%% kobo-highlights-end %%\n\nmy personal note\n",
    );
    std::fs::write(&path, &edited).unwrap();

    let summary = exporter.export_all(&source).await.unwrap();
    assert_eq!(summary.books[0].action, BookAction::Updated);

    let doc = read(&temp, "Book");
    assert!(doc.contains("%% kobo-highlights-end %%\n\nmy personal note"));
    assert_eq!(doc.matches("my personal note").count(), 1);
    assert_eq!(doc, edited);
}

#[tokio::test]
async fn test_unchanged_rerun_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default()
        .with("Book", "Intro", Highlight::quote("Hello world"))
        .with("Book", "Words", Highlight::vocabulary("château"))
        .with("Book", "Outro", Highlight::new("Last one", Some("a device note"), 2).unwrap());
    let exporter = exporter(&temp);

    exporter.export_all(&source).await.unwrap();
    let first = read(&temp, "Book");
    exporter.export_all(&source).await.unwrap();
    let second = read(&temp, "Book");

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_definitions_are_fetched_once() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default().with("Livre", "Un", Highlight::vocabulary("château"));
    let provider = RecordingProvider::answering(&[("château", "a large house")]);
    let exporter = exporter(&temp).with_definitions(provider.clone());

    let summary = exporter.export_all(&source).await.unwrap();
    assert_eq!(summary.books[0].fetched_terms, 1);
    assert_eq!(summary.books[0].language, "fr");
    assert_eq!(
        provider.calls(),
        vec![(vec!["château".to_string()], "fr".to_string())]
    );

    let summary = exporter.export_all(&source).await.unwrap();
    assert_eq!(summary.books[0].fetched_terms, 0);
    assert_eq!(provider.calls().len(), 1, "cached term must not be fetched again");

    let doc = read(&temp, "Livre");
    assert_eq!(doc.matches("- château ::: a large house").count(), 1);
}

#[tokio::test]
async fn test_failed_definition_degrades_to_placeholder() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default()
        .with("Livre", "Un", Highlight::vocabulary("bonjour"))
        .with("Livre", "Un", Highlight::vocabulary("merci"))
        .with("Other", "Intro", Highlight::quote("still exported"));
    let provider = RecordingProvider::answering(&[("merci", "thank you")]);

    let summary = exporter(&temp)
        .with_definitions(provider)
        .export_all(&source)
        .await
        .unwrap();
    assert_eq!(summary.books.len(), 2);

    let doc = read(&temp, "Livre");
    assert!(doc.contains("- bonjour ::: ..."));
    assert!(doc.contains("- merci ::: thank you"));
    assert!(read(&temp, "Other").contains("> Quote : still exported"));
}

#[tokio::test]
async fn test_placeholder_is_retried_and_definitions_only_grow() {
    let temp = TempDir::new().unwrap();
    let first_source = FakeSource::default().with("Livre", "Un", Highlight::vocabulary("bonjour"));

    // First run: service cannot define the term
    exporter(&temp)
        .with_definitions(RecordingProvider::answering(&[]))
        .export_all(&first_source)
        .await
        .unwrap();
    assert!(read(&temp, "Livre").contains("- bonjour ::: ..."));

    // Second run: service recovers, and a new term appears
    let second_source = FakeSource::default()
        .with("Livre", "Un", Highlight::vocabulary("bonjour"))
        .with("Livre", "Deux", Highlight::vocabulary("merci"));
    let provider = RecordingProvider::answering(&[("bonjour", "hello"), ("merci", "thank you")]);
    exporter(&temp)
        .with_definitions(provider.clone())
        .export_all(&second_source)
        .await
        .unwrap();

    let doc = read(&temp, "Livre");
    assert!(doc.contains("- bonjour ::: hello"));
    assert!(doc.contains("- merci ::: thank you"));
    assert_eq!(
        provider.calls()[0].0,
        vec!["bonjour".to_string(), "merci".to_string()]
    );
}

#[tokio::test]
async fn test_one_write_per_book() {
    let temp = TempDir::new().unwrap();
    let writes = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: FsDocumentStore::new(temp.path()),
        writes: Arc::clone(&writes),
    };
    let source = FakeSource::default()
        .with("A", "One", Highlight::quote("a"))
        .with("B", "One", Highlight::quote("b"));

    let exporter = Exporter::new(store, Template::default());
    exporter.export_all(&source).await.unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 2);

    exporter.export_all(&source).await.unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_renamed_chapter_notes_follow_orphan_policy() {
    let temp = TempDir::new().unwrap();
    let before = FakeSource::default().with("Book", "Old Name", Highlight::quote("Hello world"));
    let after = FakeSource::default().with("Book", "New Name", Highlight::quote("Hello world"));

    exporter(&temp).export_all(&before).await.unwrap();
    let path = temp.path().join("Book.md");
    let edited = read(&temp, "Book").replace(
        "%% kobo-highlights-end %%\n",
        "%% kobo-highlights-end %%\n\nnote under old name\n",
    );
    std::fs::write(&path, &edited).unwrap();

    // Default policy: known data loss, reported in the outcome
    let dropped_dir = TempDir::new().unwrap();
    std::fs::write(dropped_dir.path().join("Book.md"), &edited).unwrap();
    let summary = exporter(&dropped_dir).export_all(&after).await.unwrap();
    assert_eq!(summary.books[0].orphaned, vec!["Old Name".to_string()]);
    assert!(!read(&dropped_dir, "Book").contains("note under old name"));

    // Trailing policy keeps the note at the end of the document
    let summary = exporter(&temp)
        .with_orphan_policy(OrphanPolicy::Trailing)
        .export_all(&after)
        .await
        .unwrap();
    assert_eq!(summary.books[0].orphaned, vec!["Old Name".to_string()]);
    let doc = read(&temp, "Book");
    assert!(doc.contains("## New Name"));
    assert!(doc.trim_end().ends_with("note under old name"));
}

#[tokio::test]
async fn test_template_error_never_replaces_existing_document() {
    let temp = TempDir::new().unwrap();
    let source = FakeSource::default()
        .with("Existing", "Intro", Highlight::quote("kept"))
        .with("Fresh", "Intro", Highlight::quote("new"));
    std::fs::write(temp.path().join("Existing.md"), "my own document\n").unwrap();

    let broken = Exporter::new(
        FsDocumentStore::new(temp.path()),
        Template::new("# {{nonexistent}}", Layout::Marked),
    );
    let summary = broken.export_all(&source).await.unwrap();

    let actions: Vec<_> = summary.books.iter().map(|b| b.action).collect();
    assert_eq!(actions, vec![BookAction::RenderFailed, BookAction::Created]);
    assert_eq!(read(&temp, "Existing"), "my own document\n");
    assert_eq!(read(&temp, "Fresh"), RENDER_ERROR_SENTINEL);
}

#[tokio::test]
async fn test_append_strategy_adds_only_new_highlights() {
    let temp = TempDir::new().unwrap();
    let exporter = exporter(&temp).with_strategy(MergeStrategy::Append);

    let first = FakeSource::default().with("Book", "Intro", Highlight::quote("Hello world"));
    exporter.export_all(&first).await.unwrap();

    let created = read(&temp, "Book");
    assert!(created.contains("## Highlights\n\n### Intro\n> Quote : Hello world"));
    assert!(!created.contains("%% kobo-highlights-start %%"));

    let path = temp.path().join("Book.md");
    std::fs::write(&path, format!("{}\nmy closing thoughts\n", created)).unwrap();

    let second = FakeSource::default()
        .with("Book", "Intro", Highlight::quote("Hello world"))
        .with("Book", "Intro", Highlight::quote("Second highlight"))
        .with("Book", "Later", Highlight::quote("From a new chapter"));
    exporter.export_all(&second).await.unwrap();

    let doc = read(&temp, "Book");
    assert_eq!(doc.matches("Hello world").count(), 1);
    assert!(doc.contains("### Intro\n> Quote : Second highlight\n> Quote : Hello world"));
    assert!(doc.contains("my closing thoughts\n\n### Later\n> Quote : From a new chapter"));

    exporter.export_all(&second).await.unwrap();
    assert_eq!(read(&temp, "Book"), doc);
}

#[tokio::test]
async fn test_missing_database_is_fatal() {
    let temp = TempDir::new().unwrap();
    let mut config = resolve_config(None, |_| None).unwrap();
    config.sqlite = Some(temp.path().join("KoboReader.sqlite"));
    config.folder = temp.path().join("out");

    let err = Exporter::export_from_config(&config).await.unwrap_err();
    assert!(err.to_string().contains("KoboReader.sqlite"));
    assert!(!temp.path().join("out").exists());
}

#[tokio::test]
async fn test_storage_error_names_path() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "not a folder").unwrap();

    let source = FakeSource::default().with("Book", "Intro", Highlight::quote("Hello world"));
    let exporter = Exporter::new(FsDocumentStore::new(&blocker), Template::default());

    match exporter.export_all(&source).await {
        Err(ExportError::Storage(e)) => assert_eq!(e.path(), blocker.join("Book.md")),
        other => panic!("expected storage error, got {:?}", other.map(|s| s.books.len())),
    }
}
