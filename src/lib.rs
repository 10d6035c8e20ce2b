//! kobo-highlights - Kobo highlight export with incremental merge
//!
//! Reads highlights and vocabulary lookups from a Kobo's `KoboReader.sqlite`
//! and writes one markdown document per book.
//!
//! # Architecture
//!
//! The documents on disk are the only state:
//! - Generated content sits between start/end markers and is re-rendered
//! - Anything the reader writes after a chapter's end marker is carried over
//! - Definitions already written are reused instead of fetched again
//!
//! # Modules
//!
//! - `adapters`: External systems (Kobo database, definition service)
//! - `core`: Rendering, storage and the export orchestrator
//! - `domain`: Data structures (Highlight, ChapterMap, BookDetails)
//! - `merge`: Document merge engine
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Export every book with highlights
//! kobo-highlights export --sqlite /Volumes/KOBOeReader/.kobo/KoboReader.sqlite
//!
//! # Show what will be used
//! kobo-highlights config
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod merge;

// Re-export main types at crate root for convenience
pub use adapters::{DefinitionClient, DefinitionProvider, HighlightSource, KoboDatabase};
pub use config::ExportConfig;
pub use core::{BookAction, BookOutcome, ExportError, ExportSummary, Exporter};
pub use domain::{BookDetails, ChapterMap, DefinitionMap, Highlight, UserContentMap};
pub use merge::{MergeStrategy, OrphanPolicy};
