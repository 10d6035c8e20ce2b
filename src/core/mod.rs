//! Core export logic.
//!
//! This module contains:
//! - Render: Canonical document rendering from a template
//! - Storage: Document persistence
//! - Orchestrator: Per-book export sequencing

pub mod orchestrator;
pub mod render;
pub mod storage;

// Re-export commonly used types
pub use orchestrator::{BookAction, BookOutcome, ExportError, ExportSummary, Exporter};
pub use render::{render, try_render, Layout, Template, TemplateError, RENDER_ERROR_SENTINEL};
pub use storage::{sanitize_title, DocumentStore, FsDocumentStore, StorageError};
