//! Document storage: one markdown file per book.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

/// Storage failures always name the offending path
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn path(&self) -> &Path {
        match self {
            StorageError::Read { path, .. } | StorageError::Write { path, .. } => path,
        }
    }
}

/// Where book documents are kept
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Document path for a book title
    fn path_for(&self, title: &str) -> PathBuf;

    async fn exists(&self, path: &Path) -> bool;

    async fn read(&self, path: &Path) -> Result<String, StorageError>;

    /// Write the whole document at once
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError>;
}

/// Documents stored as files in a folder
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    folder: PathBuf,
}

impl FsDocumentStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    fn path_for(&self, title: &str) -> PathBuf {
        self.folder.join(format!("{}.md", sanitize_title(title)))
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<String, StorageError> {
        fs::read_to_string(path)
            .await
            .map_err(|source| StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        fs::write(path, content).await.map_err(write_err)
    }
}

/// Turn a book title into a portable file name (without extension)
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>'))
        .collect();

    let cleaned = cleaned.trim().trim_end_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
