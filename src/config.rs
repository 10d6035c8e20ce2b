//! Configuration for an export run.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI)
//! 2. Environment variables (KOBO_HIGHLIGHTS_SQLITE, KOBO_HIGHLIGHTS_FOLDER,
//!    KOBO_HIGHLIGHTS_MODEL)
//! 3. Config file (.kobo-highlights/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .kobo-highlights/config.yaml
//! - Paths in config file are relative to the directory holding .kobo-highlights/

pub mod paths;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::render::{Template, DEFAULT_TEMPLATE};
use crate::merge::{MergeStrategy, OrphanPolicy};

pub const ENV_SQLITE: &str = "KOBO_HIGHLIGHTS_SQLITE";
pub const ENV_FOLDER: &str = "KOBO_HIGHLIGHTS_FOLDER";
pub const ENV_MODEL: &str = "KOBO_HIGHLIGHTS_MODEL";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub definitions: DefinitionsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Path to KoboReader.sqlite
    pub sqlite: Option<String>,
    /// Order highlights by reading position instead of creation time
    pub sort_by_progress: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Folder receiving one markdown file per book
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateConfig {
    /// Markdown layout template
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeConfig {
    pub strategy: Option<MergeStrategy>,
    pub orphaned_notes: Option<OrphanPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionsConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_concurrent: Option<usize>,
}

/// Resolved definition service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionsSettings {
    pub endpoint: String,
    /// No model means definitions are not fetched
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub max_concurrent: usize,
}

impl Default for DefinitionsSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 30,
            max_concurrent: 8,
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Device database; `None` when nothing was configured or found
    pub sqlite: Option<PathBuf>,
    pub sort_by_progress: bool,
    /// Folder receiving the documents
    pub folder: PathBuf,
    pub template_path: Option<PathBuf>,
    pub strategy: MergeStrategy,
    pub orphaned_notes: OrphanPolicy,
    pub definitions: DefinitionsSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ExportConfig {
    /// Load the layout template, falling back to the built-in one
    pub fn load_template(&self) -> Result<Template> {
        let source = match &self.template_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template: {}", path.display()))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(Template::new(source, self.strategy.layout()))
    }
}

/// Find config file by searching a directory and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(paths::CONFIG_DIR).join(paths::CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from the environment and the discovered config file
pub fn load_config() -> Result<ExportConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;

    let file = match find_config_file(&cwd) {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };

    resolve_config(file, |key| std::env::var(key).ok())
}

/// Combine a parsed config file with environment lookups
pub fn resolve_config(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ExportConfig> {
    let (config_file, parsed) = match file {
        Some((path, parsed)) => (Some(path), parsed),
        None => (None, ConfigFile::default()),
    };

    // Base directory is the parent of .kobo-highlights/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let sqlite = env(ENV_SQLITE)
        .map(PathBuf::from)
        .or_else(|| {
            parsed
                .source
                .sqlite
                .as_deref()
                .map(|p| resolve_path(&base_dir, p))
        })
        .or_else(paths::find_kobo_database);

    let folder = match env(ENV_FOLDER) {
        Some(folder) => PathBuf::from(folder),
        None => match parsed.storage.folder.as_deref() {
            Some(folder) => resolve_path(&base_dir, folder),
            None => paths::default_storage_folder()?,
        },
    };

    let template_path = parsed
        .template
        .path
        .as_deref()
        .map(|p| resolve_path(&base_dir, p));

    let defaults = DefinitionsSettings::default();
    let raw = parsed.definitions;
    let definitions = DefinitionsSettings {
        endpoint: raw.endpoint.unwrap_or(defaults.endpoint),
        model: env(ENV_MODEL).or(raw.model).filter(|m| !m.trim().is_empty()),
        api_key_env: raw.api_key_env.unwrap_or(defaults.api_key_env),
        timeout_seconds: raw.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        max_concurrent: raw.max_concurrent.unwrap_or(defaults.max_concurrent).max(1),
    };

    Ok(ExportConfig {
        sqlite,
        sort_by_progress: parsed.source.sort_by_progress.unwrap_or(true),
        folder,
        template_path,
        strategy: parsed.merge.strategy.unwrap_or_default(),
        orphaned_notes: parsed.merge.orphaned_notes.unwrap_or_default(),
        definitions,
        config_file,
    })
}
