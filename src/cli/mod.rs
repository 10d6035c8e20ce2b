//! Command-line interface for kobo-highlights.
//!
//! Provides commands for exporting highlights, listing the books on the
//! device, and showing the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::{HighlightSource, KoboDatabase};
use crate::config::{load_config, ExportConfig};
use crate::core::{BookAction, Exporter};
use crate::merge::{MergeStrategy, OrphanPolicy};

/// kobo-highlights - Export Kobo highlights to markdown notes
#[derive(Parser, Debug)]
#[command(name = "kobo-highlights")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export highlights, updating existing documents in place
    Export {
        /// Path to KoboReader.sqlite
        #[arg(short, long, env = "KOBO_HIGHLIGHTS_SQLITE")]
        sqlite: Option<PathBuf>,

        /// Folder receiving one markdown file per book
        #[arg(short, long, env = "KOBO_HIGHLIGHTS_FOLDER")]
        folder: Option<PathBuf>,

        /// Order highlights by creation time instead of reading position
        #[arg(long)]
        sort_by_created: bool,

        /// How existing documents absorb new highlights
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Keep notes whose chapter disappeared by moving them to the end
        #[arg(long)]
        keep_orphans: bool,
    },

    /// List books on the device with their highlight counts
    Books {
        /// Path to KoboReader.sqlite
        #[arg(short, long, env = "KOBO_HIGHLIGHTS_SQLITE")]
        sqlite: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Merge strategy for CLI (maps to MergeStrategy)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Re-render documents and carry notes over
    Regenerate,

    /// Only add new highlights, never rewrite lines
    Append,
}

impl From<StrategyArg> for MergeStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Regenerate => MergeStrategy::Regenerate,
            StrategyArg::Append => MergeStrategy::Append,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Export {
                sqlite,
                folder,
                sort_by_created,
                strategy,
                keep_orphans,
            } => {
                let mut config = load_config()?;
                if let Some(sqlite) = sqlite {
                    config.sqlite = Some(sqlite);
                }
                if let Some(folder) = folder {
                    config.folder = folder;
                }
                if sort_by_created {
                    config.sort_by_progress = false;
                }
                if let Some(strategy) = strategy {
                    config.strategy = strategy.into();
                }
                if keep_orphans {
                    config.orphaned_notes = OrphanPolicy::Trailing;
                }
                export(&config).await
            }
            Commands::Books { sqlite } => {
                let mut config = load_config()?;
                if let Some(sqlite) = sqlite {
                    config.sqlite = Some(sqlite);
                }
                list_books(&config)
            }
            Commands::Config => show_config(),
        }
    }
}

/// Run an export and print one line per book
async fn export(config: &ExportConfig) -> Result<()> {
    let summary = Exporter::export_from_config(config).await?;

    if summary.books.is_empty() {
        println!("No highlights found");
        return Ok(());
    }

    for book in &summary.books {
        let action = match book.action {
            BookAction::Created => "created",
            BookAction::Updated => "updated",
            BookAction::RenderFailed => "template error",
        };
        println!("{:<15} {}", action, book.path.display());
        if !book.orphaned.is_empty() {
            eprintln!(
                "  notes for removed chapters: {}",
                book.orphaned.join(", ")
            );
        }
    }

    eprintln!(
        "\n[{} created, {} updated, {} failed]",
        summary.count(BookAction::Created),
        summary.count(BookAction::Updated),
        summary.count(BookAction::RenderFailed)
    );

    Ok(())
}

/// List books with highlight counts
fn list_books(config: &ExportConfig) -> Result<()> {
    let sqlite = config
        .sqlite
        .as_ref()
        .context("No Kobo database configured or found. Use --sqlite <path>")?;
    let database = KoboDatabase::open(sqlite)?;

    let library = database.all_books()?;
    let highlights = database.all_highlights(config.sort_by_progress)?;

    println!("{:<60} {:>10}", "TITLE", "HIGHLIGHTS");
    println!("{}", "-".repeat(71));

    for title in library.keys() {
        let count = highlights
            .get(title)
            .map(|c| c.highlight_count())
            .unwrap_or(0);
        println!("{:<60} {:>10}", title, count);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = load_config()?;

    println!("kobo-highlights configuration");
    println!("=============================");
    match &config.config_file {
        Some(path) => println!("Config file:     {}", path.display()),
        None => println!("Config file:     (none, using defaults)"),
    }
    match &config.sqlite {
        Some(path) => println!("Database:        {}", path.display()),
        None => println!("Database:        (not found)"),
    }
    println!("Output folder:   {}", config.folder.display());
    match &config.template_path {
        Some(path) => println!("Template:        {}", path.display()),
        None => println!("Template:        (built-in)"),
    }
    println!("Sort:            {}", if config.sort_by_progress { "reading position" } else { "creation time" });
    println!("Merge strategy:  {}", config.strategy);
    println!("Orphaned notes:  {:?}", config.orphaned_notes);
    match &config.definitions.model {
        Some(model) => println!(
            "Definitions:     {} via {} (key from ${})",
            model, config.definitions.endpoint, config.definitions.api_key_env
        ),
        None => println!("Definitions:     disabled"),
    }

    Ok(())
}
