//! Incremental document merge.
//!
//! A document on disk is the only record of what was exported before and of
//! what the reader added since. Each run recovers both from it:
//!
//! - `cache`: definitions already written, so terms are fetched once
//! - `language`: vocabulary language guess used for definitions
//! - `user_content`: human text trailing each chapter's machine region
//! - `append`: alternate, strictly additive strategy for the notes layout
//! - `line`: the line grammar all of the above share
//!
//! One [`MergeStrategy`] applies to every document in a run.

pub mod append;
pub mod cache;
pub mod language;
pub mod line;
pub mod user_content;

use serde::{Deserialize, Serialize};

use crate::core::render::Layout;

pub use append::{append_new_highlights, Appended};
pub use cache::read_definition_cache;
pub use language::{detect_language, detect_language_default};
pub use line::Line;
pub use user_content::{
    extract_user_content, reinsert_user_content, OrphanPolicy, Reinserted,
};

/// How an existing document absorbs a new export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Re-render everything and carry human text over
    #[default]
    Regenerate,

    /// Only add highlights not yet written; never rewrite a line
    Append,
}

impl MergeStrategy {
    /// Layout a strategy's documents are rendered in
    pub fn layout(self) -> Layout {
        match self {
            MergeStrategy::Regenerate => Layout::Marked,
            MergeStrategy::Append => Layout::Notes,
        }
    }

    /// Strategy that can merge documents rendered in `layout`
    pub fn for_layout(layout: Layout) -> Self {
        match layout {
            Layout::Marked => MergeStrategy::Regenerate,
            Layout::Notes => MergeStrategy::Append,
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStrategy::Regenerate => write!(f, "regenerate"),
            MergeStrategy::Append => write!(f, "append"),
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "regenerate" | "rerender" => Ok(MergeStrategy::Regenerate),
            "append" => Ok(MergeStrategy::Append),
            _ => anyhow::bail!("Unknown merge strategy: {}", s),
        }
    }
}

/// Carry the human text of `existing` over into a fresh canonical render
pub fn merge_document(canonical: &str, existing: &str, orphans: OrphanPolicy) -> Reinserted {
    let template_owned = extract_user_content(canonical);
    let preserved = extract_user_content(existing).without_template_text(&template_owned);
    reinsert_user_content(canonical, &preserved, orphans)
}
