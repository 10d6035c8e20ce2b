//! Maps recovered from an existing document.

use std::collections::{BTreeMap, HashMap};

/// Placeholder written when no definition could be obtained for a term
pub const DEFINITION_PLACEHOLDER: &str = "...";

/// Vocabulary term to definition text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionMap {
    entries: HashMap<String, String>,
}

impl DefinitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&str> {
        self.entries.get(term).map(String::as_str)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    /// Insert only if the term has no entry yet
    pub fn insert_if_absent(&mut self, term: impl Into<String>, definition: impl Into<String>) {
        self.entries
            .entry(term.into())
            .or_insert_with(|| definition.into());
    }

    /// True when the term is missing or only holds the placeholder
    pub fn needs_definition(&self, term: &str) -> bool {
        match self.get(term) {
            None => true,
            Some(definition) => is_placeholder(definition),
        }
    }

    /// Fold freshly fetched definitions into the map.
    ///
    /// Cached definitions win; a cached placeholder is replaced only by a
    /// real definition. No key is ever removed.
    pub fn merge_fetched(&mut self, fetched: HashMap<String, String>) {
        for (term, definition) in fetched {
            match self.entries.get_mut(&term) {
                None => {
                    self.entries.insert(term, definition);
                }
                Some(existing) if is_placeholder(existing) && !is_placeholder(&definition) => {
                    *existing = definition;
                }
                Some(_) => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn is_placeholder(definition: &str) -> bool {
    definition.trim() == DEFINITION_PLACEHOLDER
}

/// Human-authored blocks recovered from a document, keyed by the chapter they
/// trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContentMap {
    chapters: BTreeMap<String, String>,
    trailing: Option<String>,
}

impl UserContentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a block under a chapter. A second block for the same chapter is
    /// appended after a blank line.
    pub fn insert_chapter(&mut self, chapter: &str, block: String) {
        let key = chapter.trim().to_string();
        match self.chapters.get_mut(&key) {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(&block);
            }
            None => {
                self.chapters.insert(key, block);
            }
        }
    }

    pub fn set_trailing(&mut self, block: String) {
        match self.trailing.as_mut() {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(&block);
            }
            None => self.trailing = Some(block),
        }
    }

    pub fn chapter(&self, chapter: &str) -> Option<&str> {
        self.chapters.get(chapter.trim()).map(String::as_str)
    }

    pub fn trailing(&self) -> Option<&str> {
        self.trailing.as_deref()
    }

    /// Chapter names in sorted order
    pub fn chapter_names(&self) -> impl Iterator<Item = &str> {
        self.chapters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty() && self.trailing.is_none()
    }

    /// Remove text the template itself places in the same spot.
    ///
    /// A recovered block equal to the template's block is dropped; one that
    /// ends with it keeps only the part before.
    pub fn without_template_text(mut self, template: &UserContentMap) -> Self {
        self.chapters = self
            .chapters
            .into_iter()
            .filter_map(|(chapter, block)| {
                let stripped = match template.chapters.get(&chapter) {
                    Some(owned) => strip_owned_suffix(&block, owned),
                    None => Some(block),
                };
                stripped.map(|b| (chapter, b))
            })
            .collect();

        if let Some(owned) = template.trailing.as_deref() {
            self.trailing = self
                .trailing
                .take()
                .and_then(|block| strip_owned_suffix(&block, owned));
        }

        self
    }
}

fn strip_owned_suffix(block: &str, owned: &str) -> Option<String> {
    if block == owned {
        return None;
    }
    match block.strip_suffix(owned) {
        Some(rest) => {
            let rest = rest.trim();
            (!rest.is_empty()).then(|| rest.to_string())
        }
        None => Some(block.to_string()),
    }
}
