//! Recover definitions already written into a document.

use crate::domain::DefinitionMap;

use super::line::parse_vocabulary;

/// Read every `- <term> ::: <definition>` line of an existing document.
///
/// Malformed lines are skipped. The first definition of a term wins.
pub fn read_definition_cache(document: Option<&str>) -> DefinitionMap {
    let mut definitions = DefinitionMap::new();

    let Some(document) = document else {
        return definitions;
    };

    for line in document.lines() {
        if let Some((term, definition)) = parse_vocabulary(line) {
            definitions.insert_if_absent(term, definition);
        }
    }

    definitions
}
