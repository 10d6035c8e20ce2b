//! Additive merge for documents using the notes layout.
//!
//! Instead of re-rendering, new highlights are spliced into the existing
//! `## Highlights` section. Lines already written are never touched, so a
//! definition fetched after a term was first written is not backfilled.

use std::collections::{HashMap, HashSet};

use crate::core::render::highlight_lines;
use crate::domain::{ChapterMap, DefinitionMap};

use super::line::Line;

/// Heading that opens the highlights section in the notes layout
pub const HIGHLIGHTS_HEADING: &str = "## Highlights";

/// Result of an additive merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub document: String,

    /// Number of highlights that were not yet present
    pub added: usize,
}

/// Render the full highlights section for the notes layout
pub fn notes_section(chapters: &ChapterMap, definitions: &DefinitionMap) -> String {
    let mut out = vec![HIGHLIGHTS_HEADING.to_string()];
    for chapter in chapters.iter().filter(|c| !c.highlights.is_empty()) {
        out.push(String::new());
        out.push(format!("### {}", chapter.name));
        for highlight in &chapter.highlights {
            out.extend(highlight_lines(highlight, definitions));
        }
    }
    out.join("\n")
}

/// Highlights already recorded under one `### chapter` heading
struct RecordedChapter {
    heading_idx: usize,
    seen: HashSet<String>,
}

/// Add every highlight whose text is not yet under its chapter
pub fn append_new_highlights(
    existing: &str,
    chapters: &ChapterMap,
    definitions: &DefinitionMap,
) -> Appended {
    let lines: Vec<&str> = existing.lines().collect();

    let Some(section_start) = lines.iter().position(|l| l.trim() == HIGHLIGHTS_HEADING) else {
        let added = chapters.highlight_count();
        if added == 0 {
            return Appended {
                document: existing.to_string(),
                added,
            };
        }
        let mut document = existing.trim_end().to_string();
        if !document.is_empty() {
            document.push_str("\n\n");
        }
        document.push_str(&notes_section(chapters, definitions));
        document.push('\n');
        return Appended { document, added };
    };

    let section_end = lines
        .iter()
        .enumerate()
        .skip(section_start + 1)
        .find(|(_, l)| matches!(Line::classify(l), Line::Heading(_)))
        .map(|(idx, _)| idx)
        .unwrap_or(lines.len());

    let recorded = scan_section(&lines[..section_end], section_start);

    let mut insert_after: HashMap<usize, Vec<String>> = HashMap::new();
    let mut new_sections: Vec<String> = Vec::new();
    let mut added = 0usize;

    for chapter in chapters.iter() {
        let key = chapter.name.trim();
        let seen = recorded.get(key).map(|r| &r.seen);

        let fresh: Vec<String> = chapter
            .highlights
            .iter()
            .filter(|h| seen.map_or(true, |s| !s.contains(&h.text)))
            .inspect(|_| added += 1)
            .flat_map(|h| highlight_lines(h, definitions))
            .collect();

        if fresh.is_empty() {
            continue;
        }

        match recorded.get(key) {
            Some(r) => insert_after.entry(r.heading_idx).or_default().extend(fresh),
            None => {
                new_sections.push(String::new());
                new_sections.push(format!("### {}", chapter.name));
                new_sections.extend(fresh);
            }
        }
    }

    // New chapters go after the last non-blank line of the section
    let new_sections_after = (section_start..section_end)
        .rev()
        .find(|&idx| !lines[idx].trim().is_empty())
        .unwrap_or(section_start);

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + added + new_sections.len());
    for (idx, line) in lines.iter().enumerate() {
        out.push(line.to_string());
        if let Some(extra) = insert_after.remove(&idx) {
            out.extend(extra);
        }
        if idx == new_sections_after {
            out.append(&mut new_sections);
        }
    }

    let mut document = out.join("\n");
    if existing.ends_with('\n') {
        document.push('\n');
    }

    Appended { document, added }
}

fn scan_section(lines: &[&str], section_start: usize) -> HashMap<String, RecordedChapter> {
    let mut recorded: HashMap<String, RecordedChapter> = HashMap::new();
    let mut current: Option<String> = None;

    for (idx, raw) in lines.iter().enumerate().skip(section_start + 1) {
        let entry = match Line::classify(raw) {
            Line::Subheading(name) => {
                let key = name.trim().to_string();
                recorded.entry(key.clone()).or_insert(RecordedChapter {
                    heading_idx: idx,
                    seen: HashSet::new(),
                });
                current = Some(key);
                continue;
            }
            Line::Quote(text) => text.to_string(),
            Line::Vocabulary { term, .. } => term.to_string(),
            Line::Plain(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => continue,
        };

        if let Some(chapter) = current.as_ref().and_then(|c| recorded.get_mut(c)) {
            chapter.seen.insert(entry);
        }
    }

    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Highlight;

    fn chapters(entries: &[(&str, Highlight)]) -> ChapterMap {
        let mut map = ChapterMap::new();
        for (chapter, highlight) in entries {
            map.push(chapter, highlight.clone());
        }
        map
    }

    #[test]
    fn test_section_appended_when_missing() {
        let map = chapters(&[("Intro", Highlight::quote("Hello world"))]);
        let result = append_new_highlights("# Book\n\nmy notes\n", &map, &DefinitionMap::new());

        assert_eq!(result.added, 1);
        assert_eq!(
            result.document,
            "# Book\n\nmy notes\n\n## Highlights\n\n### Intro\n> Quote : Hello world\n"
        );
    }

    #[test]
    fn test_existing_highlights_not_duplicated() {
        let doc = "\
# Book

## Highlights

### Intro
> Quote : Hello world
my own remark
";
        let map = chapters(&[
            ("Intro", Highlight::quote("Hello world")),
            ("Intro", Highlight::quote("New one")),
        ]);
        let result = append_new_highlights(doc, &map, &DefinitionMap::new());

        assert_eq!(result.added, 1);
        assert_eq!(result.document.matches("Hello world").count(), 1);
        assert!(result
            .document
            .contains("### Intro\n> Quote : New one\n> Quote : Hello world\nmy own remark"));
    }

    #[test]
    fn test_unchanged_input_is_idempotent() {
        let map = chapters(&[
            ("Intro", Highlight::quote("Hello world")),
            ("Words", Highlight::vocabulary("château")),
        ]);
        let defs = DefinitionMap::new();

        let first = append_new_highlights("# Book\n", &map, &defs).document;
        let second = append_new_highlights(&first, &map, &defs);
        assert_eq!(second.added, 0);
        assert_eq!(second.document, first);
    }

    #[test]
    fn test_new_chapter_added_before_next_section() {
        let doc = "\
## Highlights

### Intro
> Quote : Hello world

## My Thoughts
keep me
";
        let map = chapters(&[("Later", Highlight::quote("Fresh"))]);
        let result = append_new_highlights(doc, &map, &DefinitionMap::new());

        assert_eq!(
            result.document,
            "## Highlights\n\n### Intro\n> Quote : Hello world\n\n### Later\n> Quote : Fresh\n\n## My Thoughts\nkeep me\n"
        );
    }

    #[test]
    fn test_placeholder_definitions_are_not_backfilled() {
        let doc = "## Highlights\n\n### Words\n- château ::: ...\n";
        let map = chapters(&[("Words", Highlight::vocabulary("château"))]);
        let mut defs = DefinitionMap::new();
        defs.insert_if_absent("château", "a large house");

        let result = append_new_highlights(doc, &map, &defs);
        assert_eq!(result.added, 0);
        assert_eq!(result.document, doc);
    }
}
