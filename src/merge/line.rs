//! Line classification for the persisted document grammar.

/// Opens a machine-owned region
pub const START_MARKER: &str = "%% kobo-highlights-start %%";

/// Closes a machine-owned region
pub const END_MARKER: &str = "%% kobo-highlights-end %%";

/// Separator between a term and its definition
pub const VOCABULARY_SEPARATOR: &str = ":::";

/// Prefix of a rendered quote line
pub const QUOTE_PREFIX: &str = "> Quote :";

/// Prefix of a rendered note line
pub const NOTE_PREFIX: &str = "> Note :";

/// A classified document line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// `## <name>`; name is untrimmed
    Heading(&'a str),

    /// `### <name>`; used by the append layout
    Subheading(&'a str),

    StartMarker,

    EndMarker,

    /// `- <term> ::: <definition>`
    Vocabulary { term: &'a str, definition: &'a str },

    /// `> Quote : <text>`
    Quote(&'a str),

    /// `> Note : <text>`
    Note(&'a str),

    Plain(&'a str),
}

impl<'a> Line<'a> {
    /// Classify one line (without its terminator)
    pub fn classify(line: &'a str) -> Self {
        if let Some(name) = heading_name(line, "## ") {
            return Line::Heading(name);
        }
        if let Some(name) = heading_name(line, "### ") {
            return Line::Subheading(name);
        }
        // Markers match anywhere on the line
        if line.contains(END_MARKER) {
            return Line::EndMarker;
        }
        if line.contains(START_MARKER) {
            return Line::StartMarker;
        }
        if let Some((term, definition)) = parse_vocabulary(line) {
            return Line::Vocabulary { term, definition };
        }
        if let Some(text) = line.strip_prefix(QUOTE_PREFIX) {
            return Line::Quote(text.trim());
        }
        if let Some(text) = line.strip_prefix(NOTE_PREFIX) {
            return Line::Note(text.trim());
        }
        Line::Plain(line)
    }
}

fn heading_name<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let name = line.strip_prefix(prefix)?;
    if name.trim().is_empty() {
        return None;
    }
    Some(name)
}

/// Parse `- <term> ::: <definition>`, both sides trimmed and non-empty
pub fn parse_vocabulary(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("- ")?;
    let (term, definition) = rest.split_once(VOCABULARY_SEPARATOR)?;
    let term = term.trim();
    let definition = definition.trim();
    if term.is_empty() || definition.is_empty() {
        return None;
    }
    Some((term, definition))
}

/// Render a vocabulary line in the one form the cache reader accepts
pub fn vocabulary_line(term: &str, definition: &str) -> String {
    format!("- {} {} {}", term, VOCABULARY_SEPARATOR, definition)
}

pub fn quote_line(text: &str) -> String {
    format!("{} {}", QUOTE_PREFIX, text)
}

pub fn note_line(text: &str) -> String {
    format!("{} {}", NOTE_PREFIX, text)
}
