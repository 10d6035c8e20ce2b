//! Read highlights and book metadata from a Kobo `KoboReader.sqlite`.
//!
//! Highlights live in `Bookmark`; book and chapter titles live in `content`
//! (`ContentType = 6` for books, `899` for chapter entries).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{BookDetails, ChapterMap, Highlight, ReadStatus};

use super::HighlightSource;

pub use crate::domain::UNKNOWN_CHAPTER;

const BOOK_CONTENT_TYPE: i64 = 6;
const CHAPTER_CONTENT_TYPE: i64 = 899;

/// Errors reading the device database
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Kobo database not found: {0}")]
    MissingFile(PathBuf),

    #[error("Kobo database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Read-only handle on the device database
pub struct KoboDatabase {
    conn: Connection,
    path: PathBuf,
}

/// A bookmark row before chapter/book resolution
struct BookmarkRow {
    text: String,
    annotation: Option<String>,
    color: i64,
    content_id: String,
    volume_id: Option<String>,
    chapter_title: Option<String>,
    book_title: Option<String>,
}

impl KoboDatabase {
    /// Open the database read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SourceError::MissingFile(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Older firmware has no `Bookmark.Color` column
    fn has_color_column(&self) -> Result<bool, SourceError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(Bookmark)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for name in names {
            if name?.eq_ignore_ascii_case("Color") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn bookmark_rows(&self, sort_by_progress: bool) -> Result<Vec<BookmarkRow>, SourceError> {
        let color = if self.has_color_column()? {
            "COALESCE(b.Color, 0)"
        } else {
            "0"
        };
        let order = if sort_by_progress {
            "b.VolumeID, COALESCE(c.VolumeIndex, 0), b.ChapterProgress, b.DateCreated"
        } else {
            "b.DateCreated"
        };

        let sql = format!(
            "SELECT b.Text, b.Annotation, {color}, b.ContentID, b.VolumeID, c.Title, c.BookTitle
             FROM Bookmark b
             LEFT JOIN content c ON c.ContentID = b.ContentID
             WHERE b.Text IS NOT NULL AND TRIM(b.Text) != ''
             ORDER BY {order}"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(BookmarkRow {
                text: row.get(0)?,
                annotation: row.get(1)?,
                color: row.get(2)?,
                content_id: row.get(3)?,
                volume_id: row.get(4)?,
                chapter_title: row.get(5)?,
                book_title: row.get(6)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Find the chapter entry whose ContentID starts with the bookmark's
    /// ContentID up to any `#` anchor
    fn chapter_by_prefix(&self, content_id: &str) -> Result<Option<(String, Option<String>)>, SourceError> {
        let prefix = content_id.split('#').next().unwrap_or(content_id);
        // Plain comparison: ContentIDs routinely contain `_`, a LIKE wildcard
        let found = self
            .conn
            .query_row(
                "SELECT Title, BookTitle FROM content
                 WHERE ContentType = ?1 AND substr(ContentID, 1, length(?2)) = ?2
                   AND TRIM(COALESCE(Title, '')) != ''
                 ORDER BY VolumeIndex LIMIT 1",
                params![CHAPTER_CONTENT_TYPE, prefix],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(found)
    }

    fn volume_title(&self, volume_id: &str) -> Result<Option<String>, SourceError> {
        let found = self
            .conn
            .query_row(
                "SELECT Title FROM content WHERE ContentID = ?1 AND ContentType = ?2",
                params![volume_id, BOOK_CONTENT_TYPE],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(found.flatten())
    }
}

impl HighlightSource for KoboDatabase {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn all_highlights(
        &self,
        sort_by_progress: bool,
    ) -> Result<BTreeMap<String, ChapterMap>, SourceError> {
        let mut books: BTreeMap<String, ChapterMap> = BTreeMap::new();
        let mut skipped = 0usize;

        for row in self.bookmark_rows(sort_by_progress)? {
            // Blank titles carry no chapter; resolve them like missing ones
            let title = row.chapter_title.clone().filter(|t| !t.trim().is_empty());
            let (chapter, mut book) = match title {
                Some(title) => (title, row.book_title.clone()),
                None => match self.chapter_by_prefix(&row.content_id)? {
                    Some((title, book)) => (title, book.or_else(|| row.book_title.clone())),
                    None => {
                        debug!(content_id = %row.content_id, "No chapter entry for bookmark");
                        (UNKNOWN_CHAPTER.to_string(), row.book_title.clone())
                    }
                },
            };

            if book.is_none() {
                if let Some(volume_id) = row.volume_id.as_deref() {
                    book = self.volume_title(volume_id)?;
                }
            }

            let Some(book) = book.filter(|b| !b.trim().is_empty()) else {
                warn!(content_id = %row.content_id, "Skipping bookmark with no book title");
                skipped += 1;
                continue;
            };

            let Some(highlight) = Highlight::new(&row.text, row.annotation.as_deref(), row.color)
            else {
                continue;
            };

            books
                .entry(book)
                .or_insert_with(|| self.empty_content_map())
                .push(&chapter, highlight);
        }

        info!(books = books.len(), skipped, "Read highlights from device");
        Ok(books)
    }

    fn all_books(&self) -> Result<BTreeMap<String, String>, SourceError> {
        let mut stmt = self.conn.prepare(
            "SELECT Title, ContentID FROM content
             WHERE ContentType = ?1 AND Title IS NOT NULL",
        )?;
        let rows = stmt.query_map(params![BOOK_CONTENT_TYPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut books = BTreeMap::new();
        for row in rows {
            let (title, id) = row?;
            books.entry(title).or_insert(id);
        }
        Ok(books)
    }

    fn book_details(&self, title: &str) -> Result<BookDetails, SourceError> {
        let details = self
            .conn
            .query_row(
                "SELECT Title, Attribution, Publisher, DateLastRead, ReadStatus, ___PercentRead,
                        ISBN, Series, SeriesNumber, TimeSpentReading, Description
                 FROM content
                 WHERE Title = ?1 AND ContentType = ?2
                 LIMIT 1",
                params![title, BOOK_CONTENT_TYPE],
                details_from_row,
            )
            .optional()?;

        Ok(details.unwrap_or_else(|| BookDetails::titled(title)))
    }
}

fn details_from_row(row: &Row<'_>) -> rusqlite::Result<BookDetails> {
    Ok(BookDetails {
        title: text_of(row, 0)?.unwrap_or_default(),
        author: text_of(row, 1)?.unwrap_or_default(),
        publisher: text_of(row, 2)?,
        date_last_read: text_of(row, 3)?,
        read_status: ReadStatus::from_kobo(int_of(row, 4)?.unwrap_or(0)),
        percent_read: int_of(row, 5)?,
        isbn: text_of(row, 6)?,
        series: text_of(row, 7)?,
        series_number: text_of(row, 8)?,
        time_spent_reading: int_of(row, 9)?,
        description: text_of(row, 10)?,
    })
}

/// Column as text whatever its storage class; empty strings become `None`
fn text_of(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    let value = match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    };
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn int_of(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    let value = match row.get_ref(idx)? {
        ValueRef::Integer(i) => Some(i),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
        _ => None,
    };
    Ok(value)
}
