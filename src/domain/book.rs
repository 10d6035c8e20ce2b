//! Book metadata as recorded by the reader.

use serde::{Deserialize, Serialize};

/// Reading state reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    #[default]
    Unread,
    Reading,
    Finished,
}

impl ReadStatus {
    /// Map Kobo's `content.ReadStatus` column (0, 1, 2)
    pub fn from_kobo(value: i64) -> Self {
        match value {
            1 => ReadStatus::Reading,
            2 => ReadStatus::Finished,
            _ => ReadStatus::Unread,
        }
    }
}

impl std::fmt::Display for ReadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadStatus::Unread => write!(f, "unread"),
            ReadStatus::Reading => write!(f, "reading"),
            ReadStatus::Finished => write!(f, "finished"),
        }
    }
}

/// Metadata for one book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,

    pub author: String,

    #[serde(default)]
    pub publisher: Option<String>,

    /// Raw timestamp string from the device
    #[serde(default)]
    pub date_last_read: Option<String>,

    #[serde(default)]
    pub read_status: ReadStatus,

    /// Percentage read, 0-100
    #[serde(default)]
    pub percent_read: Option<i64>,

    #[serde(default)]
    pub isbn: Option<String>,

    #[serde(default)]
    pub series: Option<String>,

    #[serde(default)]
    pub series_number: Option<String>,

    /// Seconds spent reading
    #[serde(default)]
    pub time_spent_reading: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,
}

impl BookDetails {
    /// Details for a book the device knows nothing else about
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: String::new(),
            ..Default::default()
        }
    }
}
