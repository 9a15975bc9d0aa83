//! CSV codec for review ledgers.
//!
//! A ledger file is a CSV table with a header row. Object rows address
//! objects as `label_<id>`. One sentinel row whose state column reads
//! `Current index` stores the last selected object; rows after it are
//! free-standing notes with empty object and state columns.
//!
//! Files are written with a UTF-8 byte order mark so spreadsheet tools pick
//! the right encoding. A BOM is accepted but not required on read.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{CURRENT_INDEX_STATE, LABEL_PREFIX};
use crate::model::ObjectId;

use super::FormatError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One row of a primary ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// `label_<id>`, or empty for a free-standing note
    #[serde(rename = "Object Number")]
    pub object: String,
    /// `Yes`, `No`, empty, or `Current index` on the sentinel row
    #[serde(rename = "Object State")]
    pub state: String,
    /// Free text
    #[serde(rename = "Note", default)]
    pub note: String,
}

impl LedgerRow {
    /// Row for a free-standing note.
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }
}

/// One row of a double-check ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubleCheckRow {
    /// `label_<id>`, or empty for a free-standing note
    #[serde(rename = "Object Number")]
    pub object: String,
    /// Decision from the first pass, or `Current index` on the sentinel row
    #[serde(rename = "Object State 1")]
    pub first_state: String,
    /// Decision from the double-check pass
    #[serde(rename = "Object State 2")]
    pub second_state: String,
    /// Free text
    #[serde(rename = "Note", default)]
    pub note: String,
}

impl DoubleCheckRow {
    /// Row for a free-standing note.
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }
}

/// Row types sharing the sentinel convention.
pub trait SentinelRow {
    /// Object column.
    fn object(&self) -> &str;

    /// Column that holds `Current index` on the sentinel row.
    fn marker_state(&self) -> &str;

    /// Whether this row stores the cursor.
    fn is_sentinel(&self) -> bool {
        self.marker_state().trim() == CURRENT_INDEX_STATE
    }
}

impl SentinelRow for LedgerRow {
    fn object(&self) -> &str {
        &self.object
    }

    fn marker_state(&self) -> &str {
        &self.state
    }
}

impl SentinelRow for DoubleCheckRow {
    fn object(&self) -> &str {
        &self.object
    }

    fn marker_state(&self) -> &str {
        &self.first_state
    }
}

/// Split rows at the first sentinel into (decisions, sentinel, notes).
pub fn split_at_sentinel<T: SentinelRow>(rows: &[T]) -> Result<(&[T], &T, &[T]), FormatError> {
    let position = rows
        .iter()
        .position(|row| row.is_sentinel())
        .ok_or_else(|| {
            FormatError::malformed(format!("no '{}' row found", CURRENT_INDEX_STATE))
        })?;
    Ok((&rows[..position], &rows[position], &rows[position + 1..]))
}

/// Object column value for `id`.
pub fn label_key(id: ObjectId) -> String {
    format!("{}{}", LABEL_PREFIX, id)
}

/// Object column value for an optional cursor; `None` is an empty cell.
pub fn cursor_key(cursor: Option<ObjectId>) -> String {
    cursor.map(label_key).unwrap_or_default()
}

/// Parse a `label_<id>` token.
pub fn parse_label_key(token: &str) -> Result<ObjectId, FormatError> {
    let token = token.trim();
    token
        .strip_prefix(LABEL_PREFIX)
        .and_then(|digits| digits.parse::<ObjectId>().ok())
        .filter(|&id| id != 0)
        .ok_or_else(|| FormatError::malformed(format!("invalid object token '{}'", token)))
}

/// Parse an optional cursor token; an empty cell means no cursor.
pub fn parse_cursor_key(token: &str) -> Result<Option<ObjectId>, FormatError> {
    if token.trim().is_empty() {
        Ok(None)
    } else {
        parse_label_key(token).map(Some)
    }
}

/// Write `rows` with a header and leading BOM.
pub fn write_rows<W: Write, T: Serialize>(mut writer: W, rows: &[T]) -> Result<(), FormatError> {
    writer.write_all(UTF8_BOM)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read every row after the header. A leading BOM is skipped.
pub fn read_rows<R: Read, T: DeserializeOwned>(mut reader: R) -> Result<Vec<T>, FormatError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut csv_reader = csv::Reader::from_reader(body);
    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

/// Save `rows` to `path`.
pub fn save_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), FormatError> {
    let file = File::create(path)?;
    write_rows(BufWriter::new(file), rows)?;
    log::info!("Wrote {} ledger rows to {:?}", rows.len(), path);
    Ok(())
}

/// Load rows from `path`.
pub fn load_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, FormatError> {
    let rows = read_rows(File::open(path)?)?;
    log::debug!("Read {} ledger rows from {:?}", rows.len(), path);
    Ok(rows)
}
