use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Error;
use crate::parser::SourceLang;
use crate::Position;

/// Stable identifier of a document, `file://` URIs for documents read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentUri(Arc<str>);

impl DocumentUri {
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self(Arc::from(uri.as_ref()))
    }

    pub fn from_path(path: &Path) -> Self {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self::new(format!("file://{}", absolute.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path for `file://` URIs.
    pub fn to_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix("file://").map(PathBuf::from)
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only snapshot of a document at one version.
#[derive(Debug, Clone)]
pub struct Document {
    uri: DocumentUri,
    version: u64,
    language: SourceLang,
    text: String,
    // Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl Document {
    /// Build a snapshot, inferring the language from the URI's extension.
    pub fn new(uri: DocumentUri, version: u64, text: impl Into<String>) -> Self {
        let language = SourceLang::from_path(Path::new(uri.as_str()));
        Self::with_language(uri, version, language, text)
    }

    pub fn with_language(
        uri: DocumentUri,
        version: u64,
        language: SourceLang,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();

        Self {
            uri,
            version,
            language,
            text,
            line_starts,
        }
    }

    pub fn from_path(path: &Path, version: u64) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let language = SourceLang::from_path(path);
        Ok(Self::with_language(
            DocumentUri::from_path(path),
            version,
            language,
            text,
        ))
    }

    pub fn uri(&self) -> &DocumentUri {
        &self.uri
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn language(&self) -> SourceLang {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset where `row` starts.
    pub fn line_start(&self, row: usize) -> Option<usize> {
        self.line_starts.get(row).copied()
    }

    /// Text of `row` without its line terminator.
    pub fn line(&self, row: usize) -> Option<&str> {
        let start = self.line_start(row)?;
        let end = match self.line_starts.get(row + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        let line = &self.text[start..end];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Map a byte offset to a row and UTF-16 column.
    ///
    /// Returns `None` when the offset is past the end of the text or splits a character.
    pub fn position_at(&self, offset: usize) -> Option<Position> {
        if offset > self.text.len() || !self.text.is_char_boundary(offset) {
            return None;
        }
        let row = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[row];
        Some(Position::new(row, utf16_len(&self.text[line_start..offset])))
    }

    /// Inverse of [`Document::position_at`]. Columns past the end of a line are rejected.
    pub fn offset_at(&self, position: Position) -> Option<usize> {
        let start = self.line_start(position.row)?;
        let line = self.line(position.row)?;
        let mut units = 0;
        for (idx, ch) in line.char_indices() {
            if units == position.column {
                return Some(start + idx);
            }
            units += ch.len_utf16();
        }
        (units == position.column).then_some(start + line.len())
    }
}

pub(crate) fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}
