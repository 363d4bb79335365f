pub mod checker;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod dict;
pub mod document;
pub mod error;
pub mod parser;
pub mod scheduler;

pub use checker::SpellChecker;
pub use config::Config;
pub use diagnostics::DiagnosticCollection;
pub use document::{Document, DocumentUri};
pub use error::Error;

use serde::Serialize;
use std::fmt;

/// Zero-based document position. `column` counts UTF-16 code units so that
/// ranges line up with what editors render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Warning,
}

/// One misspelled word found by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MisspellingRecord {
    pub word: String,
    pub range: Range,
    pub severity: Severity,
}

impl MisspellingRecord {
    pub fn new(word: impl Into<String>, range: Range) -> Self {
        Self {
            word: word.into(),
            range,
            severity: Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        format!("{} is misspelled", self.word)
    }
}
