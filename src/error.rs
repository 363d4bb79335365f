use std::path::PathBuf;

use crate::document::DocumentUri;

/// Errors raised by the scanning pipeline.
///
/// Only dictionary loading is allowed to abort startup. Grammar and scan
/// failures are scoped to a single document and handled by the caller of
/// the scan.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The affix/dictionary pair is missing, not UTF-8, or rejected by the engine.
    #[error("failed to load dictionary {source_name}: {reason}")]
    DictionaryLoad { source_name: String, reason: String },

    /// No analyzer is available for the document's language.
    #[error("no grammar for language `{language}`: {reason}")]
    GrammarLoad { language: String, reason: String },

    /// Region extraction failed part way through a document.
    #[error("scan failed for {uri}: {reason}")]
    ScanFailure { uri: DocumentUri, reason: String },

    /// The configured separator characters do not form a valid class.
    #[error("invalid separators {chars:?}: {reason}")]
    Separators { chars: String, reason: String },

    /// A word could not be added to the dictionary.
    #[error("cannot add `{word}` to dictionary: {reason}")]
    AddWord { word: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Whether the error only affects the document being scanned.
    pub fn is_document_scoped(&self) -> bool {
        matches!(self, Error::GrammarLoad { .. } | Error::ScanFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
