use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::document::DocumentUri;
use crate::{MisspellingRecord, Range, Severity};

/// What a host renders for one misspelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub range: Range,
    pub severity: Severity,
}

impl From<&MisspellingRecord> for Diagnostic {
    fn from(record: &MisspellingRecord) -> Self {
        Self {
            message: record.message(),
            range: record.range,
            severity: record.severity,
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    /// Newest document version whose results were committed.
    version: Option<u64>,
    records: Arc<[MisspellingRecord]>,
}

/// Current misspellings of every open document.
///
/// A document's set is only ever replaced whole, never merged.
#[derive(Debug, Default)]
pub struct DiagnosticCollection {
    entries: DashMap<DocumentUri, Entry>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set for `uri` with results computed from `version`.
    ///
    /// Returns `false` and keeps the current set when a newer version has
    /// already been committed.
    pub fn set_diagnostics(
        &self,
        uri: &DocumentUri,
        version: u64,
        records: Vec<MisspellingRecord>,
    ) -> bool {
        let mut entry = self.entries.entry(uri.clone()).or_default();
        if entry.version.is_some_and(|committed| committed > version) {
            debug!(%uri, version, committed = ?entry.version, "refusing stale diagnostics");
            return false;
        }
        entry.version = Some(version);
        entry.records = records.into();
        true
    }

    /// Drop the diagnostics for `uri`, remembering the committed version.
    pub fn clear(&self, uri: &DocumentUri) {
        if let Some(mut entry) = self.entries.get_mut(uri) {
            entry.records = Arc::from(Vec::new());
        }
    }

    /// Forget `uri` entirely.
    pub fn remove(&self, uri: &DocumentUri) {
        self.entries.remove(uri);
    }

    pub fn get(&self, uri: &DocumentUri) -> Arc<[MisspellingRecord]> {
        self.entries
            .get(uri)
            .map(|entry| Arc::clone(&entry.records))
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn diagnostics(&self, uri: &DocumentUri) -> Vec<Diagnostic> {
        self.get(uri).iter().map(Diagnostic::from).collect()
    }

    pub fn committed_version(&self, uri: &DocumentUri) -> Option<u64> {
        self.entries.get(uri).and_then(|entry| entry.version)
    }

    pub fn uris(&self) -> Vec<DocumentUri> {
        let mut uris: Vec<_> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        uris.sort();
        uris
    }

    /// Total misspellings across all documents.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|entry| entry.records.len()).sum()
    }
}
