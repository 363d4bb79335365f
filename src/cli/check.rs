use anyhow::Result;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::checker::dictionary::Dictionary;
use crate::checker::SpellChecker;
use crate::document::Document;
use crate::error::Error;
use crate::parser::SourceLang;
use crate::MisspellingRecord;

/// A misspelling with what the terminal needs to show it.
#[derive(Debug, Clone)]
pub struct Finding {
    pub record: MisspellingRecord,
    /// The source line the word starts on.
    pub context: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub findings: Vec<Finding>,
    /// Why the file was not scanned, if it was not.
    pub skipped: Option<String>,
}

impl FileReport {
    pub fn new(
        path: PathBuf,
        document: &Document,
        records: &[MisspellingRecord],
        dictionary: &Dictionary,
        max_suggestions: usize,
    ) -> Self {
        let findings = records
            .iter()
            .map(|record| Finding {
                record: record.clone(),
                context: document
                    .line(record.range.start.row)
                    .unwrap_or_default()
                    .to_string(),
                suggestions: if max_suggestions > 0 {
                    dictionary.suggest(&record.word, max_suggestions)
                } else {
                    Vec::new()
                },
            })
            .collect();

        Self {
            path,
            findings,
            skipped: None,
        }
    }

    pub fn skipped(path: PathBuf, reason: String) -> Self {
        Self {
            path,
            findings: Vec::new(),
            skipped: Some(reason),
        }
    }
}

/// Expand the given paths into source files.
///
/// Files named explicitly are always kept; directories are walked honouring
/// ignore files and only files of a known language are kept.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            warn!(path = %path.display(), "file not found");
            continue;
        }

        let walker = WalkBuilder::new(path)
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_some_and(|ft| ft.is_file())
                && SourceLang::from_path(entry.path()) != SourceLang::Other
            {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    debug!(count = files.len(), "collected files");
    files
}

/// Scan every file in parallel. Files that cannot be read or have no grammar
/// are reported as skipped.
pub fn check_files(
    checker: &SpellChecker,
    files: &[PathBuf],
    max_suggestions: usize,
) -> Result<Vec<FileReport>> {
    files
        .par_iter()
        .map(|path| check_file(checker, path, max_suggestions))
        .collect()
}

pub fn check_file(checker: &SpellChecker, path: &Path, max_suggestions: usize) -> Result<FileReport> {
    let document = match Document::from_path(path, 0) {
        Ok(document) => document,
        Err(e @ Error::Read { .. }) => {
            warn!(path = %path.display(), "skipped: {}", e);
            return Ok(FileReport::skipped(path.to_path_buf(), e.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    match checker.scan(&document) {
        Ok(records) => Ok(FileReport::new(
            path.to_path_buf(),
            &document,
            &records,
            checker.dictionary(),
            max_suggestions,
        )),
        Err(e) if e.is_document_scoped() => {
            warn!(path = %path.display(), "skipped: {}", e);
            Ok(FileReport::skipped(path.to_path_buf(), e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::dictionary::tests::fixture;
    use crate::Config;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_collect_files_filters_by_language() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "// hello").unwrap();
        fs::write(dir.path().join("src/app.py"), "# hello").unwrap();
        fs::write(dir.path().join("README.md"), "hello").unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        let files = collect_files(&[
            dir.path().to_path_buf(),
            notes.clone(),
            dir.path().join("missing.rs"),
        ]);
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["notes.txt", "app.py", "lib.rs"]);
    }

    #[test]
    fn test_check_files_reports_and_skips() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("main.ts");
        let notes = dir.path().join("notes.txt");
        fs::write(&source, "// this is a tpyo\nconst a = 1;\n").unwrap();
        fs::write(&notes, "tpyo").unwrap();

        let checker =
            SpellChecker::with_dictionary(Arc::new(fixture()), &Config::default()).unwrap();
        let reports = check_files(&checker, &[source, notes], 3).unwrap();

        assert_eq!(reports[0].findings.len(), 1);
        let finding = &reports[0].findings[0];
        assert_eq!(finding.record.word, "tpyo");
        assert_eq!(finding.context, "// this is a tpyo");
        assert!(finding.suggestions.contains(&"typo".to_string()));

        assert!(reports[1].skipped.is_some());
        assert!(reports[1].findings.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("main.ts");
        let latin1 = dir.path().join("legacy.c");
        fs::write(&source, "// a tpyo here\n").unwrap();
        fs::write(&latin1, b"/* caf\xe9 */\n").unwrap();

        let checker =
            SpellChecker::with_dictionary(Arc::new(fixture()), &Config::default()).unwrap();
        let files = collect_files(&[dir.path().to_path_buf()]);
        let reports = check_files(&checker, &files, 0).unwrap();
        assert_eq!(reports.len(), 2);

        let legacy = reports.iter().find(|r| r.path == latin1).unwrap();
        assert!(legacy.findings.is_empty());
        assert!(legacy.skipped.as_deref().unwrap().contains("failed to read"));

        let main = reports.iter().find(|r| r.path == source).unwrap();
        assert!(main.skipped.is_none());
        assert_eq!(main.findings[0].record.word, "tpyo");

        let missing = check_file(&checker, Path::new("/definitely/not/here.rs"), 0).unwrap();
        assert!(missing.skipped.is_some());
    }
}
