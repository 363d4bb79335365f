//! Watch mode: scan every file once, then re-scan on change with debounce.

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher as _};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::check::{collect_files, FileReport};
use super::output;
use crate::checker::SpellChecker;
use crate::diagnostics::DiagnosticCollection;
use crate::document::{Document, DocumentUri};
use crate::parser::SourceLang;
use crate::scheduler::{ScanOutcome, ScanReport, Scheduler, SchedulerHandle};

#[derive(Debug)]
enum FileChange {
    Written(PathBuf),
    Removed(PathBuf),
}

/// Create a filesystem watcher that forwards file changes on the given channel.
fn create_watcher(tx: mpsc::UnboundedSender<FileChange>) -> Result<notify::RecommendedWatcher> {
    notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                warn!("watch error: {}", e);
                return;
            }
        };
        for path in event.paths {
            let change = match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => FileChange::Written(path),
                EventKind::Remove(_) => FileChange::Removed(path),
                _ => continue,
            };
            let _ = tx.send(change);
        }
    })
    .context("Failed to create file watcher")
}

/// Open documents, keyed by URI, with the snapshot last handed to the scheduler.
struct Workspace {
    documents: HashMap<DocumentUri, Document>,
}

impl Workspace {
    fn open(&mut self, handle: &SchedulerHandle, path: &Path) {
        match Document::from_path(path, 1) {
            Ok(document) => {
                self.documents.insert(document.uri().clone(), document.clone());
                handle.open(document);
            }
            Err(e) => warn!("{}", e),
        }
    }

    fn written(&mut self, handle: &SchedulerHandle, path: &Path) {
        let uri = DocumentUri::from_path(path);
        let Some(version) = self.documents.get(&uri).map(|doc| doc.version() + 1) else {
            if SourceLang::from_path(path) != SourceLang::Other && path.is_file() {
                debug!(path = %path.display(), "new file");
                self.open(handle, path);
            }
            return;
        };
        match Document::from_path(path, version) {
            Ok(document) => {
                if self
                    .documents
                    .get(&uri)
                    .is_some_and(|current| current.text() == document.text())
                {
                    return;
                }
                self.documents.insert(uri, document.clone());
                handle.change(document);
            }
            Err(e) => debug!("ignoring change: {}", e),
        }
    }

    fn removed(&mut self, handle: &SchedulerHandle, path: &Path) {
        let uri = DocumentUri::from_path(path);
        if self.documents.remove(&uri).is_some() {
            handle.close(uri);
        }
    }
}

/// Entry point for the watch command. Returns after Ctrl-C.
pub fn run(
    checker: SpellChecker,
    paths: &[PathBuf],
    debounce: std::time::Duration,
    max_suggestions: usize,
    colored: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let checker = Arc::new(checker);
    runtime.block_on(watch(
        Arc::clone(&checker),
        paths,
        debounce,
        max_suggestions,
        colored,
        tokio::signal::ctrl_c(),
    ))?;

    checker.dictionary().dispose();
    Ok(())
}

async fn watch(
    checker: Arc<SpellChecker>,
    paths: &[PathBuf],
    debounce: std::time::Duration,
    max_suggestions: usize,
    colored: bool,
    shutdown: impl Future<Output = io::Result<()>>,
) -> Result<()> {
    let collection = Arc::new(DiagnosticCollection::new());
    let (handle, mut reports) =
        Scheduler::spawn(Arc::clone(&checker), Arc::clone(&collection), debounce);

    let (tx, mut changes) = mpsc::unbounded_channel();
    let mut watcher = create_watcher(tx)?;
    for path in paths {
        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let mut workspace = Workspace {
        documents: HashMap::new(),
    };
    for file in collect_files(paths) {
        workspace.open(&handle, &file);
    }
    info!(
        files = workspace.documents.len(),
        debounce = ?debounce,
        "watching, press Ctrl+C to stop"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!("cannot listen for Ctrl-C: {}", e);
                }
                info!("stopping");
                break;
            }
            Some(change) = changes.recv() => match change {
                FileChange::Written(path) => workspace.written(&handle, &path),
                FileChange::Removed(path) => workspace.removed(&handle, &path),
            },
            Some(report) = reports.recv() => {
                print_report(&checker, &collection, &workspace, &report, max_suggestions, colored);
            }
        }
    }

    drop(watcher);
    handle.shutdown().await;
    Ok(())
}

fn print_report(
    checker: &SpellChecker,
    collection: &DiagnosticCollection,
    workspace: &Workspace,
    report: &ScanReport,
    max_suggestions: usize,
    colored: bool,
) {
    if !matches!(report.outcome, ScanOutcome::Committed { .. }) {
        return;
    }
    // a newer snapshot is already queued for scanning
    let Some(document) = workspace
        .documents
        .get(&report.uri)
        .filter(|document| document.version() == report.version)
    else {
        return;
    };
    let path = report
        .uri
        .to_path()
        .unwrap_or_else(|| PathBuf::from(report.uri.as_str()));
    let records = collection.get(&report.uri);
    let file_report = FileReport::new(
        path,
        document,
        &records,
        checker.dictionary(),
        max_suggestions,
    );
    output::print_watch_update(&file_report, colored);
}
