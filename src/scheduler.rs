//! Debounced re-scanning of open documents.
//!
//! Every document is `Idle`, `Scheduled` or `Scanning`. Edits are coalesced
//! into one scan per debounce window; opening, focusing and explicit scan
//! requests skip the window. At most one scan per document runs at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::diagnostics::DiagnosticCollection;
use crate::document::{Document, DocumentUri};
use crate::error::{Error, Result};
use crate::MisspellingRecord;

/// Produces the misspellings of one document snapshot.
pub trait DocumentScanner: Send + Sync + 'static {
    fn scan(&self, document: &Document) -> Result<Vec<MisspellingRecord>>;
}

/// Notifications from the host.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// A document was loaded or activated. Scanned immediately.
    Opened(Document),
    /// The text changed. Diagnostics are cleared and a scan is debounced.
    Changed(Document),
    /// The user switched to this document.
    Focused(DocumentUri),
    /// Scan this document now.
    ScanNow(DocumentUri),
    /// Drop this document's diagnostics without rescanning.
    Clear(DocumentUri),
    Closed(DocumentUri),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Committed { count: usize },
    /// No grammar for the document's language.
    Skipped(String),
    Failed(String),
    /// A newer version had already been committed.
    Stale,
}

/// Emitted once per finished scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub uri: DocumentUri,
    pub version: u64,
    pub outcome: ScanOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Scheduled { deadline: Instant },
    /// `rescan` is when to scan again once the running scan finishes.
    Scanning { rescan: Option<Instant> },
}

struct Tracked {
    /// Latest snapshot; `None` once closed while a scan was still running.
    document: Option<Document>,
    phase: Phase,
}

type Finished = (DocumentUri, u64, Result<Vec<MisspellingRecord>>);

/// Sends [`DocumentEvent`]s to a running scheduler.
///
/// Dropping the handle stops the scheduler once in-flight scans finish.
pub struct SchedulerHandle {
    events: mpsc::UnboundedSender<DocumentEvent>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Returns `false` if the scheduler has stopped.
    pub fn send(&self, event: DocumentEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn open(&self, document: Document) -> bool {
        self.send(DocumentEvent::Opened(document))
    }

    pub fn change(&self, document: Document) -> bool {
        self.send(DocumentEvent::Changed(document))
    }

    pub fn focus(&self, uri: DocumentUri) -> bool {
        self.send(DocumentEvent::Focused(uri))
    }

    pub fn scan_now(&self, uri: DocumentUri) -> bool {
        self.send(DocumentEvent::ScanNow(uri))
    }

    pub fn clear(&self, uri: DocumentUri) -> bool {
        self.send(DocumentEvent::Clear(uri))
    }

    pub fn close(&self, uri: DocumentUri) -> bool {
        self.send(DocumentEvent::Closed(uri))
    }

    /// Stop accepting events and wait for in-flight scans to be committed.
    pub async fn shutdown(self) {
        let Self { events, task } = self;
        drop(events);
        if let Err(e) = task.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
            error!("scheduler task failed: {}", e);
        }
    }
}

pub struct Scheduler<S> {
    scanner: Arc<S>,
    collection: Arc<DiagnosticCollection>,
    debounce: Duration,
    documents: HashMap<DocumentUri, Tracked>,
    in_flight: JoinSet<Finished>,
    reports: mpsc::UnboundedSender<ScanReport>,
}

impl<S: DocumentScanner> Scheduler<S> {
    /// Start the scheduler on the current tokio runtime.
    pub fn spawn(
        scanner: Arc<S>,
        collection: Arc<DiagnosticCollection>,
        debounce: Duration,
    ) -> (SchedulerHandle, mpsc::UnboundedReceiver<ScanReport>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        let scheduler = Self {
            scanner,
            collection,
            debounce,
            documents: HashMap::new(),
            in_flight: JoinSet::new(),
            reports: reports_tx,
        };
        let task = tokio::spawn(scheduler.run(events_rx));

        (
            SchedulerHandle {
                events: events_tx,
                task,
            },
            reports_rx,
        )
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<DocumentEvent>) {
        info!(debounce = ?self.debounce, "scheduler started");
        let mut accepting = true;

        loop {
            if !accepting && self.in_flight.is_empty() {
                break;
            }
            let deadline = self.next_deadline();

            tokio::select! {
                event = events.recv(), if accepting => match event {
                    Some(event) => self.handle(event),
                    None => {
                        debug!(in_flight = self.in_flight.len(), "event channel closed");
                        accepting = false;
                    }
                },
                Some(joined) = self.in_flight.join_next() => match joined {
                    Ok((uri, version, result)) => self.finish(uri, version, result),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => error!("scan task failed: {}", e),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if accepting && deadline.is_some() => {
                    self.start_due();
                }
                else => break,
            }
        }

        info!("scheduler stopped");
    }

    fn handle(&mut self, event: DocumentEvent) {
        match event {
            DocumentEvent::Opened(document) => {
                let uri = document.uri().clone();
                debug!(%uri, version = document.version(), "document opened");
                self.track(document);
                self.request_now(&uri);
            }
            DocumentEvent::Changed(document) => {
                let uri = document.uri().clone();
                debug!(%uri, version = document.version(), "document changed");
                self.collection.clear(&uri);
                self.track(document);
                self.request_debounced(&uri);
            }
            DocumentEvent::Focused(uri) | DocumentEvent::ScanNow(uri) => {
                if self.is_open(&uri) {
                    self.request_now(&uri);
                } else {
                    debug!(%uri, "ignoring scan request for unknown document");
                }
            }
            DocumentEvent::Clear(uri) => self.collection.clear(&uri),
            DocumentEvent::Closed(uri) => self.close(&uri),
        }
    }

    /// Store the newest snapshot, ignoring ones older than what we have.
    fn track(&mut self, document: Document) {
        let tracked = self
            .documents
            .entry(document.uri().clone())
            .or_insert(Tracked {
                document: None,
                phase: Phase::Idle,
            });
        match &tracked.document {
            Some(current) if current.version() > document.version() => {
                warn!(
                    uri = %document.uri(),
                    current = current.version(),
                    received = document.version(),
                    "ignoring out-of-order snapshot"
                );
            }
            _ => tracked.document = Some(document),
        }
    }

    fn is_open(&self, uri: &DocumentUri) -> bool {
        self.documents
            .get(uri)
            .is_some_and(|tracked| tracked.document.is_some())
    }

    fn request_now(&mut self, uri: &DocumentUri) {
        let Some(phase) = self.documents.get(uri).map(|tracked| tracked.phase) else {
            return;
        };
        match phase {
            Phase::Idle | Phase::Scheduled { .. } => self.start_scan(uri),
            Phase::Scanning { .. } => self.set_phase(
                uri,
                Phase::Scanning {
                    rescan: Some(Instant::now()),
                },
            ),
        }
    }

    fn set_phase(&mut self, uri: &DocumentUri, phase: Phase) {
        if let Some(tracked) = self.documents.get_mut(uri) {
            tracked.phase = phase;
        }
    }

    fn request_debounced(&mut self, uri: &DocumentUri) {
        let Some(tracked) = self.documents.get_mut(uri) else {
            return;
        };
        let deadline = Instant::now() + self.debounce;
        tracked.phase = match tracked.phase {
            Phase::Idle | Phase::Scheduled { .. } => Phase::Scheduled { deadline },
            // an immediate rescan already queued wins over a later one
            Phase::Scanning { rescan: Some(at) } if at < deadline => tracked.phase,
            Phase::Scanning { .. } => Phase::Scanning {
                rescan: Some(deadline),
            },
        };
    }

    fn close(&mut self, uri: &DocumentUri) {
        debug!(%uri, "document closed");
        self.collection.remove(uri);
        let scanning = self
            .documents
            .get(uri)
            .is_some_and(|tracked| matches!(tracked.phase, Phase::Scanning { .. }));
        if scanning {
            // forgotten once the running scan reports back
            if let Some(tracked) = self.documents.get_mut(uri) {
                tracked.document = None;
                tracked.phase = Phase::Scanning { rescan: None };
            }
        } else {
            self.documents.remove(uri);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.documents
            .values()
            .filter_map(|tracked| match tracked.phase {
                Phase::Scheduled { deadline } => Some(deadline),
                _ => None,
            })
            .min()
    }

    fn start_due(&mut self) {
        let now = Instant::now();
        let due: Vec<DocumentUri> = self
            .documents
            .iter()
            .filter(|(_, tracked)| {
                matches!(tracked.phase, Phase::Scheduled { deadline } if deadline <= now)
            })
            .map(|(uri, _)| uri.clone())
            .collect();
        for uri in due {
            self.start_scan(&uri);
        }
    }

    fn start_scan(&mut self, uri: &DocumentUri) {
        let Some(tracked) = self.documents.get_mut(uri) else {
            return;
        };
        let Some(document) = tracked.document.clone() else {
            return;
        };
        tracked.phase = Phase::Scanning { rescan: None };
        debug!(%uri, version = document.version(), "scan started");

        let scanner = Arc::clone(&self.scanner);
        self.in_flight.spawn(async move {
            let result = scanner.scan(&document);
            (document.uri().clone(), document.version(), result)
        });
    }

    fn finish(&mut self, uri: DocumentUri, version: u64, result: Result<Vec<MisspellingRecord>>) {
        let still_open = self.is_open(&uri);

        let outcome = match result {
            Ok(records) if still_open => {
                let count = records.len();
                if self.collection.set_diagnostics(&uri, version, records) {
                    ScanOutcome::Committed { count }
                } else {
                    ScanOutcome::Stale
                }
            }
            Ok(_) => ScanOutcome::Stale,
            Err(e @ Error::GrammarLoad { .. }) => {
                warn!(%uri, "skipping document: {}", e);
                if still_open {
                    self.collection.set_diagnostics(&uri, version, Vec::new());
                }
                ScanOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                error!(%uri, version, "scan failed: {}", e);
                if still_open {
                    self.collection.set_diagnostics(&uri, version, Vec::new());
                }
                ScanOutcome::Failed(e.to_string())
            }
        };

        let next = match self.documents.get(&uri) {
            Some(tracked) if tracked.document.is_none() => None,
            Some(Tracked {
                phase: Phase::Scanning {
                    rescan: Some(deadline),
                },
                ..
            }) => Some(Phase::Scheduled { deadline: *deadline }),
            _ => Some(Phase::Idle),
        };
        match next {
            Some(phase) => self.set_phase(&uri, phase),
            None => {
                self.documents.remove(&uri);
            }
        }

        debug!(%uri, version, ?outcome, "scan finished");
        let _ = self.reports.send(ScanReport {
            uri,
            version,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, Range};
    use std::sync::Mutex;

    const DEBOUNCE: Duration = Duration::from_millis(1000);

    /// Flags every `tpyo` as one record and remembers each scanned version.
    #[derive(Default)]
    struct CountingScanner {
        scans: Mutex<Vec<u64>>,
    }

    impl CountingScanner {
        fn scans(&self) -> Vec<u64> {
            self.scans.lock().unwrap().clone()
        }
    }

    impl DocumentScanner for CountingScanner {
        fn scan(&self, document: &Document) -> Result<Vec<MisspellingRecord>> {
            self.scans.lock().unwrap().push(document.version());
            if document.uri().as_str().ends_with(".txt") {
                return Err(Error::GrammarLoad {
                    language: "text".to_string(),
                    reason: "unsupported".to_string(),
                });
            }
            if document.text().contains("boom") {
                return Err(Error::ScanFailure {
                    uri: document.uri().clone(),
                    reason: "parser gave up".to_string(),
                });
            }
            Ok(document
                .text()
                .matches("tpyo")
                .map(|word| MisspellingRecord::new(word, Range::new(Position::default(), Position::default())))
                .collect())
        }
    }

    fn doc(version: u64, text: &str) -> Document {
        Document::new(DocumentUri::new("file:///src/main.ts"), version, text)
    }

    fn start(
        scanner: &Arc<CountingScanner>,
    ) -> (
        SchedulerHandle,
        mpsc::UnboundedReceiver<ScanReport>,
        Arc<DiagnosticCollection>,
    ) {
        let collection = Arc::new(DiagnosticCollection::new());
        let (handle, reports) = Scheduler::spawn(Arc::clone(scanner), Arc::clone(&collection), DEBOUNCE);
        (handle, reports, collection)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_scans_once() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, _) = start(&scanner);

        for version in 1..=5 {
            handle.change(doc(version, "// tpyo"));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let report = reports.recv().await.unwrap();
        assert_eq!(report.version, 5);
        assert_eq!(report.outcome, ScanOutcome::Committed { count: 1 });
        assert_eq!(scanner.scans(), vec![5]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.change(doc(6, "// fine"));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.version, 6);
        assert_eq!(scanner.scans(), vec![5, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_waits_for_quiet_window() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, _) = start(&scanner);
        let started = Instant::now();

        handle.change(doc(1, ""));
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.change(doc(2, ""));
        reports.recv().await.unwrap();

        // deadline is reset by the second change
        assert!(started.elapsed() >= Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_is_immediate_and_change_clears() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, collection) = start(&scanner);
        let uri = doc(1, "").uri().clone();
        let started = Instant::now();

        handle.open(doc(1, "// tpyo tpyo"));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Committed { count: 2 });
        assert!(started.elapsed() < DEBOUNCE);
        assert_eq!(collection.get(&uri).len(), 2);

        handle.change(doc(2, "// tpyo"));
        settle().await;
        assert!(collection.get(&uri).is_empty());

        let report = reports.recv().await.unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(collection.get(&uri).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_skips_debounce() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, _) = start(&scanner);
        let uri = doc(1, "").uri().clone();

        handle.open(doc(1, ""));
        reports.recv().await.unwrap();

        let started = Instant::now();
        handle.change(doc(2, ""));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.focus(uri);
        let report = reports.recv().await.unwrap();
        assert_eq!(report.version, 2);
        assert!(started.elapsed() < DEBOUNCE);

        // the pending debounced scan was consumed by the focus scan
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(scanner.scans(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_document_focus_is_ignored() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, _reports, _) = start(&scanner);

        handle.focus(DocumentUri::new("file:///nowhere.ts"));
        handle.scan_now(DocumentUri::new("file:///nowhere.ts"));
        settle().await;
        assert!(scanner.scans().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grammar_error_skips_document() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, collection) = start(&scanner);
        let notes = Document::new(DocumentUri::new("file:///notes.txt"), 1, "tpyo");

        handle.open(notes.clone());
        let report = reports.recv().await.unwrap();
        assert!(matches!(report.outcome, ScanOutcome::Skipped(_)));
        assert!(collection.get(notes.uri()).is_empty());

        // other documents are unaffected
        handle.open(doc(1, "// tpyo"));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Committed { count: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_is_retried_on_next_change() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, collection) = start(&scanner);
        let uri = doc(1, "").uri().clone();

        handle.open(doc(1, "// boom"));
        let report = reports.recv().await.unwrap();
        assert!(matches!(report.outcome, ScanOutcome::Failed(ref reason) if reason.contains("parser gave up")));
        assert!(collection.get(&uri).is_empty());

        handle.change(doc(2, "// tpyo"));
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Committed { count: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_and_close() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, collection) = start(&scanner);
        let uri = doc(1, "").uri().clone();

        handle.open(doc(1, "// tpyo"));
        reports.recv().await.unwrap();

        handle.clear(uri.clone());
        settle().await;
        assert!(collection.get(&uri).is_empty());
        assert_eq!(collection.committed_version(&uri), Some(1));

        handle.close(uri.clone());
        settle().await;
        assert!(collection.uris().is_empty());

        handle.scan_now(uri);
        settle().await;
        assert_eq!(scanner.scans(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_waits_for_in_flight_scan() {
        let scanner = Arc::new(CountingScanner::default());
        let (handle, mut reports, collection) = start(&scanner);

        handle.open(doc(1, "// tpyo"));
        drop(handle);

        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, ScanOutcome::Committed { count: 1 });
        assert_eq!(collection.total(), 1);
        assert!(reports.recv().await.is_none());
    }

    /// Blocks every scan until the test releases it.
    struct GatedScanner {
        started: Mutex<std::sync::mpsc::Sender<u64>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl DocumentScanner for GatedScanner {
        fn scan(&self, document: &Document) -> Result<Vec<MisspellingRecord>> {
            self.started.lock().unwrap().send(document.version()).unwrap();
            self.release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .unwrap();
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_change_during_scan_queues_rescan() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let scanner = Arc::new(GatedScanner {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let collection = Arc::new(DiagnosticCollection::new());
        let (handle, mut reports) =
            Scheduler::spawn(scanner, Arc::clone(&collection), Duration::from_millis(20));

        handle.open(doc(1, ""));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);

        handle.change(doc(2, ""));
        tokio::time::sleep(Duration::from_millis(50)).await;
        release_tx.send(()).unwrap();

        // the in-flight result is still committed
        let first = reports.recv().await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.outcome, ScanOutcome::Committed { count: 0 });

        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
        release_tx.send(()).unwrap();
        let second = reports.recv().await.unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(collection.committed_version(&first.uri), Some(2));
    }
}
