//! # Watch Service - Keeping Sync Pairs in Step
//!
//! [`SyncService`] watches both files of every enabled [`SyncPair`] and runs the matching
//! conversion when one of them changes:
//!
//! - bibliography changed: [`Converter::bibliography_to_document`]
//! - document changed: [`Converter::document_to_bibliography`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bibnote_core::{config::SyncPair, event::Event, watch::SyncService};
//! use std::sync::mpsc::channel;
//!
//! let (tx, rx) = channel::<Event>();
//! let service = SyncService::new(Some(tx));
//!
//! // Generates notes.qmd from template.qmd if it does not exist yet
//! service.enable_pair(SyncPair::new("refs.bib", "notes.qmd", Some("template.qmd")))?;
//!
//! for event in rx {
//!     match event {
//!         Event::Synced { pair, report } => println!("{pair:?}: {report:?}"),
//!         Event::SyncFailed { pair, error, .. } => eprintln!("{pair:?}: {error}"),
//!         _ => {}
//!     }
//! }
//! # Ok::<(), bibnote_core::BibnoteError>(())
//! ```
//!
//! ## Threading Model
//!
//! Per enabled pair:
//!
//! 1. **Two watcher threads** (from `notify-debouncer-full`), one per file. Each watches the
//!    file's parent directory, drops events for any other path, and forwards
//!    `PairMessage::Changed(side)` to the pair's worker.
//! 2. **One worker thread** that runs conversions one at a time. Around each conversion the
//!    watcher of the *opposite* file is suspended, so the write-back does not trigger a
//!    conversion in the other direction.
//!
//! Pairs share nothing, so different pairs convert concurrently.
//!
//! ## Shutdown
//!
//! - [`SyncService::disable_pair`]: stops one pair and joins its worker
//! - [`SyncService::shutdown`] or dropping the service: stops and joins every pair
//!
//! A conversion interrupted mid-write is not rolled back; the next change regenerates the
//! affected file.

use crate::{
    config::{ConfigProvider, SyncPair},
    converter::Converter,
    error::BibnoteError,
    event::{Direction, Event, SyncReport},
};

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    result::Result,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Sender},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

pub use crate::config::DEFAULT_DEBOUNCE;

/// A debounced file system watcher
type FileWatcher = Debouncer<RecommendedWatcher, FileIdMap>;

/// Map of document paths to their pair syncers
type PairSyncerMap = HashMap<PathBuf, PairSyncer>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bib,
    Doc,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bib => Side::Doc,
            Side::Doc => Side::Bib,
        }
    }

    /// Conversion triggered by a change on this side.
    pub fn direction(self) -> Direction {
        match self {
            Side::Bib => Direction::BibToDoc,
            Side::Doc => Direction::DocToBib,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairMessage {
    Changed(Side),
    Shutdown,
}

pub struct SyncService {
    syncers: Arc<Mutex<PairSyncerMap>>,
    event_tx: Option<Sender<Event>>,
    debounce: Duration,
}

impl SyncService {
    pub fn new(event_tx: Option<Sender<Event>>) -> Self {
        Self::with_debounce(event_tx, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(event_tx: Option<Sender<Event>>, debounce: Duration) -> Self {
        SyncService {
            syncers: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            debounce,
        }
    }

    /// Enable every pair the provider lists. Stops at the first pair that fails.
    pub fn enable_config(
        &self,
        provider: &dyn ConfigProvider,
    ) -> Result<Vec<PathBuf>, BibnoteError> {
        provider
            .get_pairs()?
            .into_iter()
            .map(|pair| self.enable_pair(pair))
            .collect()
    }

    /// Start watching a pair. Returns the document path, which identifies the pair from then on.
    ///
    /// A missing bibliography is fatal. A missing document is generated from the pair's template
    /// before any watcher is attached.
    #[tracing::instrument(skip_all)]
    pub fn enable_pair(&self, pair: SyncPair) -> Result<PathBuf, BibnoteError> {
        let mut syncers = self.syncers.lock();
        if syncers.contains_key(&pair.doc) {
            return Err(BibnoteError::Custom(format!(
                "SyncService already watches a pair for document {:?}",
                pair.doc
            )));
        }
        if !pair.bib.exists() {
            return Err(BibnoteError::missing_file(&pair.bib));
        }

        if !pair.doc.exists() {
            tracing::info!(
                "{:?} does not exist, generating it from {:?}",
                pair.doc,
                pair.template
            );
            pair.converter().bibliography_to_document()?;
            emit(&self.event_tx, Event::DocumentGenerated(pair.doc.clone()));
        }

        let doc = pair.doc.clone();
        let syncer = PairSyncer::new(pair, self.debounce, self.event_tx.clone())?;
        syncers.insert(doc.clone(), syncer);
        tracing::info!("Watching sync pair for {:?}", doc);
        emit(&self.event_tx, Event::PairEnabled(doc.clone()));
        Ok(doc)
    }

    pub fn disable_pair(&self, doc: &Path) -> Result<(), BibnoteError> {
        let removed = self.syncers.lock().remove(doc);
        match removed {
            Some(mut syncer) => {
                syncer.stop();
                emit(&self.event_tx, Event::PairDisabled(doc.to_path_buf()));
                Ok(())
            }
            None => Err(BibnoteError::NotFound(format!(
                "No sync pair is watching {doc:?}"
            ))),
        }
    }

    pub fn pairs(&self) -> Vec<SyncPair> {
        self.syncers
            .lock()
            .values()
            .map(|syncer| syncer.pair.clone())
            .collect()
    }

    pub fn watch_state(&self, doc: &Path, side: Side) -> Option<WatchState> {
        self.syncers
            .lock()
            .get(doc)
            .map(|syncer| syncer.watchers.lock().side(side).state())
    }

    /// Stop every pair and join its worker.
    pub fn shutdown(&self) {
        let syncers = std::mem::take(&mut *self.syncers.lock());
        for (doc, mut syncer) in syncers {
            tracing::debug!("Shutting down sync pair for {:?}", doc);
            syncer.stop();
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn emit(event_tx: &Option<Sender<Event>>, event: Event) {
    if let Some(tx) = event_tx {
        if let Err(e) = tx.send(event) {
            tracing::debug!("Event receiver is gone: {}", BibnoteError::from(e));
        }
    }
}

/// Watches one file of a pair.
pub(crate) struct SideWatcher {
    dir: PathBuf,
    debouncer: FileWatcher,
    paused: Arc<AtomicBool>,
    state: WatchState,
}

impl SideWatcher {
    fn new(
        side: Side,
        path: &Path,
        debounce: Duration,
        tx: Sender<PairMessage>,
    ) -> Result<SideWatcher, BibnoteError> {
        let (dir, file) = watch_target(path)?;
        let paused = Arc::new(AtomicBool::new(false));
        let callback_paused = paused.clone();

        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: DebounceEventResult| {
                forward_change(side, &file, &callback_paused, &tx, result);
            },
        )?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(SideWatcher {
            dir,
            debouncer,
            paused,
            state: WatchState::Watching,
        })
    }

    pub(crate) fn state(&self) -> WatchState {
        self.state
    }

    fn suspend(&mut self) -> Result<(), BibnoteError> {
        if self.state == WatchState::Suspended {
            return Ok(());
        }
        self.paused.store(true, Ordering::Relaxed);
        self.state = WatchState::Suspended;
        self.debouncer.watcher().unwatch(&self.dir)?;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BibnoteError> {
        if self.state == WatchState::Watching {
            return Ok(());
        }
        self.debouncer
            .watcher()
            .watch(&self.dir, RecursiveMode::NonRecursive)?;
        self.paused.store(false, Ordering::Relaxed);
        self.state = WatchState::Watching;
        Ok(())
    }
}

/// Debouncer callback: tell the pair worker that `file` changed, unless the side is suspended.
/// Returns whether a message was sent.
fn forward_change(
    side: Side,
    file: &Path,
    paused: &AtomicBool,
    tx: &Sender<PairMessage>,
    result: DebounceEventResult,
) -> bool {
    if paused.load(Ordering::Relaxed) {
        tracing::debug!("[SideWatcher {:?}] Suspended, ignoring events", side);
        return false;
    }
    match result {
        Ok(events) => {
            let touched = events.iter().any(|event| {
                matches!(event.event.kind, EventKind::Create(_) | EventKind::Modify(_))
                    && event.paths.iter().any(|p| p == file)
            });
            if !touched {
                return false;
            }
            tracing::info!("[SideWatcher] {:?} changed", file);
            if tx.send(PairMessage::Changed(side)).is_err() {
                tracing::debug!("[SideWatcher] Pair worker has stopped");
                return false;
            }
            true
        }
        Err(errors) => {
            tracing::error!("Notify debouncer returned errors: {:?}", errors);
            false
        }
    }
}

/// Canonical parent directory to watch, and the path events for `path` will carry.
fn watch_target(path: &Path) -> Result<(PathBuf, PathBuf), BibnoteError> {
    let file_name = path.file_name().ok_or_else(|| {
        BibnoteError::Watch(format!("{path:?} does not name a file"))
    })?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let dir = dir.canonicalize()?;
    let file = dir.join(file_name);
    Ok((dir, file))
}

pub(crate) struct PairWatchers {
    bib: SideWatcher,
    doc: SideWatcher,
}

impl PairWatchers {
    fn side(&self, side: Side) -> &SideWatcher {
        match side {
            Side::Bib => &self.bib,
            Side::Doc => &self.doc,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideWatcher {
        match side {
            Side::Bib => &mut self.bib,
            Side::Doc => &mut self.doc,
        }
    }
}

pub(crate) struct PairSyncer {
    pair: SyncPair,
    watchers: Arc<Mutex<PairWatchers>>,
    tx: Sender<PairMessage>,
    worker: Option<JoinHandle<()>>,
}

impl PairSyncer {
    #[tracing::instrument(skip_all)]
    fn new(
        pair: SyncPair,
        debounce: Duration,
        event_tx: Option<Sender<Event>>,
    ) -> Result<PairSyncer, BibnoteError> {
        let (tx, rx) = channel::<PairMessage>();
        let watchers = Arc::new(Mutex::new(PairWatchers {
            bib: SideWatcher::new(Side::Bib, &pair.bib, debounce, tx.clone())?,
            doc: SideWatcher::new(Side::Doc, &pair.doc, debounce, tx.clone())?,
        }));

        let worker_watchers = watchers.clone();
        let mut converter = pair.converter();
        let pair_id = pair.doc.clone();
        let thread_name = format!(
            "bibnote-sync-{}",
            pair_id
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default()
        );
        let worker = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                tracing::info!("[PairSyncer] Starting worker for {:?}", pair_id);
                while let Ok(message) = rx.recv() {
                    match message {
                        PairMessage::Changed(side) => {
                            let event =
                                sync_side(&mut converter, &worker_watchers, &pair_id, side);
                            emit(&event_tx, event);
                        }
                        PairMessage::Shutdown => break,
                    }
                }
                tracing::info!("[PairSyncer] Worker for {:?} stopped", pair_id);
            })?;

        Ok(PairSyncer {
            pair,
            watchers,
            tx,
            worker: Some(worker),
        })
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.tx.send(PairMessage::Shutdown).ok();
            if worker.join().is_err() {
                tracing::error!("[PairSyncer] Worker for {:?} panicked", self.pair.doc);
            }
        }
    }
}

impl Drop for PairSyncer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One conversion with the opposite watcher suspended around it.
fn sync_side(
    converter: &mut Converter,
    watchers: &Arc<Mutex<PairWatchers>>,
    pair: &Path,
    side: Side,
) -> Event {
    let target = side.opposite();
    if let Err(e) = watchers.lock().side_mut(target).suspend() {
        tracing::warn!("[PairSyncer] Could not suspend {:?} watcher: {}", target, e);
    }

    tracing::info!("[PairSyncer] {:?}: running {}", pair, side.direction());
    let result = match side {
        Side::Bib => converter
            .bibliography_to_document()
            .map(SyncReport::Projection),
        Side::Doc => converter
            .document_to_bibliography()
            .map(SyncReport::Overwrite),
    };

    if let Err(e) = watchers.lock().side_mut(target).resume() {
        tracing::error!("[PairSyncer] Could not resume {:?} watcher: {}", target, e);
    }

    match result {
        Ok(report) => Event::Synced {
            pair: pair.to_path_buf(),
            report,
        },
        Err(error) => {
            tracing::error!("[PairSyncer] {:?}: {} failed: {}", pair, side.direction(), error);
            Event::SyncFailed {
                pair: pair.to_path_buf(),
                direction: side.direction(),
                error,
            }
        }
    }
}
