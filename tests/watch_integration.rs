//! Integration tests for SyncService (pair lifecycle and file watching)
//!
//! Tests that depend on file system notification timing are ignored by default. Run them with:
//! `cargo test --features service --test watch_integration -- --ignored --nocapture`
#![cfg(feature = "service")]

mod common;

use bibnote_core::{
    config::{FileConfigProvider, SyncPair},
    document::SectionDocument,
    entry::Bibliography,
    event::{Direction, Event, SyncReport},
    watch::{Side, SyncService, WatchState},
    BibnoteError,
};
use common::{create_sync_pair, init_logging, BIB_ABC};
use std::{
    fs,
    sync::mpsc::{channel, Receiver},
    time::{Duration, Instant},
};
use tempfile::TempDir;

const DEBOUNCE: Duration = Duration::from_millis(100);

fn wait_for<F: Fn(&Event) -> bool>(rx: &Receiver<Event>, timeout: Duration, pred: F) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    None
}

#[test]
fn test_enable_generates_missing_document() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (bib, doc, template) = create_sync_pair(&temp_dir, BIB_ABC);
    let (tx, rx) = channel::<Event>();
    let service = SyncService::with_debounce(Some(tx), DEBOUNCE);

    let id = service
        .enable_pair(SyncPair::new(bib, doc.clone(), Some(template)))
        .unwrap();
    assert_eq!(id, doc);
    assert!(doc.exists());
    assert_eq!(rx.try_recv().unwrap(), Event::DocumentGenerated(doc.clone()));
    assert_eq!(rx.try_recv().unwrap(), Event::PairEnabled(doc.clone()));

    let keys: Vec<String> = SectionDocument::load(&doc)
        .unwrap()
        .keys()
        .map(str::to_string)
        .collect();
    assert_eq!(keys, vec!["alpha", "beta", "gamma"]);
    assert_eq!(service.watch_state(&doc, Side::Bib), Some(WatchState::Watching));
    assert_eq!(service.watch_state(&doc, Side::Doc), Some(WatchState::Watching));
}

#[test]
fn test_enable_without_bibliography_fails() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (bib, doc, template) = create_sync_pair(&temp_dir, BIB_ABC);
    fs::remove_file(&bib).unwrap();
    let service = SyncService::new(None);

    let err = service
        .enable_pair(SyncPair::new(bib, doc.clone(), Some(template)))
        .unwrap_err();
    assert!(matches!(err, BibnoteError::MissingFile(_)));
    assert!(!doc.exists());
    assert!(service.pairs().is_empty());
}

#[test]
fn test_enable_twice_and_disable() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (bib, doc, template) = create_sync_pair(&temp_dir, BIB_ABC);
    let service = SyncService::with_debounce(None, DEBOUNCE);
    let pair = SyncPair::new(bib, doc.clone(), Some(template));

    service.enable_pair(pair.clone()).unwrap();
    assert!(service.enable_pair(pair).is_err());
    assert_eq!(service.pairs().len(), 1);

    service.disable_pair(&doc).unwrap();
    assert!(service.pairs().is_empty());
    assert_eq!(service.watch_state(&doc, Side::Doc), None);
    assert!(matches!(
        service.disable_pair(&doc),
        Err(BibnoteError::NotFound(_))
    ));
}

#[test]
fn test_enable_config_and_shutdown() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    create_sync_pair(&temp_dir, BIB_ABC);
    let config = temp_dir.path().join("config.yml");
    fs::write(&config, "sync:\n  - bib: refs.bib\n    md: notes.qmd\n").unwrap();

    let service = SyncService::with_debounce(None, DEBOUNCE);
    let ids = service
        .enable_config(&FileConfigProvider::new(config))
        .unwrap();
    assert_eq!(ids, vec![temp_dir.path().join("notes.qmd")]);

    service.shutdown();
    assert!(service.pairs().is_empty());
}

#[test]
#[ignore = "File watching can be timing-sensitive in test environments"]
fn test_bibliography_change_adds_section() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (bib, doc, template) = create_sync_pair(&temp_dir, BIB_ABC);
    let (tx, rx) = channel::<Event>();
    let service = SyncService::with_debounce(Some(tx), DEBOUNCE);
    service
        .enable_pair(SyncPair::new(bib.clone(), doc.clone(), Some(template)))
        .unwrap();
    std::thread::sleep(Duration::from_millis(500));
    while rx.try_recv().is_ok() {}

    let with_delta = format!("{BIB_ABC}\n@Misc{{delta,\n  title = {{Delta}}\n}}\n");
    fs::write(&bib, with_delta).unwrap();

    let event = wait_for(&rx, Duration::from_secs(5), |e| {
        matches!(e, Event::Synced { .. } | Event::SyncFailed { .. })
    })
    .expect("a sync event after the bibliography changed");
    match event {
        Event::Synced {
            report: SyncReport::Projection(report),
            ..
        } => assert_eq!(report.inserted, vec!["delta"]),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(SectionDocument::load(&doc).unwrap().contains("delta"));

    // the document write happened while its watcher was suspended: no echo conversion
    assert!(wait_for(&rx, Duration::from_secs(1), |e| matches!(
        e,
        Event::Synced {
            report: SyncReport::Overwrite(_),
            ..
        }
    ))
    .is_none());
    assert_eq!(service.watch_state(&doc, Side::Doc), Some(WatchState::Watching));
}

#[test]
#[ignore = "File watching can be timing-sensitive in test environments"]
fn test_document_change_writes_back_notes() {
    init_logging();
    let temp_dir = TempDir::new().unwrap();
    let (bib, doc, template) = create_sync_pair(&temp_dir, BIB_ABC);
    let (tx, rx) = channel::<Event>();
    let service = SyncService::with_debounce(Some(tx), DEBOUNCE);
    service
        .enable_pair(SyncPair::new(bib.clone(), doc.clone(), Some(template)))
        .unwrap();
    std::thread::sleep(Duration::from_millis(500));
    while rx.try_recv().is_ok() {}

    let mut document = SectionDocument::load(&doc).unwrap();
    document.update_notes("gamma", "Watched edit").unwrap();

    let event = wait_for(&rx, Duration::from_secs(5), |e| {
        matches!(e, Event::Synced { .. } | Event::SyncFailed { .. })
    })
    .expect("a sync event after the document changed");
    match event {
        Event::Synced { report, .. } => {
            assert_eq!(report.direction(), Direction::DocToBib);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let bib = Bibliography::load(&bib).unwrap();
    assert_eq!(
        bib.get("gamma").unwrap().comment().as_deref(),
        Some("Watched edit")
    );
}
