//! Tests for SectionDocument mutations

use super::*;
use crate::{
    error::BibnoteError,
    tests::helpers::{init_logging, write_fixture, THREE_SECTIONS},
};
use std::fs;
use test_log::test;

fn load_three(dir: &tempfile::TempDir) -> SectionDocument {
    init_logging();
    let path = write_fixture(dir.path(), "notes.qmd", THREE_SECTIONS);
    SectionDocument::load(path).unwrap()
}

fn section_texts(doc: &SectionDocument, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .map(|key| doc.section_text(key).unwrap())
        .collect()
}

#[test]
fn test_loads_sections_in_document_order() {
    let dir = tempfile::tempdir().unwrap();
    let doc = load_three(&dir);
    assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(doc.get("beta").unwrap().title, "Beta paper");
    assert_eq!(doc.get("beta").unwrap().notes, "Beta notes.");
    assert_eq!(doc.state(), EditState::Reloaded);
    assert_eq!(doc.text(), THREE_SECTIONS);
}

#[test]
fn test_update_notes_touches_only_the_notes_body() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    let before = section_texts(&doc, &["alpha", "gamma"]);

    doc.update_notes("beta", "Rewritten.\n\nTwo paragraphs.").unwrap();

    assert_eq!(doc.state(), EditState::Reloaded);
    assert_eq!(doc.get("beta").unwrap().notes, "Rewritten.\n\nTwo paragraphs.");
    assert_eq!(doc.get("beta").unwrap().title, "Beta paper");
    assert_eq!(section_texts(&doc, &["alpha", "gamma"]), before);
    assert_eq!(fs::read_to_string(doc.path()).unwrap(), doc.text());
}

#[test]
fn test_update_notes_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    let err = doc.update_notes("delta", "x").unwrap_err();
    assert_eq!(err, BibnoteError::KeyNotFound("delta".to_string()));
    assert!(err.is_recoverable());
    assert_eq!(fs::read_to_string(doc.path()).unwrap(), THREE_SECTIONS);
}

#[test]
fn test_replace_section_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    let before = section_texts(&doc, &["alpha", "gamma"]);

    doc.replace_section("beta", "Beta, revised", "New notes").unwrap();

    assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(
        doc.section_text("beta").unwrap(),
        "### Beta, revised\n<br>@beta\n\n::: notes\n\nNew notes\n\n:::"
    );
    assert_eq!(section_texts(&doc, &["alpha", "gamma"]), before);
    assert!(matches!(
        doc.replace_section("nope", "t", "n"),
        Err(BibnoteError::KeyNotFound(_))
    ));
}

#[test]
fn test_insert_after_key_keeps_neighbours_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    let before = section_texts(&doc, &["alpha", "beta", "gamma"]);

    doc.insert_section("delta", "Delta paper", "Delta notes", Some("beta"))
        .unwrap();

    assert_eq!(
        doc.keys().collect::<Vec<_>>(),
        vec!["alpha", "beta", "delta", "gamma"]
    );
    assert_eq!(section_texts(&doc, &["alpha", "beta", "gamma"]), before);
    let delta = doc.get("delta").unwrap();
    assert_eq!(
        (delta.title.as_str(), delta.notes.as_str()),
        ("Delta paper", "Delta notes")
    );
    assert!(doc
        .text()
        .contains(":::\n\n### Delta paper\n<br>@delta\n\n::: notes\n\nDelta notes\n\n:::\n\n### Gamma paper"));
}

#[test]
fn test_insert_before_and_at_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);

    doc.insert_section_at("first", "First", "", InsertPosition::Before("alpha".to_string()))
        .unwrap();
    doc.insert_section("last", "Last", "", None).unwrap();

    assert_eq!(
        doc.keys().collect::<Vec<_>>(),
        vec!["first", "alpha", "beta", "gamma", "last"]
    );
    let text = doc.text();
    assert!(text.ends_with("### Last\n<br>@last\n\n::: notes\n\n:::\n"));
    assert!(!text.ends_with("\n\n"));
    assert!(text.contains("# Reading notes\n\n### First\n"));
}

#[test]
fn test_insert_into_document_without_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "empty.qmd", "---\nbibliography: refs.bib\n---\n");
    let mut doc = SectionDocument::load(&path).unwrap();
    assert!(doc.sections().is_empty());

    doc.insert_section("a", "A", "first", None).unwrap();
    doc.insert_section("b", "B", "second", Some("a")).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "---\nbibliography: refs.bib\n---\n\n### A\n<br>@a\n\n::: notes\n\nfirst\n\n:::\n\n### B\n<br>@b\n\n::: notes\n\nsecond\n\n:::\n"
    );
}

#[test]
fn test_insert_rejects_duplicate_and_uncitable_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    assert_eq!(
        doc.insert_section("beta", "Again", "", None).unwrap_err(),
        BibnoteError::DuplicateKey("beta".to_string())
    );
    assert_eq!(
        doc.insert_section("doe-2019", "Dashed", "", None).unwrap_err(),
        BibnoteError::InvalidKey("doe-2019".to_string())
    );
    assert!(matches!(
        doc.insert_section("x", "X", "", Some("missing")),
        Err(BibnoteError::KeyNotFound(_))
    ));
    assert_eq!(fs::read_to_string(doc.path()).unwrap(), THREE_SECTIONS);
}

#[test]
fn test_inserted_section_round_trips_through_locator() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = load_three(&dir);
    let notes = "Line one\n\n- a list item\n- another\n\n```\ncode\n```";
    doc.insert_section("roundtrip", "A {Braced} title", notes, None)
        .unwrap();

    let reread = SectionDocument::load(doc.path()).unwrap();
    let section = reread.get("roundtrip").unwrap();
    assert_eq!(section.title, "A {Braced} title");
    assert_eq!(section.notes, notes);
}

#[test]
fn test_failed_write_leaves_document_dirty() {
    let dir = tempfile::tempdir().unwrap();
    let missing_dir = dir.path().join("not-there").join("notes.qmd");
    let mut doc = SectionDocument::from_text(&missing_dir, THREE_SECTIONS);

    assert!(doc.update_notes("alpha", "x").is_err());
    assert_eq!(doc.state(), EditState::Dirty);
    // the next edit reloads from disk first, which fails the same way
    assert!(doc.update_notes("alpha", "y").is_err());
}
