//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times, later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub const BIB_ABC: &str = r#"% Encoding: UTF-8

@Article{alpha,
  author = {Author, Ann},
  title = {Alpha: a first paper},
  year = {2020}
}

@Book{beta,
  title = {Beta {Book}},
  publisher = {Pub},
  comment = {Seeded from the bibliography}
}

@Misc{gamma,
  title = {Gamma},
  howpublished = "\url{https://example.org}"
}

@Comment{jabref-meta: databaseType:bibtex;}
"#;

/// Template with YAML front matter and a heading before the sections.
#[allow(dead_code)]
pub const TEMPLATE: &str = r#"---
title: "Reading notes"
bibliography: {bib_file}
format:
  html:
    toc: true
---

# Papers

{bibtex}
"#;

/// Write `refs.bib` and `template.qmd` into a fresh directory.
///
/// Returns (bib path, doc path, template path). The document is not created.
#[allow(dead_code)]
pub fn create_sync_pair(temp_dir: &TempDir, bib: &str) -> (PathBuf, PathBuf, PathBuf) {
    let bib_path = temp_dir.path().join("refs.bib");
    let doc_path = temp_dir.path().join("notes.qmd");
    let template_path = temp_dir.path().join("template.qmd");
    std::fs::write(&bib_path, bib).unwrap();
    std::fs::write(&template_path, TEMPLATE).unwrap();
    (bib_path, doc_path, template_path)
}
