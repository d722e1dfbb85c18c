//! Fixed text layouts: one section per entry, and the document a pair starts from.

use once_cell::sync::Lazy;
use regex::Regex;
use std::{fs, path::Path};

use crate::error::BibnoteError;

/// Template file name used when a sync pair does not name one.
pub const DEFAULT_TEMPLATE_FILE: &str = "template.qmd";

pub const BIB_FILE_PLACEHOLDER: &str = "{bib_file}";
pub const BIBTEX_PLACEHOLDER: &str = "{bibtex}";

/// Used when the configured template file does not exist.
pub const DEFAULT_DOCUMENT_TEMPLATE: &str = r#"---
title: "Reading notes"
bibliography: {bib_file}
---

{bibtex}
"#;

static CITABLE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+$").expect("citable key regex is valid"));

/// Whether `key` survives as a `@key` citation token, i.e. whether a section written for it can
/// be found again.
pub fn is_citable_key(key: &str) -> bool {
    CITABLE_KEY.is_match(key)
}

/// Body of the notes container. Always padded by one blank line on each side, an empty note is a
/// single blank line.
pub fn render_notes(notes: &str) -> Vec<String> {
    let notes = notes.trim();
    if notes.is_empty() {
        return vec![String::new()];
    }
    let mut lines = vec![String::new()];
    lines.extend(notes.split('\n').map(|line| line.trim_end_matches('\r').to_string()));
    lines.push(String::new());
    lines
}

/// ```text
/// ### {title}
/// <br>@{key}
///
/// ::: notes
///
/// {notes}
///
/// :::
/// ```
pub fn render_section(key: &str, title: &str, notes: &str) -> Vec<String> {
    let title = title.split_whitespace().collect::<Vec<&str>>().join(" ");
    let mut lines = vec![
        format!("### {title}"),
        format!("<br>@{key}"),
        String::new(),
        "::: notes".to_string(),
    ];
    lines.extend(render_notes(notes));
    lines.push(":::".to_string());
    lines
}

/// Read a document template, falling back to [`DEFAULT_DOCUMENT_TEMPLATE`] when it is missing.
pub fn load_document_template(path: &Path) -> Result<String, BibnoteError> {
    if !path.exists() {
        tracing::warn!(
            "Template {:?} not found, generating the document from the built-in template",
            path
        );
        return Ok(DEFAULT_DOCUMENT_TEMPLATE.to_string());
    }
    Ok(fs::read_to_string(path)?)
}

/// Fill the two placeholders. Any other braces in the template (YAML, Quarto attributes) are left
/// alone.
pub fn render_document(template: &str, bib_file: &str, sections: &[Vec<String>]) -> String {
    let body = sections
        .iter()
        .map(|section| section.join("\n"))
        .collect::<Vec<String>>()
        .join("\n\n");
    template
        .replace(BIB_FILE_PLACEHOLDER, bib_file)
        .replace(BIBTEX_PLACEHOLDER, &body)
}
