//! Bidirectional Converter between one bibliography and one notes document.
//!
//! - [`Converter::bibliography_to_document`] adds a section for every entry the document lacks,
//!   in bibliography order. Existing sections are never rewritten.
//! - [`Converter::document_to_bibliography`] copies each section's notes into the `comment`
//!   field of the entry with the same key.
//!
//! Keys present on only one side are reported, never treated as errors.

use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    document::{
        template::{is_citable_key, load_document_template, render_document, render_section},
        InsertPosition, SectionDocument,
    },
    entry::{Bibliography, Entry},
    error::BibnoteError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConverterState {
    Idle,
    Loading,
    Projecting,
    Overwriting,
    Persisting,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionReport {
    /// The document did not exist and was written from the template
    pub generated: bool,
    pub inserted: Vec<String>,
    /// Duplicate keys and keys that cannot be cited as `@key`
    pub skipped: Vec<String>,
}

impl ProjectionReport {
    pub fn is_noop(&self) -> bool {
        !self.generated && self.inserted.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverwriteReport {
    /// Entries whose comment changed
    pub updated: Vec<String>,
    /// Entries without a section
    pub missing_sections: Vec<String>,
    /// Sections without an entry
    pub orphaned_sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Converter {
    bib_path: PathBuf,
    doc_path: PathBuf,
    template_path: PathBuf,
    state: ConverterState,
}

impl Converter {
    pub fn new<B, D, T>(bib_path: B, doc_path: D, template_path: T) -> Self
    where
        B: Into<PathBuf>,
        D: Into<PathBuf>,
        T: Into<PathBuf>,
    {
        Converter {
            bib_path: bib_path.into(),
            doc_path: doc_path.into(),
            template_path: template_path.into(),
            state: ConverterState::Idle,
        }
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    pub fn bib_path(&self) -> &Path {
        &self.bib_path
    }

    pub fn doc_path(&self) -> &Path {
        &self.doc_path
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Write the document from its template with a section for every entry. Does nothing when
    /// the document already exists.
    #[tracing::instrument(skip_all)]
    pub fn initialize_document(&mut self) -> Result<ProjectionReport, BibnoteError> {
        self.run(|conv| {
            if conv.doc_path.exists() {
                tracing::debug!("{:?} exists, not regenerating", conv.doc_path);
                return Ok(ProjectionReport::default());
            }
            let bib = conv.load_bibliography()?;
            conv.generate_document(&bib)
        })
    }

    #[tracing::instrument(skip_all)]
    pub fn bibliography_to_document(&mut self) -> Result<ProjectionReport, BibnoteError> {
        self.run(|conv| {
            let bib = conv.load_bibliography()?;
            if !conv.doc_path.exists() {
                tracing::debug!("{:?} does not exist, generating it", conv.doc_path);
                return conv.generate_document(&bib);
            }
            let mut doc = SectionDocument::load(&conv.doc_path)?;

            conv.state = ConverterState::Projecting;
            let mut report = ProjectionReport::default();
            let mut seen = HashSet::new();
            // most recent entry, in bibliography order, that has a section
            let mut anchor: Option<String> = None;
            for entry in bib.entries() {
                let key = entry.key();
                if !accept_key(key, &mut seen, &mut report) {
                    continue;
                }
                if doc.contains(key) {
                    anchor = Some(key.to_string());
                    continue;
                }
                let position = match (&anchor, doc.keys().next()) {
                    (Some(after), _) => InsertPosition::After(after.clone()),
                    (None, Some(first)) => InsertPosition::Before(first.to_string()),
                    (None, None) => InsertPosition::End,
                };
                let (title, notes) = section_content(entry);

                conv.state = ConverterState::Persisting;
                doc.insert_section_at(key, &title, &notes, position)?;
                conv.state = ConverterState::Projecting;

                report.inserted.push(key.to_string());
                anchor = Some(key.to_string());
            }
            if !report.inserted.is_empty() {
                tracing::info!(
                    "Added {} section(s) to {:?}: {:?}",
                    report.inserted.len(),
                    conv.doc_path,
                    report.inserted
                );
            }
            Ok(report)
        })
    }

    #[tracing::instrument(skip_all)]
    pub fn document_to_bibliography(&mut self) -> Result<OverwriteReport, BibnoteError> {
        self.run(|conv| {
            let mut bib = conv.load_bibliography()?;
            let doc = SectionDocument::load(&conv.doc_path)?;

            conv.state = ConverterState::Overwriting;
            let mut report = OverwriteReport::default();
            let mut bib_keys = HashSet::new();
            for entry in bib.entries_mut() {
                bib_keys.insert(entry.key().to_string());
                let Some(section) = doc.get(entry.key()) else {
                    report.missing_sections.push(entry.key().to_string());
                    continue;
                };
                if entry.comment().unwrap_or_default() != section.notes {
                    entry.set_comment(&section.notes);
                    report.updated.push(entry.key().to_string());
                }
            }
            report.orphaned_sections = doc
                .keys()
                .filter(|key| !bib_keys.contains(*key))
                .map(str::to_string)
                .collect();

            if !report.missing_sections.is_empty() {
                tracing::info!(
                    "Keys in bibliography but not in document: {:?}",
                    report.missing_sections
                );
            }
            if !report.orphaned_sections.is_empty() {
                tracing::info!(
                    "Keys in document but not in bibliography: {:?}",
                    report.orphaned_sections
                );
            }

            if report.updated.is_empty() {
                tracing::debug!("No comment changed, {:?} left as is", conv.bib_path);
                return Ok(report);
            }
            conv.state = ConverterState::Persisting;
            bib.save(&conv.bib_path)?;
            tracing::info!(
                "Updated {} comment(s) in {:?}: {:?}",
                report.updated.len(),
                conv.bib_path,
                report.updated
            );
            Ok(report)
        })
    }

    /// Run one conversion, returning to `Idle` whatever the outcome.
    fn run<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, BibnoteError>,
    ) -> Result<T, BibnoteError> {
        let result = op(self);
        if let Err(e) = &result {
            tracing::debug!("Conversion failed in state {:?}: {}", self.state, e);
        }
        self.state = ConverterState::Idle;
        result
    }

    fn load_bibliography(&mut self) -> Result<Bibliography, BibnoteError> {
        self.state = ConverterState::Loading;
        Bibliography::load(&self.bib_path)
    }

    fn generate_document(&mut self, bib: &Bibliography) -> Result<ProjectionReport, BibnoteError> {
        self.state = ConverterState::Projecting;
        let template = load_document_template(&self.template_path)?;
        let mut report = ProjectionReport {
            generated: true,
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut sections = Vec::new();
        for entry in bib.entries() {
            if !accept_key(entry.key(), &mut seen, &mut report) {
                continue;
            }
            let (title, notes) = section_content(entry);
            sections.push(render_section(entry.key(), &title, &notes));
            report.inserted.push(entry.key().to_string());
        }
        let text = render_document(&template, &self.bib_file_reference(), &sections);

        self.state = ConverterState::Persisting;
        fs::write(&self.doc_path, text)?;
        tracing::info!(
            "Generated {:?} with {} section(s)",
            self.doc_path,
            report.inserted.len()
        );
        Ok(report)
    }

    /// How the document refers to its bibliography: a bare file name when both live in the same
    /// directory.
    fn bib_file_reference(&self) -> String {
        match (self.bib_path.parent(), self.doc_path.parent(), self.bib_path.file_name()) {
            (Some(bib_dir), Some(doc_dir), Some(name)) if bib_dir == doc_dir => {
                name.to_string_lossy().to_string()
            }
            _ => self.bib_path.display().to_string(),
        }
    }
}

fn accept_key<'a>(
    key: &'a str,
    seen: &mut HashSet<&'a str>,
    report: &mut ProjectionReport,
) -> bool {
    if !seen.insert(key) {
        tracing::warn!("Duplicate bibliography key '{}', only the first entry is used", key);
        report.skipped.push(key.to_string());
        return false;
    }
    if !is_citable_key(key) {
        tracing::warn!("Key '{}' cannot be cited as @key, no section written", key);
        report.skipped.push(key.to_string());
        return false;
    }
    true
}

fn section_content(entry: &Entry) -> (String, String) {
    let title = entry
        .title()
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| entry.key().to_string());
    (title, entry.comment().unwrap_or_default())
}
