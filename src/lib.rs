//! # bibnote-core
//!
//! Keeps a BibTeX bibliography and a markdown (Quarto) notes document in sync, one section per
//! bibliography entry.
//!
//! ## Overview
//!
//! Each entry of the bibliography owns a section in the document:
//!
//! ```markdown
//! ### Learning BibTeX the hard way
//! <br>@smith2020
//!
//! ::: notes
//!
//! Free-form notes about the paper.
//!
//! :::
//! ```
//!
//! Syncing runs in two directions:
//!
//! - **Bibliography to document**: entries without a section get one, inserted after the section
//!   of the entry that precedes them in the bibliography. Existing sections are never rewritten.
//! - **Document to bibliography**: the notes of each section are written into the `comment`
//!   field of the matching entry. All other fields are carried through as they were written.
//!
//! Keys that exist on only one side are reported and otherwise ignored.
//!
//! ## Architecture
//!
//! - **[`entry`]**: Entry Store (`Bibliography`, `Entry`)
//! - **[`codec`]**: BibTeX reader/writer and the markdown block tree
//! - **[`document`]**: Section Model (`SectionDocument`), section locator and templates
//! - **[`converter`]**: both sync directions, with reports of what changed
//! - **[`event`]**: events emitted by the watch service
//! - **[`config`]**: sync pairs from `config.yml` (requires `service`)
//! - **[`watch`]**: file watching with per-pair workers (requires `service`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bibnote_core::converter::Converter;
//!
//! # fn main() -> Result<(), bibnote_core::BibnoteError> {
//! let mut converter = Converter::new("refs.bib", "notes.qmd", "template.qmd");
//!
//! // Add sections for new entries (creates notes.qmd from the template if needed)
//! let report = converter.bibliography_to_document()?;
//! println!("inserted: {:?}", report.inserted);
//!
//! // Copy edited notes back into the bibliography
//! let report = converter.document_to_bibliography()?;
//! println!("updated: {:?}, orphaned: {:?}", report.updated, report.orphaned_sections);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: conversion library only
//! - **service**: file watching (`notify`) and configuration
//! - **bin**: the `bibnote` command line tool

pub mod codec;
#[cfg(all(feature = "service", not(target_arch = "wasm32")))]
pub mod config;
pub mod converter;
pub mod document;
pub mod entry;
pub mod error;
pub mod event;
#[cfg(test)]
mod tests;
#[cfg(all(feature = "service", not(target_arch = "wasm32")))]
pub mod watch;

pub use error::*;
