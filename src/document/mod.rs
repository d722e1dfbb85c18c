//! Section Model: the notes document as a list of per-entry sections.
//!
//! # Module Organization
//!
//! - [`locator`]: finds `heading / @key paragraph / notes container` triples in a block tree
//! - [`template`]: the fixed section layout and the document template used for first-time
//!   generation
//! - [`model`]: [`SectionDocument`], which owns the raw lines and the block tree and edits them in
//!   lock-step
//!
//! Every edit splices raw lines, writes the whole file, and then reparses it from disk. Sections
//! and anchors handed out before an edit are stale afterwards.
//!
//! ```rust,no_run
//! use bibnote_core::document::SectionDocument;
//!
//! # fn main() -> Result<(), bibnote_core::BibnoteError> {
//! let mut doc = SectionDocument::load("notes.qmd")?;
//! doc.insert_section("smith2020", "Learning BibTeX", "", None)?;
//! doc.update_notes("smith2020", "Worth a second read.")?;
//! # Ok(())
//! # }
//! ```

pub mod locator;
pub mod model;
pub mod template;

#[cfg(test)]
mod tests;

pub use locator::{Section, SectionAnchor};
pub use model::{EditState, InsertPosition, SectionDocument};
