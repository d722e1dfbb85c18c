use std::{
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

use crate::{
    codec::md::{join_lines, split_lines, MdTree},
    document::{
        locator::{locate_sections, Section},
        template::{is_citable_key, render_notes, render_section},
    },
    error::BibnoteError,
};

/// Where the in-memory tree and lines stand relative to the file on disk.
///
/// Every mutation walks `Reloaded -> Dirty -> Persisted -> Reloaded`. A document left in any
/// other state (a failed write, for instance) is reloaded from disk before the next mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// Tree, lines and sections were all derived from the same text
    Reloaded,
    /// Lines and tree were spliced but not yet written
    Dirty,
    /// Lines written to disk, sections not yet re-derived
    Persisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    After(String),
    Before(String),
    End,
}

/// A markdown document seen as an ordered list of per-entry [`Section`]s.
#[derive(Debug, Clone)]
pub struct SectionDocument {
    path: PathBuf,
    lines: Vec<String>,
    tree: MdTree,
    sections: Vec<Section>,
    state: EditState,
}

impl SectionDocument {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BibnoteError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BibnoteError::missing_file(path));
        }
        tracing::debug!("Reading document {:?}", path);
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(path, &text))
    }

    /// Parse `text` as if it had been read from `path`. Nothing is written until a mutation.
    pub fn from_text<P: AsRef<Path>>(path: P, text: &str) -> Self {
        let lines = split_lines(text);
        let tree = MdTree::from_lines(&lines);
        let sections = locate_sections(&tree, &lines);
        SectionDocument {
            path: path.as_ref().to_path_buf(),
            lines,
            tree,
            sections,
            state: EditState::Reloaded,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn text(&self) -> String {
        join_lines(&self.lines)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn get(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Section keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|section| section.key.as_str())
    }

    /// Raw text of one section, heading through closing fence.
    pub fn section_text(&self, key: &str) -> Result<String, BibnoteError> {
        let section = self.require(key)?;
        Ok(join_lines(&self.lines[section.anchor.lines.clone()]))
    }

    /// Re-derive everything from the file on disk.
    pub fn reload(&mut self) -> Result<(), BibnoteError> {
        let text = fs::read_to_string(&self.path)?;
        self.lines = split_lines(&text);
        self.tree = MdTree::from_lines(&self.lines);
        self.sections = locate_sections(&self.tree, &self.lines);
        self.state = EditState::Reloaded;
        Ok(())
    }

    /// Replace the body of one notes container, keeping its fences as written.
    pub fn update_notes(&mut self, key: &str, notes: &str) -> Result<(), BibnoteError> {
        self.ensure_reloaded()?;
        let anchor = self.require(key)?.anchor.clone();
        let container = self.tree.nodes()[anchor.notes].lines.clone();

        let mut chunk = self.lines[container.start..anchor.notes_lines.start].to_vec();
        chunk.extend(render_notes(notes));
        chunk.extend_from_slice(&self.lines[anchor.notes_lines.end..container.end]);

        tracing::debug!("Updating notes of '{}'", key);
        self.splice(container, chunk);
        self.commit()
    }

    /// Rewrite a whole section from the template, in place.
    pub fn replace_section(
        &mut self,
        key: &str,
        title: &str,
        notes: &str,
    ) -> Result<(), BibnoteError> {
        self.ensure_reloaded()?;
        if !is_citable_key(key) {
            return Err(BibnoteError::InvalidKey(key.to_string()));
        }
        let anchor = self.require(key)?.anchor.clone();
        tracing::debug!("Replacing section '{}'", key);
        self.splice(anchor.lines, render_section(key, title, notes));
        self.commit()
    }

    /// Add a section after `after_key`, or at the end of the document when `after_key` is None.
    pub fn insert_section(
        &mut self,
        key: &str,
        title: &str,
        notes: &str,
        after_key: Option<&str>,
    ) -> Result<(), BibnoteError> {
        let position = match after_key {
            Some(after) => InsertPosition::After(after.to_string()),
            None => InsertPosition::End,
        };
        self.insert_section_at(key, title, notes, position)
    }

    pub fn insert_section_at(
        &mut self,
        key: &str,
        title: &str,
        notes: &str,
        position: InsertPosition,
    ) -> Result<(), BibnoteError> {
        self.ensure_reloaded()?;
        if !is_citable_key(key) {
            return Err(BibnoteError::InvalidKey(key.to_string()));
        }
        if self.contains(key) {
            return Err(BibnoteError::DuplicateKey(key.to_string()));
        }
        let at = match &position {
            InsertPosition::After(after) => self.require(after)?.anchor.lines.end,
            InsertPosition::Before(before) => self.require(before)?.anchor.lines.start,
            InsertPosition::End => self.end_line(),
        };

        let mut chunk = Vec::new();
        if at > 0 && !self.lines[at - 1].trim().is_empty() {
            chunk.push(String::new());
        }
        chunk.extend(render_section(key, title, notes));
        if self.lines.get(at).is_some_and(|next| !next.trim().is_empty()) {
            chunk.push(String::new());
        }

        tracing::debug!("Inserting section '{}' at line {} ({:?})", key, at + 1, position);
        self.splice(at..at, chunk);
        self.commit()
    }

    fn require(&self, key: &str) -> Result<&Section, BibnoteError> {
        self.get(key)
            .ok_or_else(|| BibnoteError::KeyNotFound(key.to_string()))
    }

    fn ensure_reloaded(&mut self) -> Result<(), BibnoteError> {
        if self.state != EditState::Reloaded {
            tracing::debug!("{:?} is {:?}, reloading before edit", self.path, self.state);
            self.reload()?;
        }
        Ok(())
    }

    /// Line where appended text goes: before the empty line a trailing newline leaves behind.
    fn end_line(&self) -> usize {
        match self.lines.last() {
            Some(last) if last.is_empty() => self.lines.len() - 1,
            _ => self.lines.len(),
        }
    }

    fn splice(&mut self, replaced: Range<usize>, chunk: Vec<String>) {
        let replacement = MdTree::from_lines(&chunk);
        self.tree.splice(replaced.clone(), chunk.len(), replacement);
        self.lines.splice(replaced, chunk);
        self.state = EditState::Dirty;
    }

    /// Write the lines out and reparse from disk.
    fn commit(&mut self) -> Result<(), BibnoteError> {
        fs::write(&self.path, join_lines(&self.lines))?;
        self.state = EditState::Persisted;

        let spliced = std::mem::take(&mut self.tree);
        self.reload()?;
        if spliced != self.tree {
            tracing::warn!(
                "{:?}: spliced block tree differs from the reparsed one, using the reparse",
                self.path
            );
        }
        Ok(())
    }
}
