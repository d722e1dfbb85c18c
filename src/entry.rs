//! Entry Store: the in-memory bibliography.
//!
//! A [`Bibliography`] is an ordered list of [`BibItem`]s as they appear in the `.bib` file. Only
//! three things about an [`Entry`] are interpreted here: its `key`, its `title` and its
//! optional `comment` field. Every other field is carried through opaquely as raw BibTeX text.

use std::{fs, path::Path};

use crate::{
    codec::bibtex::{brace_value, parse_bibtex, unwrap_value, write_bibtex},
    error::BibnoteError,
};

/// Leading comment written by JabRef. Kept verbatim as the first line of the file.
pub const ENCODING_MARKER: &str = "% Encoding:";

pub const TITLE_FIELD: &str = "title";
pub const COMMENT_FIELD: &str = "comment";

/// One bibliographic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    entry_type: String,
    key: String,
    /// (name, raw value) in source order
    fields: Vec<(String, String)>,
}

impl Entry {
    pub fn new(entry_type: &str, key: &str) -> Self {
        Entry {
            entry_type: entry_type.to_string(),
            key: key.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Field value exactly as written in the source, matched case-insensitively.
    pub fn raw_field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Field value with its outer `{}`/`""` delimiters removed.
    pub fn field(&self, name: &str) -> Option<String> {
        self.raw_field(name)
            .map(|value| unwrap_value(value).to_string())
    }

    /// Replace the field in place (keeping its position and spelling), or append it.
    pub fn set_field(&mut self, name: &str, raw: &str) {
        match self
            .fields
            .iter_mut()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
        {
            Some((_, value)) => *value = raw.to_string(),
            None => self.fields.push((name.to_string(), raw.to_string())),
        }
    }

    /// Single-line title: group braces dropped and whitespace runs collapsed.
    pub fn title(&self) -> Option<String> {
        self.field(TITLE_FIELD).map(|title| {
            title
                .replace(['{', '}'], "")
                .split_whitespace()
                .collect::<Vec<&str>>()
                .join(" ")
        })
    }

    /// Comment text with surrounding whitespace trimmed, as notes are.
    pub fn comment(&self) -> Option<String> {
        self.field(COMMENT_FIELD)
            .map(|comment| comment.trim().to_string())
    }

    pub fn set_comment(&mut self, text: &str) {
        self.set_field(COMMENT_FIELD, &brace_value(text));
    }
}

/// One top-level block of a `.bib` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BibItem {
    Entry(Entry),
    /// Free text, `@comment`, `@string` and `@preamble` blocks, written back verbatim.
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bibliography {
    encoding: Option<String>,
    items: Vec<BibItem>,
}

impl Bibliography {
    pub fn parse(text: &str) -> Result<Self, BibnoteError> {
        let mut items = parse_bibtex(text)?;
        let encoding = detach_encoding_line(&mut items);
        if encoding.is_none() {
            tracing::info!("Encoding line not found");
        }
        Ok(Bibliography { encoding, items })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BibnoteError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BibnoteError::missing_file(path));
        }
        tracing::debug!("Reading bibliography {:?}", path);
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn to_bibtex(&self) -> String {
        write_bibtex(self.encoding.as_deref(), &self.items)
    }

    /// Overwrites the whole file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BibnoteError> {
        tracing::debug!("Writing bibliography {:?}", path.as_ref());
        Ok(fs::write(path, self.to_bibtex())?)
    }

    pub fn encoding_line(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.items.iter().filter_map(|item| match item {
            BibItem::Entry(entry) => Some(entry),
            BibItem::Text(_) => None,
        })
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.items.iter_mut().filter_map(|item| match item {
            BibItem::Entry(entry) => Some(entry),
            BibItem::Text(_) => None,
        })
    }

    /// First entry with `key`. The store does not enforce key uniqueness.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries().find(|entry| entry.key() == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries_mut().find(|entry| entry.key() == key)
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

/// Pull the first `% Encoding:` line out of the free-text blocks.
fn detach_encoding_line(items: &mut Vec<BibItem>) -> Option<String> {
    for idx in 0..items.len() {
        let BibItem::Text(text) = &items[idx] else {
            continue;
        };
        let mut lines: Vec<&str> = text.lines().collect();
        let Some(pos) = lines
            .iter()
            .position(|line| line.trim_start().starts_with(ENCODING_MARKER))
        else {
            continue;
        };
        let encoding = lines.remove(pos).trim().to_string();
        let rest = lines.join("\n");
        if rest.trim().is_empty() {
            items.remove(idx);
        } else {
            items[idx] = BibItem::Text(rest.trim_matches('\n').to_string());
        }
        return Some(encoding);
    }
    None
}
