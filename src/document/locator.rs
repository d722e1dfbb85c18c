use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashSet, ops::Range};

use crate::codec::md::MdTree;

/// Heading level that opens a section.
pub const SECTION_HEADING_LEVEL: u8 = 3;

static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(\w+)").expect("citation regex is valid"));

/// Where a section sits in the tree it was located in. Only valid until the document is reparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionAnchor {
    /// Index of the heading node
    pub heading: usize,
    /// Index of the notes container node
    pub notes: usize,
    /// Heading line through the closing `:::` line
    pub lines: Range<usize>,
    /// Lines strictly between the notes container's fences
    pub notes_lines: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub key: String,
    pub title: String,
    pub notes: String,
    pub anchor: SectionAnchor,
}

/// First `@key` token in a paragraph.
pub fn citation_key(text: &str) -> Option<&str> {
    CITATION
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str())
}

/// Literal text of an ATX heading line, without the opening `#`s or an optional closing
/// sequence.
pub fn heading_title(line: &str) -> String {
    let text = line.trim().trim_start_matches('#').trim();
    let without_closing = text.trim_end_matches('#');
    if without_closing.is_empty() {
        String::new()
    } else if without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end().to_string()
    } else {
        text.to_string()
    }
}

/// Collect every `heading / citation paragraph / notes container` triple among the top-level
/// nodes, in document order.
///
/// Anything that does not match all three parts is not a section and is skipped without error.
/// When a key appears twice the first section wins.
pub fn locate_sections(tree: &MdTree, lines: &[String]) -> Vec<Section> {
    let nodes = tree.nodes();
    let mut sections: Vec<Section> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, window) in nodes.windows(3).enumerate() {
        let [heading, paragraph, notes] = window else {
            continue;
        };
        if heading.heading_level() != Some(SECTION_HEADING_LEVEL)
            || !paragraph.is_paragraph()
            || !notes.is_notes_container()
        {
            continue;
        }
        let paragraph_text = lines[paragraph.lines.clone()].join("\n");
        let Some(key) = citation_key(&paragraph_text) else {
            tracing::debug!(
                "Heading on line {} has no @key citation, not a section",
                heading.lines.start + 1
            );
            continue;
        };
        if !seen.insert(key.to_string()) {
            tracing::warn!(
                "Section '{}' on line {} repeats an earlier key and is ignored",
                key,
                heading.lines.start + 1
            );
            continue;
        }
        let Some(notes_lines) = notes.inner_lines() else {
            continue;
        };
        let notes_text = lines[notes_lines.clone()].join("\n").trim().to_string();
        sections.push(Section {
            key: key.to_string(),
            title: heading_title(&lines[heading.lines.start]),
            notes: notes_text,
            anchor: SectionAnchor {
                heading: idx,
                notes: idx + 2,
                lines: heading.lines.start..notes.lines.end,
                notes_lines,
            },
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::md::split_lines;
    use test_log::test;

    fn locate(text: &str) -> Vec<Section> {
        let lines = split_lines(text);
        locate_sections(&MdTree::from_lines(&lines), &lines)
    }

    #[test]
    fn test_heading_title_forms() {
        assert_eq!(heading_title("### Plain title"), "Plain title");
        assert_eq!(heading_title("### Closed ###"), "Closed");
        assert_eq!(heading_title("  ### C#"), "C#");
        assert_eq!(heading_title("###"), "");
    }

    #[test]
    fn test_citation_token() {
        assert_eq!(citation_key("<br>@smith2020"), Some("smith2020"));
        assert_eq!(citation_key("see [@doe_19; @x]"), Some("doe_19"));
        assert_eq!(citation_key("no token"), None);
    }

    #[test]
    fn test_locates_section_triple() {
        let text = "# Notes\n\n### A paper\n<br>@a1\n\n::: notes\n\nfirst\n\nsecond\n\n:::\n";
        let sections = locate(text);
        assert_eq!(sections.len(), 1);
        let section = &sections[0];
        assert_eq!(section.key, "a1");
        assert_eq!(section.title, "A paper");
        assert_eq!(section.notes, "first\n\nsecond");
        assert_eq!(section.anchor.lines, 2..12);
        assert_eq!(section.anchor.notes_lines, 6..11);
        assert_eq!((section.anchor.heading, section.anchor.notes), (1, 3));
    }

    #[test]
    fn test_malformed_triples_are_skipped() {
        let text = r#"## Wrong level
<br>@a

::: notes
a
:::

### No citation
just text

::: notes
b
:::

### Wrong container
<br>@c

::: callout
c
:::

### Missing container
<br>@d

### Good
<br>@e

::: {.notes}
e
:::
"#;
        let keys: Vec<String> = locate(text).into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["e".to_string()]);
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let text = "### One\n<br>@k\n\n::: notes\nfirst\n:::\n\n### Two\n<br>@k\n\n::: notes\nsecond\n:::\n";
        let sections = locate(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "One");
        assert_eq!(sections[0].notes, "first");
    }

    #[test]
    fn test_nested_triples_are_not_sections() {
        let text = "::: outer\n### Inner\n<br>@inner\n\n::: notes\nx\n:::\n:::\n";
        assert!(locate(text).is_empty());
    }
}
