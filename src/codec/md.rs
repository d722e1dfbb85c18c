use pulldown_cmark::{Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag as MdTag};
use std::ops::Range;

pub use pulldown_cmark;

/// Class name marking the per-entry notes container, e.g. `::: notes` or `::: {.notes}`.
pub const NOTES_CLASS: &str = "notes";

pub fn bibnote_md_options() -> Options {
    let mut md_options = Options::empty();
    // Enabled explicitly rather than through Options::all() so block boundaries stay reproducible
    // across pulldown-cmark releases.
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_MATH);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    md_options
}

/// Split document text into lines. `join_lines(&split_lines(text)) == text` for any input.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

pub fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Heading(u8),
    Paragraph,
    /// A fenced `:::` div. `closed` is false when the document ends before the closing fence.
    Container {
        info: String,
        closed: bool,
    },
    /// YAML front matter
    Metadata,
    Other,
}

/// A top-level block and the half-open range of source lines it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdNode {
    pub kind: NodeKind,
    pub lines: Range<usize>,
}

impl MdNode {
    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Heading(level) => Some(level),
            _ => None,
        }
    }

    pub fn is_paragraph(&self) -> bool {
        self.kind == NodeKind::Paragraph
    }

    pub fn is_notes_container(&self) -> bool {
        match &self.kind {
            NodeKind::Container { info, .. } => has_class(info, NOTES_CLASS),
            _ => false,
        }
    }

    /// Lines strictly between the opening and closing fence of a container.
    pub fn inner_lines(&self) -> Option<Range<usize>> {
        match &self.kind {
            NodeKind::Container { closed, .. } => {
                let end = if *closed {
                    self.lines.end - 1
                } else {
                    self.lines.end
                };
                Some(self.lines.start + 1..end.max(self.lines.start + 1))
            }
            _ => None,
        }
    }
}

/// The top-level block structure of a markdown document, in document order.
///
/// Only direct children of the document root are recorded. Pandoc-style `:::` divs are not
/// CommonMark, so they are found by a line scan first and the remaining text is handed to
/// pulldown-cmark with the div lines blanked out. Line numbers therefore always refer to the
/// original text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdTree {
    nodes: Vec<MdNode>,
}

impl MdTree {
    pub fn parse(text: &str) -> MdTree {
        let lines: Vec<&str> = text.split('\n').collect();
        let containers = scan_containers(&lines);

        let mut masked = lines.clone();
        for container in containers.iter() {
            for line in masked[container.lines.clone()].iter_mut() {
                *line = "";
            }
        }
        let starts = line_starts(&masked);
        let masked_text = masked.join("\n");

        let mut nodes = containers;
        let mut depth = 0usize;
        for (event, offset) in MdParser::new_ext(&masked_text, bibnote_md_options()).into_offset_iter()
        {
            match event {
                MdEvent::Start(tag) => {
                    if depth == 0 {
                        let kind = match tag {
                            MdTag::Heading { level, .. } => NodeKind::Heading(heading_number(level)),
                            MdTag::Paragraph => NodeKind::Paragraph,
                            MdTag::MetadataBlock(_) => NodeKind::Metadata,
                            _ => NodeKind::Other,
                        };
                        let lines = span_to_lines(&starts, &masked, offset);
                        nodes.push(MdNode { kind, lines });
                    }
                    depth += 1;
                }
                MdEvent::End(_) => depth = depth.saturating_sub(1),
                _ if depth == 0 => {
                    let lines = span_to_lines(&starts, &masked, offset);
                    nodes.push(MdNode {
                        kind: NodeKind::Other,
                        lines,
                    });
                }
                _ => {}
            }
        }
        nodes.sort_by_key(|node| node.lines.start);
        MdTree { nodes }
    }

    pub fn from_lines(lines: &[String]) -> MdTree {
        MdTree::parse(&join_lines(lines))
    }

    pub fn nodes(&self) -> &[MdNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the first node starting at or after `line`.
    pub fn node_index_at(&self, line: usize) -> usize {
        self.nodes.partition_point(|node| node.lines.start < line)
    }

    /// Mirror a splice of the line buffer: the lines in `replaced` were swapped for
    /// `inserted_len` new lines whose blocks are `replacement` (numbered from 0).
    ///
    /// Nodes inside `replaced` are dropped, nodes after it are shifted.
    pub fn splice(&mut self, replaced: Range<usize>, inserted_len: usize, replacement: MdTree) {
        let first = self.node_index_at(replaced.start);
        let last = self
            .nodes
            .partition_point(|node| node.lines.start < replaced.end)
            .max(first);
        let removed = replaced.end - replaced.start;

        for node in self.nodes[last..].iter_mut() {
            node.lines =
                node.lines.start - removed + inserted_len..node.lines.end - removed + inserted_len;
        }
        let shifted = replacement.nodes.into_iter().map(|node| MdNode {
            kind: node.kind,
            lines: node.lines.start + replaced.start..node.lines.end + replaced.start,
        });
        self.nodes.splice(first..last, shifted);
    }
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// `{.notes .other}` style attribute lists or a bare `notes` class word.
fn has_class(info: &str, class: &str) -> bool {
    match info.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        Some(attrs) => attrs
            .split_whitespace()
            .any(|attr| attr.strip_prefix('.') == Some(class)),
        None => info.split_whitespace().next() == Some(class),
    }
}

fn line_starts(lines: &[&str]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in lines {
        starts.push(offset);
        offset += line.len() + 1;
    }
    starts
}

fn line_of(starts: &[usize], offset: usize) -> usize {
    starts
        .partition_point(|start| *start <= offset)
        .saturating_sub(1)
}

/// Byte span to line span, dropping trailing blank lines some block spans swallow.
fn span_to_lines(starts: &[usize], lines: &[&str], span: Range<usize>) -> Range<usize> {
    let start = line_of(starts, span.start);
    let mut end = line_of(starts, span.end.saturating_sub(1).max(span.start)) + 1;
    while end > start + 1 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    start..end
}

fn indent_ok(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches(' ');
    (line.len() - trimmed.len() <= 3).then_some(trimmed)
}

/// Opening or closing code fence: (fence char, run length, info string).
fn code_fence(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = indent_ok(line)?;
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = trimmed.len() - trimmed.trim_start_matches(ch).len();
    (run >= 3).then(|| (ch, run, trimmed[run..].trim()))
}

/// `:::` fence line: (run length, info string). Trailing colons after the info are dropped.
fn colon_fence(line: &str) -> Option<(usize, &str)> {
    let trimmed = indent_ok(line)?;
    let run = trimmed.len() - trimmed.trim_start_matches(':').len();
    (run >= 3).then(|| {
        let info = trimmed[run..].trim().trim_end_matches(':').trim_end();
        (run, info)
    })
}

fn scan_containers(lines: &[&str]) -> Vec<MdNode> {
    let mut containers = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut open: Option<(usize, String)> = None;
    let mut depth = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        if let Some((fence_char, fence_len)) = fence {
            if let Some((ch, run, rest)) = code_fence(line) {
                if ch == fence_char && run >= fence_len && rest.is_empty() {
                    fence = None;
                }
            }
            continue;
        }
        if let Some((ch, run, _)) = code_fence(line) {
            fence = Some((ch, run));
            continue;
        }
        match colon_fence(line) {
            Some((_, info)) if !info.is_empty() => {
                if open.is_none() {
                    open = Some((idx, info.to_string()));
                }
                depth += 1;
            }
            Some(_) if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some((start, info)) = open.take() {
                        containers.push(MdNode {
                            kind: NodeKind::Container { info, closed: true },
                            lines: start..idx + 1,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((start, info)) = open {
        tracing::debug!("Container opened on line {} is never closed", start + 1);
        containers.push(MdNode {
            kind: NodeKind::Container {
                info,
                closed: false,
            },
            lines: start..lines.len(),
        });
    }
    containers
}
