//! BibTeX reader and writer.
//!
//! The reader splits a `.bib` file into [`BibItem`]s: entries (`@Type{KEY, name = value, ...}`)
//! and verbatim text (free-form comment lines plus `@comment`, `@string` and `@preamble`
//! blocks). Field values are kept as raw source text (`{...}`, `"..."`, bare tokens and `#`
//! concatenations) so that fields this crate does not interpret survive a rewrite unchanged.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{opt, recognize},
    error::{VerboseError, VerboseErrorKind},
    multi::{many0, separated_list1},
    sequence::{preceded, tuple},
    IResult,
};

use crate::{
    entry::{BibItem, Entry},
    error::BibnoteError,
};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parse BibTeX source text into items, in source order.
pub fn parse_bibtex(input: &str) -> Result<Vec<BibItem>, BibnoteError> {
    let mut items = Vec::new();
    let mut rest = input;
    loop {
        let (text, block) = split_at_block_start(rest);
        push_text(&mut items, text);
        let Some(block) = block else {
            break;
        };
        let (after, item) = bib_block(block).map_err(|e| to_parse_error(input, e))?;
        items.push(item);
        rest = after;
    }
    Ok(items)
}

/// Render items back to BibTeX. `encoding` is written as the first line when present.
pub fn write_bibtex(encoding: Option<&str>, items: &[BibItem]) -> String {
    let mut out = String::new();
    if let Some(line) = encoding {
        out.push_str(line);
        out.push_str("\n\n");
    }
    let blocks: Vec<String> = items
        .iter()
        .map(|item| match item {
            BibItem::Entry(entry) => write_entry(entry),
            BibItem::Text(text) => text.clone(),
        })
        .collect();
    out.push_str(&blocks.join("\n\n"));
    out.push('\n');
    out
}

fn write_entry(entry: &Entry) -> String {
    let mut out = format!("@{}{{{}", entry.entry_type(), entry.key());
    for (name, value) in entry.fields() {
        out.push_str(",\n  ");
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(value);
    }
    out.push_str("\n}");
    out
}

/// Wrap free text as a braced field value that [`parse_bibtex`] reads back.
///
/// Unbalanced braces are escaped. A trailing lone backslash would escape the closing brace, so
/// it is followed by a space.
pub fn brace_value(text: &str) -> String {
    let (balanced, dangling) = scan_braces(text);
    let mut body = if balanced {
        text.to_string()
    } else {
        tracing::warn!("Unbalanced braces in field value, escaping them");
        escape_braces(text)
    };
    if dangling {
        body.push(' ');
    }
    format!("{{{body}}}")
}

/// Strip one level of `{}` or `""` delimiters when they enclose the whole value.
pub fn unwrap_value(raw: &str) -> &str {
    let raw = raw.trim();
    let piece = match raw.chars().next() {
        Some('{') => balanced(raw, '{', '}'),
        Some('"') => quoted(raw),
        _ => return raw,
    };
    match piece {
        Ok(("", whole)) if whole.len() >= 2 => &whole[1..whole.len() - 1],
        _ => raw,
    }
}

/// Brace depth under the reader's escape rule: (balanced, ends on a lone backslash).
fn scan_braces(text: &str) -> (bool, bool) {
    let mut depth: i64 = 0;
    let mut underflow = false;
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                underflow |= depth < 0;
            }
            _ => {}
        }
    }
    (!underflow && depth == 0, escaped)
}

/// Escape every brace not already escaped.
fn escape_braces(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' | '}' => out.push('\\'),
            _ => {}
        }
        out.push(c);
    }
    out
}

/* ------------------------------- Utils ------------------------------- */

/// Split off the text before the first line whose first non-blank character is `@`.
fn split_at_block_start(s: &str) -> (&str, Option<&str>) {
    let mut pos = 0;
    while pos < s.len() {
        let line_end = s[pos..].find('\n').map(|i| pos + i).unwrap_or(s.len());
        let line = &s[pos..line_end];
        let trimmed = line.trim_start();
        if trimmed.starts_with('@') {
            let at = pos + (line.len() - trimmed.len());
            return (&s[..pos], Some(&s[at..]));
        }
        pos = line_end + 1;
    }
    (s, None)
}

fn push_text(items: &mut Vec<BibItem>, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let text = text.trim_matches(|c| c == '\n' || c == '\r');
    items.push(BibItem::Text(text.trim_end().to_string()));
}

fn to_parse_error(input: &str, e: nom::Err<VerboseError<&str>>) -> BibnoteError {
    match e {
        nom::Err::Error(ve) | nom::Err::Failure(ve) => {
            let (frag, kind) = ve
                .errors
                .first()
                .map(|(frag, kind)| (*frag, format!("{kind:?}")))
                .unwrap_or(("", "unknown".to_string()));
            let offset = input.len() - frag.len();
            let line = input[..offset].matches('\n').count() + 1;
            let show = frag.get(0..frag.find('\n').unwrap_or(frag.len())).unwrap_or(frag);
            BibnoteError::Parse(format!("line {line}: {kind} at {show:?}"))
        }
        nom::Err::Incomplete(_) => BibnoteError::Parse("incomplete input".to_string()),
    }
}

fn context_error<'a, T>(i: &'a str, ctx: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(i, VerboseErrorKind::Context(ctx))],
    }))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.' | '+' | '/')
}

/* ------------------------------ Grammar ------------------------------ */

fn bib_block(block: &str) -> PResult<'_, BibItem> {
    let (i, _) = char('@')(block)?;
    let (i, entry_type) = preceded(multispace0, take_while1(is_ident_char))(i)?;
    let (i, _) = multispace0(i)?;
    match entry_type.to_ascii_lowercase().as_str() {
        "comment" | "string" | "preamble" => {
            let (rest, _) = alt((|i| balanced(i, '{', '}'), |i| balanced(i, '(', ')')))(i)?;
            let raw = &block[..block.len() - rest.len()];
            Ok((rest, BibItem::Text(raw.to_string())))
        }
        _ => {
            let (rest, entry) = entry_body(entry_type, i)?;
            Ok((rest, BibItem::Entry(entry)))
        }
    }
}

fn entry_body<'a>(entry_type: &str, i: &'a str) -> PResult<'a, Entry> {
    let (i, open) = alt((char('{'), char('(')))(i)?;
    let close = if open == '{' { '}' } else { ')' };
    let (i, key) = preceded(
        multispace0,
        take_while1(|c: char| c != ',' && c != close && !c.is_whitespace()),
    )(i)?;
    let (i, _) = multispace0(i)?;
    let (i, fields) = many0(preceded(tuple((char(','), multispace0)), field))(i)?;
    let (i, _) = tuple((opt(char(',')), multispace0))(i)?;
    let (i, _) = match char::<&str, VerboseError<&str>>(close)(i) {
        Ok(ok) => ok,
        Err(_) => {
            // report the field that stopped the list, not the entry
            if let Err(e) = field(i) {
                return Err(e);
            }
            return context_error(i, "expected ',' or end of entry");
        }
    };

    let mut entry = Entry::new(entry_type, key);
    for (name, value) in fields {
        entry.set_field(name, value);
    }
    Ok((i, entry))
}

fn field(i: &str) -> PResult<'_, (&str, &str)> {
    let (i, name) = take_while1(is_ident_char)(i)?;
    let (i, _) = tuple((multispace0, char('='), multispace0))(i)?;
    let (i, value) = field_value(i)?;
    let (i, _) = multispace0(i)?;
    Ok((i, (name, value)))
}

fn field_value(i: &str) -> PResult<'_, &str> {
    recognize(separated_list1(
        tuple((multispace0, char('#'), multispace0)),
        value_piece,
    ))(i)
}

fn value_piece(i: &str) -> PResult<'_, &str> {
    alt((
        |i| balanced(i, '{', '}'),
        quoted,
        take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '+' | '/')),
    ))(i)
}

/// Delimited run with nesting. Backslash-escaped delimiters do not count.
fn balanced(i: &str, open: char, close: char) -> PResult<'_, &str> {
    let (_, _) = char(open)(i)?;
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, c) in i.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = idx + c.len_utf8();
                return Ok((&i[end..], &i[..end]));
            }
        }
    }
    context_error(i, "unbalanced delimiters")
}

/// `"..."` value; quotes inside braces do not terminate it.
fn quoted(i: &str) -> PResult<'_, &str> {
    let (_, _) = char('"')(i)?;
    let mut depth = 0usize;
    for (idx, c) in i.char_indices().skip(1) {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 => return Ok((&i[idx + 1..], &i[..idx + 1])),
            _ => {}
        }
    }
    context_error(i, "unterminated quoted value")
}
