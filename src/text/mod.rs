use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub mod entry;

pub use entry::EntryStatus;

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Z0-9']+s?(?: [A-Z][A-Z0-9']*s?)*:")
        .expect("valid section header regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("section {name:?} not found in document")]
    MissingSection { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Above,
    Below,
}

pub fn is_section_header(line: &str) -> bool {
    SECTION_HEADER.is_match(line)
}

/// Splits off the first entry: one top-level line plus any indented
/// continuation lines. Section headers never take continuations.
pub fn read_entry(doc: &str) -> (Option<&str>, &str) {
    if doc.is_empty() {
        return (None, doc);
    }
    let first_end = line_end(doc, 0);
    if is_section_header(&doc[..first_end]) {
        return (Some(&doc[..first_end]), &doc[first_end..]);
    }
    let mut end = first_end;
    while end < doc.len() {
        let next_end = line_end(doc, end);
        if !is_continuation(&doc[end..next_end]) {
            break;
        }
        end = next_end;
    }
    (Some(&doc[..end]), &doc[end..])
}

pub fn all_entries(doc: &str) -> Vec<&str> {
    get_entries(doc, |_| true)
}

pub fn get_entries<F>(doc: &str, predicate: F) -> Vec<&str>
where
    F: Fn(&str) -> bool,
{
    let mut entries = Vec::new();
    let mut rest = doc;
    while let (Some(entry), remainder) = read_entry(rest) {
        if predicate(entry) {
            entries.push(entry);
        }
        rest = remainder;
    }
    entries
}

pub fn partition_entries<'a, F>(entries: &[&'a str], predicate: F) -> (Vec<&'a str>, Vec<&'a str>)
where
    F: Fn(&str) -> bool,
{
    entries.iter().copied().partition(|entry| predicate(entry))
}

/// Returns the section body (without its trailing blank separator) and the
/// document with that body cut out.
pub fn read_section<'a>(doc: &'a str, name: &str) -> Result<(&'a str, String), LayoutError> {
    let span = locate_section(doc, name)?;
    let body = &doc[span.body_start..span.body_end];
    let mut complement = String::with_capacity(doc.len() - body.len());
    complement.push_str(&doc[..span.body_start]);
    complement.push_str(&doc[span.body_end..]);
    Ok((body, complement))
}

pub fn add_to_section(
    doc: &str,
    name: &str,
    text: &str,
    position: Position,
    ensure_separator: bool,
) -> Result<String, LayoutError> {
    let span = locate_section(doc, name)?;
    Ok(insert_into_span(doc, span, text, position, ensure_separator))
}

/// Inserts `text` after any preamble entries preceding the first section
/// header.
pub fn add_to_preamble(doc: &str, text: &str) -> String {
    insert_into_span(doc, locate_preamble(doc), text, Position::Below, false)
}

pub fn section_entries<'a>(doc: &'a str, name: &str) -> Result<Vec<&'a str>, LayoutError> {
    let (body, _) = read_section(doc, name)?;
    Ok(all_entries(body))
}

/// Replaces the first entry equal to `old`.
pub fn replace_entry(doc: &str, old: &str, new: &str) -> String {
    let mut out = String::with_capacity(doc.len() + new.len());
    let mut replaced = false;
    for entry in all_entries(doc) {
        if !replaced && entry == old {
            out.push_str(new);
            replaced = true;
        } else {
            out.push_str(entry);
        }
    }
    out
}

/// Drops every entry matching `predicate`, returning the remaining document
/// and the removed entries in order.
pub fn remove_entries<F>(doc: &str, predicate: F) -> (String, Vec<&str>)
where
    F: Fn(&str) -> bool,
{
    let mut kept = String::with_capacity(doc.len());
    let mut removed = Vec::new();
    for entry in all_entries(doc) {
        if !is_section_header(entry) && predicate(entry) {
            removed.push(entry);
        } else {
            kept.push_str(entry);
        }
    }
    (kept, removed)
}

#[derive(Debug, Clone, Copy)]
struct SectionSpan {
    header_end: usize,
    body_start: usize,
    body_end: usize,
}

fn locate_section(doc: &str, name: &str) -> Result<SectionSpan, LayoutError> {
    let wanted = name.trim().to_uppercase();
    let mut offset = 0;
    let mut rest = doc;
    while let (Some(entry), remainder) = read_entry(rest) {
        offset += entry.len();
        rest = remainder;
        if is_section_header(entry) && entry.to_uppercase().starts_with(&wanted) {
            return Ok(body_span(doc, offset));
        }
    }
    Err(LayoutError::MissingSection {
        name: name.to_string(),
    })
}

fn locate_preamble(doc: &str) -> SectionSpan {
    body_span(doc, 0)
}

fn body_span(doc: &str, header_end: usize) -> SectionSpan {
    let mut end = header_end;
    let mut last_entry: Option<(usize, &str)> = None;
    let mut rest = &doc[header_end..];
    while let (Some(entry), remainder) = read_entry(rest) {
        if is_section_header(entry) {
            break;
        }
        last_entry = Some((end, entry));
        end += entry.len();
        rest = remainder;
    }
    let body_end = match last_entry {
        Some((start, entry)) if self::entry::is_blank(entry) => start,
        _ => end,
    };
    SectionSpan {
        header_end,
        body_start: header_end,
        body_end,
    }
}

fn insert_into_span(
    doc: &str,
    span: SectionSpan,
    text: &str,
    position: Position,
    ensure_separator: bool,
) -> String {
    if text.is_empty() && !ensure_separator {
        return doc.to_string();
    }
    let at = if span.body_start == span.body_end {
        span.header_end
    } else {
        match position {
            Position::Above => span.body_start,
            Position::Below => span.body_end,
        }
    };

    let mut out = String::with_capacity(doc.len() + text.len() + 2);
    out.push_str(&doc[..at]);
    if !text.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }
    let tail = &doc[at..];
    let at_body_end = at == span.body_end || span.body_start == span.body_end;
    if ensure_separator && at_body_end && !starts_with_blank_line(tail) {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(tail);
    out
}

fn starts_with_blank_line(text: &str) -> bool {
    let line = &text[..line_end(text, 0)];
    !text.is_empty() && line.trim().is_empty()
}

fn line_end(doc: &str, start: usize) -> usize {
    doc[start..]
        .find('\n')
        .map(|idx| start + idx + 1)
        .unwrap_or(doc.len())
}

fn is_continuation(line: &str) -> bool {
    (line.starts_with(' ') || line.starts_with('\t')) && !line.trim().is_empty()
}
