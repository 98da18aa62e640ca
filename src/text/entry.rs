//! Status predicates over single entries.
//!
//! Entries carry a leading marker (`[ ]`, `[\]`, `[x]`, `[-]`, `[o]`). Anything
//! without a recognised marker is an annotation and counts as completed, so
//! [`is_completed`] and [`is_unfinished`] partition every entry.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Undone,
    InProgress,
    Done,
    Invalid,
    Scheduled,
    Other,
}

impl EntryStatus {
    pub fn marker(self) -> Option<&'static str> {
        match self {
            EntryStatus::Undone => Some("[ ]"),
            EntryStatus::InProgress => Some("[\\]"),
            EntryStatus::Done => Some("[x]"),
            EntryStatus::Invalid => Some("[-]"),
            EntryStatus::Scheduled => Some("[o]"),
            EntryStatus::Other => None,
        }
    }
}

pub fn classify(entry: &str) -> EntryStatus {
    let head = entry.trim_start();
    let Some(rest) = head.strip_prefix('[') else {
        return EntryStatus::Other;
    };
    match rest.get(..2) {
        Some(" ]") => EntryStatus::Undone,
        Some("\\]") => EntryStatus::InProgress,
        Some("x]") | Some("X]") => EntryStatus::Done,
        Some("-]") => EntryStatus::Invalid,
        Some("o]") | Some("O]") => EntryStatus::Scheduled,
        _ => EntryStatus::Other,
    }
}

pub fn is_undone(entry: &str) -> bool {
    classify(entry) == EntryStatus::Undone
}

pub fn is_in_progress(entry: &str) -> bool {
    classify(entry) == EntryStatus::InProgress
}

pub fn is_done(entry: &str) -> bool {
    classify(entry) == EntryStatus::Done
}

pub fn is_invalid(entry: &str) -> bool {
    classify(entry) == EntryStatus::Invalid
}

/// Scheduled and blocked tasks share the `[o]` marker; scheduled ones also
/// carry a `[$ ... $]` date expression.
pub fn is_scheduled(entry: &str) -> bool {
    classify(entry) == EntryStatus::Scheduled
}

pub fn is_unfinished(entry: &str) -> bool {
    is_undone(entry) || is_in_progress(entry)
}

pub fn is_completed(entry: &str) -> bool {
    !is_unfinished(entry)
}

pub fn is_blank(entry: &str) -> bool {
    entry.trim().is_empty()
}

/// Rewrites the entry's leading marker. Entries without a marker get one
/// prepended.
pub fn mark(entry: &str, status: EntryStatus) -> String {
    let Some(marker) = status.marker() else {
        return entry.to_string();
    };
    let indent = entry.len() - entry.trim_start().len();
    let (lead, body) = entry.split_at(indent);
    match classify(entry) {
        EntryStatus::Other => format!("{lead}{marker} {body}"),
        _ => format!("{lead}{marker}{}", &body[3..]),
    }
}
