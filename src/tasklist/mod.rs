use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use thiserror::Error;
use time::Date;

use crate::dateexpr::{self, DateExpr, DateExprError};
use crate::period::{Period, PeriodError};
use crate::text::entry::{self, EntryStatus};
use crate::text::{self, LayoutError, Position};

/// Tasklist sections in filing order, keyed by the period whose window they
/// hold relative to the reference date.
pub const SECTIONS: [(Period, &str); 6] = [
    (Period::Day, "TOMORROW"),
    (Period::Week, "THIS WEEK"),
    (Period::Month, "THIS MONTH"),
    (Period::Quarter, "THIS QUARTER"),
    (Period::Year, "THIS YEAR"),
    (Period::Eternity, "SOMEDAY"),
];

static DATE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\$(?P<expr>.*?)\$\]").expect("valid date marker regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("blocked task has no [$date$] marker: {entry:?}")]
    MissingDate { entry: String },
    #[error("task {entry:?} has an unusable date: {source}")]
    Date {
        entry: String,
        #[source]
        source: DateExprError,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Period(#[from] PeriodError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub entry: String,
    pub due: DateExpr,
}

impl ScheduledTask {
    pub fn from_entry(entry: &str, reference: Option<Date>) -> Result<Self, TaskError> {
        let expr = date_marker(entry).ok_or_else(|| TaskError::MissingDate {
            entry: entry.to_string(),
        })?;
        let due = dateexpr::parse(expr, reference).map_err(|source| TaskError::Date {
            entry: entry.to_string(),
            source,
        })?;
        Ok(Self {
            entry: with_newline(entry),
            due,
        })
    }

    /// The entry with its date marker rewritten in canonical form.
    pub fn standardized(&self) -> String {
        let marker = format!("[${}$]", self.due);
        DATE_MARKER
            .replace(&self.entry, NoExpand(&marker))
            .into_owned()
    }
}

pub fn section_for(period: Period) -> &'static str {
    SECTIONS
        .iter()
        .find(|(p, _)| *p == period)
        .map(|(_, name)| *name)
        .unwrap_or("SOMEDAY")
}

pub fn empty_tasklist() -> String {
    SECTIONS
        .iter()
        .map(|(_, name)| format!("{name}:\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn date_marker(entry: &str) -> Option<&str> {
    DATE_MARKER
        .captures(entry)
        .and_then(|caps| caps.name("expr"))
        .map(|m| m.as_str())
}

/// `[o]` entry carrying a due date. Blocked tasks share the marker but have
/// no date.
pub fn is_scheduled_task(entry: &str) -> bool {
    entry::is_scheduled(entry) && date_marker(entry).is_some()
}

pub fn standardize(entries: &[&str], reference: Date) -> Result<Vec<String>, TaskError> {
    entries
        .iter()
        .map(|entry| ScheduledTask::from_entry(entry, Some(reference)).map(|t| t.standardized()))
        .collect()
}

/// First tracked period whose window around `reference` still covers `due`.
pub fn bucket(due: Date, reference: Date) -> Result<Period, PeriodError> {
    for period in Period::TRACKED {
        if period.get_end_date(reference)? >= due {
            return Ok(period);
        }
    }
    Ok(Period::Eternity)
}

/// Files each entry, with its marker in canonical form, at the bottom of the
/// section its due date falls in.
pub fn place(tasklist: &str, entries: &[&str], reference: Date) -> Result<String, TaskError> {
    let mut tasks = entries
        .iter()
        .map(|entry| ScheduledTask::from_entry(entry, Some(reference)))
        .collect::<Result<Vec<_>, _>>()?;
    tasks.sort_by_key(|task| task.due.date);

    let mut seen: HashSet<String> = text::all_entries(tasklist)
        .into_iter()
        .map(with_newline)
        .collect();
    let mut buckets: Vec<(Period, String)> = SECTIONS
        .iter()
        .map(|(period, _)| (*period, String::new()))
        .collect();
    for task in tasks {
        let entry = task.standardized();
        if !seen.insert(entry.clone()) {
            tracing::debug!(entry = %entry.trim_end(), "task already on tasklist");
            continue;
        }
        let period = bucket(task.due.date, reference)?;
        tracing::debug!(entry = %entry.trim_end(), %period, "filing task");
        if let Some((_, pending)) = buckets.iter_mut().find(|(p, _)| *p == period) {
            pending.push_str(&entry);
        }
    }

    let mut doc = tasklist.to_string();
    for (period, pending) in buckets {
        if pending.is_empty() {
            continue;
        }
        doc = text::add_to_section(&doc, section_for(period), &pending, Position::Below, true)?;
    }
    Ok(doc)
}

/// Pulls every scheduled task out of whichever section holds it and files
/// it again against `to_date`.
pub fn advance(tasklist: &str, to_date: Date) -> Result<String, TaskError> {
    let (remaining, scheduled) = text::remove_entries(tasklist, is_scheduled_task);
    place(&remaining, &scheduled, to_date)
}

/// Removes the `TOMORROW` section's entries for the new day's agenda.
/// Scheduled tasks come back marked undone.
pub fn take_due(tasklist: &str) -> Result<(Vec<String>, String), TaskError> {
    let (body, rest) = text::read_section(tasklist, section_for(Period::Day))?;
    let due = text::all_entries(body)
        .into_iter()
        .filter(|e| !entry::is_blank(e))
        .map(|e| {
            let e = with_newline(e);
            if entry::is_scheduled(&e) {
                entry::mark(&e, EntryStatus::Undone)
            } else {
                e
            }
        })
        .collect();
    Ok((due, rest))
}

fn with_newline(entry: &str) -> String {
    if entry.ends_with('\n') {
        entry.to_string()
    } else {
        format!("{entry}\n")
    }
}
