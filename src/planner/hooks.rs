use std::collections::BTreeMap;

use time::Date;

use super::template::{self, LogSeed, LogTemplate};
use super::{AdvanceOutcome, CompletionChecking, LogHandle, PlannerError, PlannerState, Preferences};
use crate::period::Period;
use crate::storage::{self, Changeset, Store, TASKLIST};
use crate::tasklist::{self, ScheduledTask, TaskError};
use crate::text::{self, entry, LayoutError, Position};

const AGENDA: &str = "AGENDA";
const NOTES: &str = "NOTES";

type Hook = Result<Option<AdvanceOutcome>, PlannerError>;

/// Working copy of one run. Ended logs are edited in `logs`, new ones
/// collect in `begun`; nothing reaches the store until the caller commits
/// the changeset from [`Rollover::finish`].
pub(super) struct Rollover<'a> {
    prefs: &'a Preferences,
    store: &'a dyn Store,
    template: &'a dyn LogTemplate,
    from: Date,
    to: Date,
    logs: BTreeMap<Period, LogHandle>,
    begun: BTreeMap<Period, LogHandle>,
    tasklist: String,
    original_logs: BTreeMap<Period, String>,
    original_tasklist: String,
}

impl<'a> Rollover<'a> {
    pub(super) fn from_state(
        state: &PlannerState,
        prefs: &'a Preferences,
        store: &'a dyn Store,
        template: &'a dyn LogTemplate,
        to: Date,
    ) -> Self {
        Self {
            prefs,
            store,
            template,
            from: state.date,
            to,
            logs: state.logs.clone(),
            begun: BTreeMap::new(),
            tasklist: state.tasklist.clone(),
            original_logs: state
                .logs
                .iter()
                .map(|(period, log)| (*period, log.text.clone()))
                .collect(),
            original_tasklist: state.tasklist.clone(),
        }
    }

    /// Rollover into `date` with no current logs. An existing tasklist is
    /// kept.
    pub(super) fn empty(
        date: Date,
        prefs: &'a Preferences,
        store: &'a dyn Store,
        template: &'a dyn LogTemplate,
    ) -> Result<Self, PlannerError> {
        let existing = store.load_optional(TASKLIST)?;
        let tasklist = existing.clone().unwrap_or_else(tasklist::empty_tasklist);
        Ok(Self {
            prefs,
            store,
            template,
            from: date,
            to: date,
            logs: BTreeMap::new(),
            begun: BTreeMap::new(),
            tasklist,
            original_logs: BTreeMap::new(),
            original_tasklist: existing.unwrap_or_default(),
        })
    }

    pub(super) fn end(&mut self, period: Period) -> Hook {
        let log = self.current(period)?;
        if self.prefs.completion_checking == CompletionChecking::Strict {
            let (notes, _) = text::read_section(&log.text, NOTES).map_err(layout(&log.name))?;
            if notes.trim().is_empty() {
                return Ok(Some(AdvanceOutcome::NeedsLogCompletion {
                    period,
                    log: log.name.clone(),
                }));
            }
        }
        if period == Period::Day {
            if let Some(outcome) = self.schedule_tasks()? {
                return Ok(Some(outcome));
            }
        }
        self.cascade(period)?;
        tracing::debug!(%period, "ended log");
        Ok(None)
    }

    pub(super) fn begin(&mut self, period: Period) -> Hook {
        let name = storage::log_name(period, self.to)?;
        if self.store.exists(&name) {
            return Err(PlannerError::LogExists { name });
        }
        let agenda = if period == Period::Day {
            self.day_agenda()?
        } else {
            String::new()
        };
        if self.prefs.reviewed < period {
            return Ok(Some(AdvanceOutcome::NeedsAgendaReview { period, agenda }));
        }
        let theme = match (period, &self.prefs.week_theme) {
            (Period::Week, None) => return Ok(Some(AdvanceOutcome::NeedsTheme { period })),
            (Period::Week, Some(theme)) => Some(theme.clone()),
            _ => None,
        };
        self.render(period, name, agenda, theme)?;
        Ok(None)
    }

    /// First-run variant of [`Rollover::begin`]: no agenda, no review.
    pub(super) fn seed(&mut self, period: Period) -> Result<(), PlannerError> {
        let name = storage::log_name(period, self.to)?;
        if self.store.exists(&name) {
            return Err(PlannerError::LogExists { name });
        }
        let theme = (period == Period::Week)
            .then(|| self.prefs.week_theme.clone())
            .flatten();
        self.render(period, name, String::new(), theme)
    }

    /// Links the newest finer log from a period that keeps running.
    pub(super) fn continue_log(&mut self, period: Period) -> Result<(), PlannerError> {
        let finer = period.finer()?;
        let Some(new) = self.begun.get(&finer) else {
            return Ok(());
        };
        let link = storage::link(&new.name);
        let current = self.current(period)?;
        let text = text::add_to_preamble(&current.text, &link);
        tracing::debug!(%period, log = %current.name, "continuing log");
        self.set_text(period, text);
        Ok(())
    }

    pub(super) fn finish(self) -> (PlannerState, Changeset) {
        let mut changes = Changeset::default();
        for (period, log) in &self.logs {
            if self.original_logs.get(period) != Some(&log.text) {
                changes.write(&log.name, &log.text);
            }
        }
        for log in self.begun.values() {
            changes.write(&log.name, &log.text);
        }
        if self.tasklist != self.original_tasklist {
            changes.write(TASKLIST, &self.tasklist);
        }

        let mut logs = self.logs;
        logs.extend(self.begun);
        let state = PlannerState {
            date: self.to,
            logs,
            tasklist: self.tasklist,
        };
        (state, changes)
    }

    /// Standardizes the ended day's scheduled entries in place and files
    /// them on the tasklist.
    fn schedule_tasks(&mut self) -> Hook {
        let day = self.current(Period::Day)?;
        let (agenda, _) = text::read_section(&day.text, AGENDA).map_err(layout(&day.name))?;
        let mut replacements = Vec::new();
        for raw in text::get_entries(agenda, entry::is_scheduled) {
            let task = match ScheduledTask::from_entry(raw, Some(self.from)) {
                Ok(task) => task,
                Err(TaskError::MissingDate { entry }) => {
                    return Ok(Some(AdvanceOutcome::BlockedWithoutDate { entry }))
                }
                Err(err) => return Err(task_error(&day.name, err)),
            };
            if task.due.date <= self.from {
                return Ok(Some(AdvanceOutcome::ScheduledInPast {
                    entry: task.entry,
                    due: task.due.date,
                }));
            }
            replacements.push((raw.to_string(), task.standardized()));
        }
        if replacements.is_empty() {
            return Ok(None);
        }

        let mut updated = day.text.clone();
        for (old, new) in &replacements {
            updated = text::replace_entry(&updated, old, new);
        }
        let standardized: Vec<&str> = replacements.iter().map(|(_, new)| new.as_str()).collect();
        self.tasklist = tasklist::place(&self.tasklist, &standardized, self.from)
            .map_err(|err| task_error(TASKLIST, err))?;
        self.set_text(Period::Day, updated);
        tracing::info!(count = replacements.len(), "filed scheduled tasks on tasklist");
        Ok(None)
    }

    /// Completed entries of the ended period, plus the unfinished ones of
    /// the finer log ended just before, move into the coarser agenda.
    fn cascade(&mut self, period: Period) -> Result<(), PlannerError> {
        let coarser = match period.coarser() {
            Ok(coarser) if coarser.is_tracked() => coarser,
            _ => return Ok(()),
        };
        let ended = self.current(period)?;
        let mut carried =
            agenda_entries(ended, |e| entry::is_completed(e) && !entry::is_blank(e))?.concat();
        if period > Period::Day {
            let finer = self.current(period.finer()?)?;
            carried.push_str(&agenda_entries(finer, entry::is_unfinished)?.concat());
        }
        if carried.is_empty() {
            return Ok(());
        }
        let target = self.current(coarser)?;
        let text = text::add_to_section(&target.text, AGENDA, &carried, Position::Below, false)
            .map_err(layout(&target.name))?;
        self.set_text(coarser, text);
        Ok(())
    }

    /// Tasks due on the new day, then whatever the ended day left unfinished.
    fn day_agenda(&mut self) -> Result<String, PlannerError> {
        let advanced = tasklist::advance(&self.tasklist, self.to)
            .map_err(|err| task_error(TASKLIST, err))?;
        let (due, rest) =
            tasklist::take_due(&advanced).map_err(|err| task_error(TASKLIST, err))?;
        self.tasklist = rest;

        let carried = agenda_entries(self.current(Period::Day)?, entry::is_unfinished)?;
        let mut agenda = due.concat();
        for pending in carried {
            if !due.contains(&pending) {
                agenda.push_str(&pending);
            }
        }
        Ok(agenda)
    }

    fn render(
        &mut self,
        period: Period,
        name: String,
        agenda: String,
        theme: Option<String>,
    ) -> Result<(), PlannerError> {
        let start = period.get_start_date(self.to)?;
        let links = period
            .finer()
            .ok()
            .and_then(|finer| self.begun.get(&finer))
            .map(|log| vec![storage::link(&log.name)])
            .unwrap_or_default();
        let checkpoint_name = template::checkpoint_source(period, start, self.prefs.schedule);
        let checkpoints = self.source(&checkpoint_name)?;
        let periodic = self.source(&template::periodic_source(period))?;
        let seed = LogSeed {
            period,
            date: start,
            title: name.clone(),
            links,
            theme,
            checkpoints,
            agenda,
            periodic,
        };
        let text = self.template.render(&seed, self.prefs);
        tracing::info!(%period, log = %name, "began log");
        self.begun.insert(period, LogHandle { name, text });
        Ok(())
    }

    fn source(&self, name: &str) -> Result<String, PlannerError> {
        Ok(self.store.load_optional(name)?.unwrap_or_default())
    }

    fn current(&self, period: Period) -> Result<&LogHandle, PlannerError> {
        self.logs
            .get(&period)
            .ok_or(PlannerError::MissingLog { period })
    }

    fn set_text(&mut self, period: Period, text: String) {
        if let Some(log) = self.logs.get_mut(&period) {
            log.text = text;
        }
    }
}

fn agenda_entries<F>(log: &LogHandle, predicate: F) -> Result<Vec<String>, PlannerError>
where
    F: Fn(&str) -> bool,
{
    let (agenda, _) = text::read_section(&log.text, AGENDA).map_err(layout(&log.name))?;
    Ok(text::get_entries(agenda, predicate)
        .into_iter()
        .map(str::to_string)
        .collect())
}

fn layout(name: &str) -> impl FnOnce(LayoutError) -> PlannerError + '_ {
    move |source| PlannerError::Layout {
        name: name.to_string(),
        source,
    }
}

fn task_error(name: &str, err: TaskError) -> PlannerError {
    match err {
        TaskError::Layout(source) => PlannerError::Layout {
            name: name.to_string(),
            source,
        },
        TaskError::Period(err) => PlannerError::Period(err),
        source => PlannerError::Task {
            name: name.to_string(),
            source,
        },
    }
}
