//! Period rollover: ends every log whose period has run out, begins its
//! successor and keeps the coarser logs linked to the new ones.
//!
//! [`advance`] never writes anything. It returns either the next state with
//! the [`Changeset`] that produces it, or an [`AdvanceOutcome`] describing what
//! the user has to do before the planner can move on.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, PrimitiveDateTime};

use crate::period::{Period, PeriodError};
use crate::storage::{self, Changeset, StateRecord, Store, TASKLIST};
use crate::tasklist::TaskError;
use crate::text::LayoutError;

mod hooks;
pub mod template;

use hooks::Rollover;
pub use template::{LogSeed, LogTemplate, PlainTemplate};

/// Which checkpoint list a day log starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduleVariant {
    /// Weekend days use `Checkpoints_Weekend`.
    #[default]
    Standard,
    Uniform,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionChecking {
    /// A log cannot end while its `NOTES` section is empty.
    #[default]
    Strict,
    Relaxed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHandle {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerState {
    pub date: Date,
    pub logs: BTreeMap<Period, LogHandle>,
    pub tasklist: String,
}

impl PlannerState {
    pub fn load(record: &StateRecord, store: &dyn Store) -> anyhow::Result<Self> {
        let logs = record
            .logs
            .iter()
            .map(|(period, name)| {
                let text = store
                    .load(name)
                    .with_context(|| format!("loading current {period} log"))?;
                Ok((*period, LogHandle { name: name.clone(), text }))
            })
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
        let tasklist = store.load(TASKLIST).context("loading tasklist")?;
        Ok(Self {
            date: record.date,
            logs,
            tasklist,
        })
    }

    pub fn record(&self) -> StateRecord {
        StateRecord {
            date: self.date,
            logs: self
                .logs
                .iter()
                .map(|(period, log)| (*period, log.name.clone()))
                .collect(),
        }
    }

    pub fn log(&self, period: Period) -> Option<&LogHandle> {
        self.logs.get(&period)
    }
}

/// Everything that shapes a run apart from the planner state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub bullet: char,
    pub schedule: ScheduleVariant,
    pub completion_checking: CompletionChecking,
    pub evening_hour: u8,
    pub week_theme: Option<String>,
    /// Coarsest period whose pending agenda the user has already reviewed.
    pub reviewed: Period,
    pub jump: Option<Date>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bullet: '*',
            schedule: ScheduleVariant::Standard,
            completion_checking: CompletionChecking::Strict,
            evening_hour: 18,
            week_theme: None,
            reviewed: Period::Zero,
            jump: None,
        }
    }
}

/// Result of a successful run. Only `Advanced` carries changes; every other
/// variant asks for user action and leaves the store as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced {
        period: Period,
        state: PlannerState,
        changes: Changeset,
    },
    DayInProgress {
        next_day: Date,
    },
    NeedsLogCompletion {
        period: Period,
        log: String,
    },
    NeedsAgendaReview {
        period: Period,
        agenda: String,
    },
    NeedsTheme {
        period: Period,
    },
    BlockedWithoutDate {
        entry: String,
    },
    ScheduledInPast {
        entry: String,
        due: Date,
    },
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("cannot advance to {target}: tracked {tracked}, today is only {today}")]
    Future {
        tracked: Date,
        target: Date,
        today: Date,
    },
    #[error("jump target {target} does not come after tracked date {tracked}")]
    InvalidJump { target: Date, tracked: Date },
    #[error("document {name:?} is malformed")]
    Layout {
        name: String,
        #[source]
        source: LayoutError,
    },
    #[error("document {name:?} has an unusable task")]
    Task {
        name: String,
        #[source]
        source: TaskError,
    },
    #[error("log {name:?} already exists")]
    LogExists { name: String },
    #[error("no current {period} log")]
    MissingLog { period: Period },
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Moves the planner one day forward, or to `prefs.jump`, ending and
/// beginning every period the move crosses.
pub fn advance(
    state: &PlannerState,
    prefs: &Preferences,
    now: PrimitiveDateTime,
    store: &dyn Store,
    template: &dyn LogTemplate,
) -> Result<AdvanceOutcome, PlannerError> {
    let target = match prefs.jump {
        Some(target) if target <= state.date => {
            return Err(PlannerError::InvalidJump {
                target,
                tracked: state.date,
            })
        }
        Some(target) => target,
        None => state
            .date
            .next_day()
            .ok_or(PeriodError::DateRange { date: state.date })?,
    };

    let today = now.date();
    if target > today {
        let tomorrow = today
            .next_day()
            .ok_or(PeriodError::DateRange { date: today })?;
        if target > tomorrow {
            return Err(PlannerError::Future {
                tracked: state.date,
                target,
                today,
            });
        }
        if now.hour() < prefs.evening_hour {
            tracing::debug!(
                hour = now.hour(),
                evening_hour = prefs.evening_hour,
                "day still in progress"
            );
            return Ok(AdvanceOutcome::DayInProgress { next_day: target });
        }
    }

    let crossed = crossed_period(target, prefs.jump.is_some(), store)?;
    tracing::info!(from = %state.date, to = %target, %crossed, "advancing planner");

    let mut rollover = Rollover::from_state(state, prefs, store, template, target);
    for period in Period::TRACKED.into_iter().filter(|p| *p <= crossed) {
        if let Some(outcome) = rollover.end(period)? {
            return Ok(outcome);
        }
        if let Some(outcome) = rollover.begin(period)? {
            return Ok(outcome);
        }
    }
    if let Ok(coarser) = crossed.coarser() {
        if coarser.is_tracked() {
            rollover.continue_log(coarser)?;
        }
    }
    let (state, changes) = rollover.finish();
    Ok(AdvanceOutcome::Advanced {
        period: crossed,
        state,
        changes,
    })
}

/// Fresh logs for every tracked period around `date`, for a first run.
pub fn bootstrap(
    date: Date,
    prefs: &Preferences,
    store: &dyn Store,
    template: &dyn LogTemplate,
) -> Result<(PlannerState, Changeset), PlannerError> {
    let mut rollover = Rollover::empty(date, prefs, store, template)?;
    for period in Period::TRACKED {
        rollover.seed(period)?;
    }
    Ok(rollover.finish())
}

/// Coarsest period ended by moving to `to`. Jumps also cross any period
/// whose log at the target has not been created yet.
fn crossed_period(to: Date, jumped: bool, store: &dyn Store) -> Result<Period, PlannerError> {
    let crosses = |period: Period| -> Result<bool, PlannerError> {
        if period.is_start_of_period(to) {
            return Ok(true);
        }
        Ok(jumped && !store.exists(&storage::log_name(period, to)?))
    };
    let month = crosses(Period::Month)?;
    let quarter = month && crosses(Period::Quarter)?;
    let year = quarter && crosses(Period::Year)?;
    let week = month || crosses(Period::Week)?;
    Ok(if year {
        Period::Year
    } else if quarter {
        Period::Quarter
    } else if month {
        Period::Month
    } else if week {
        Period::Week
    } else {
        Period::Day
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{log_name, MemoryStore};
    use crate::tasklist;
    use crate::text;
    use assert_matches::assert_matches;
    use time::macros::{date, time};

    fn log_text(agenda: &str, notes: &str) -> String {
        format!(
            "= LOG =\n\nCHECKPOINTS:\n\nAGENDA:\n{agenda}\nDAILYs:\n\n\
             NOTES:\n{notes}\nTIME SPENT ON PLANNER:\n"
        )
    }

    fn fixture(date: Date, agenda: &str) -> anyhow::Result<(PlannerState, MemoryStore)> {
        let mut store = MemoryStore::new()
            .with("Checkpoints_Weekday", "[ ] WORK\n")
            .with("Checkpoints_Weekend", "[ ] SLEEP IN\n")
            .with("Periodic_Day", "exercise\n");
        let mut logs = BTreeMap::new();
        for period in Period::TRACKED {
            let name = log_name(period, date)?;
            let text = log_text(if period == Period::Day { agenda } else { "" }, "done\n");
            store.save(&name, &text)?;
            logs.insert(period, LogHandle { name, text });
        }
        let tasklist = tasklist::empty_tasklist();
        store.save(TASKLIST, &tasklist)?;
        Ok((PlannerState { date, logs, tasklist }, store))
    }

    fn prefs() -> Preferences {
        Preferences {
            reviewed: Period::Year,
            week_theme: Some("focus".into()),
            ..Preferences::default()
        }
    }

    fn evening(date: Date) -> PrimitiveDateTime {
        PrimitiveDateTime::new(date, time!(19:00))
    }

    fn run(
        state: &PlannerState,
        prefs: &Preferences,
        now: PrimitiveDateTime,
        store: &MemoryStore,
    ) -> Result<AdvanceOutcome, PlannerError> {
        advance(state, prefs, now, store, &PlainTemplate)
    }

    fn advanced(outcome: AdvanceOutcome) -> (Period, PlannerState, Changeset) {
        match outcome {
            AdvanceOutcome::Advanced { period, state, changes } => (period, state, changes),
            other => panic!("expected the planner to advance, got {other:?}"),
        }
    }

    fn agenda(doc: &str) -> Vec<&str> {
        text::section_entries(doc, "AGENDA").expect("agenda present")
    }

    #[test]
    fn midweek_evening_crosses_only_the_day() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) =
            fixture(day, "[x] paid rent\n[ ] call bank\n[o] dentist [$tomorrow$]\n")?;
        let (period, next, changes) = advanced(run(&state, &prefs(), evening(day), &store)?);

        assert_eq!(period, Period::Day);
        assert_eq!(next.date, date!(2012 - 12 - 06));
        let new_day = next.log(Period::Day).expect("day log");
        assert_eq!(new_day.name, "December 6, 2012");
        assert_eq!(
            agenda(&new_day.text),
            vec!["[ ] dentist [$DECEMBER 6, 2012$]\n", "[ ] call bank\n"]
        );
        assert!(new_day.text.contains("[ ] WORK\n"));
        assert!(new_day.text.contains("* exercise\n"));

        let old_day = changes.get("December 5, 2012").expect("ended day rewritten");
        assert!(old_day.contains("[o] dentist [$DECEMBER 6, 2012$]\n"));

        let week = changes.get("Week of December 1, 2012").expect("week updated");
        assert_eq!(
            agenda(week),
            vec!["[x] paid rent\n", "[o] dentist [$DECEMBER 6, 2012$]\n"]
        );
        assert!(week.starts_with("= LOG =\n[[December 6, 2012]]\n"));
        assert_eq!(changes.get("Month of December, 2012"), None);
        assert_eq!(next.log(Period::Week), Some(&LogHandle {
            name: "Week of December 1, 2012".into(),
            text: week.to_string(),
        }));
        Ok(())
    }

    #[test]
    fn saturday_rolls_over_the_week() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 08);
        let (state, store) = fixture(day, "[ ] call bank\n")?;
        let (period, next, changes) = advanced(run(&state, &prefs(), evening(day), &store)?);

        assert_eq!(period, Period::Week);
        let week = next.log(Period::Week).expect("week log");
        assert_eq!(week.name, "Week of December 9, 2012");
        assert!(week.text.contains("[[December 9, 2012]]\n"));
        assert!(week.text.contains("Theme: focus\n"));

        let sunday = next.log(Period::Day).expect("day log");
        assert!(sunday.text.contains("[ ] SLEEP IN\n"));

        let month = changes.get("Month of December, 2012").expect("month updated");
        assert!(month.contains("[[Week of December 9, 2012]]\n"));
        assert_eq!(agenda(month), vec!["[ ] call bank\n"]);
        assert_eq!(
            next.log(Period::Month).map(|l| l.name.as_str()),
            Some("Month of December, 2012")
        );
        Ok(())
    }

    #[test]
    fn end_of_november_rolls_over_the_month() -> anyhow::Result<()> {
        let day = date!(2012 - 11 - 30);
        let (state, store) = fixture(day, "")?;
        let (period, next, changes) = advanced(run(&state, &prefs(), evening(day), &store)?);

        assert_eq!(period, Period::Month);
        let names: Vec<_> = Period::TRACKED
            .iter()
            .filter_map(|p| next.log(*p).map(|l| l.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                "December 1, 2012",
                "Week of December 1, 2012",
                "Month of December, 2012",
                "Q4 2012",
                "2012"
            ]
        );
        let quarter = changes.get("Q4 2012").expect("quarter linked");
        assert!(quarter.contains("[[Month of December, 2012]]\n"));
        Ok(())
    }

    #[test]
    fn quarter_boundary_continues_the_year() -> anyhow::Result<()> {
        let day = date!(2013 - 03 - 31);
        let (state, store) = fixture(day, "")?;
        let (period, next, changes) = advanced(run(&state, &prefs(), evening(day), &store)?);

        assert_eq!(period, Period::Quarter);
        let names: Vec<_> = Period::TRACKED
            .iter()
            .filter_map(|p| next.log(*p).map(|l| l.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                "April 1, 2013",
                "Week of April 1, 2013",
                "Month of April, 2013",
                "Q2 2013",
                "2013"
            ]
        );
        let year = changes.get("2013").expect("year continued");
        assert!(year.contains("[[Q2 2013]]\n"));
        let quarter = changes.get("Q2 2013").expect("new quarter log");
        assert!(quarter.contains("[[Month of April, 2013]]\n"));
        assert_eq!(changes.get("Q1 2013"), None);
        Ok(())
    }

    #[test]
    fn new_year_rolls_over_everything() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 31);
        let (state, store) = fixture(day, "")?;
        let (period, next, changes) = advanced(run(&state, &prefs(), evening(day), &store)?);

        assert_eq!(period, Period::Year);
        assert_eq!(next.log(Period::Year).map(|l| l.name.as_str()), Some("2013"));
        let year = changes.get("2013").expect("new year log");
        assert!(year.contains("[[Q1 2013]]\n"));
        assert!(changes.get("Q1 2013").is_some_and(|q| q.contains("[[Month of January, 2013]]\n")));
        assert_eq!(next.record().logs.len(), 5);
        Ok(())
    }

    #[test]
    fn catching_up_ignores_the_clock() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 03);
        let (state, store) = fixture(day, "")?;
        let morning = PrimitiveDateTime::new(date!(2012 - 12 - 05), time!(8:00));
        let (_, next, _) = advanced(run(&state, &prefs(), morning, &store)?);
        assert_eq!(next.date, date!(2012 - 12 - 04));
        Ok(())
    }

    #[test]
    fn today_is_not_over_before_evening() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) = fixture(day, "")?;
        let morning = PrimitiveDateTime::new(day, time!(10:30));
        assert_matches!(
            run(&state, &prefs(), morning, &store)?,
            AdvanceOutcome::DayInProgress { next_day } if next_day == date!(2012 - 12 - 06)
        );
        Ok(())
    }

    #[test]
    fn tracked_date_ahead_of_today_is_fatal() -> anyhow::Result<()> {
        let (state, store) = fixture(date!(2012 - 12 - 07), "")?;
        assert_matches!(
            run(&state, &prefs(), evening(date!(2012 - 12 - 05)), &store),
            Err(PlannerError::Future { .. })
        );
        Ok(())
    }

    #[test]
    fn jump_past_tomorrow_is_fatal() -> anyhow::Result<()> {
        let (state, store) = fixture(date!(2012 - 12 - 05), "")?;
        let jump = Preferences {
            jump: Some(date!(2012 - 12 - 20)),
            ..prefs()
        };
        assert_matches!(
            run(&state, &jump, evening(date!(2012 - 12 - 10)), &store),
            Err(PlannerError::Future { tracked, target, today })
                if tracked == date!(2012 - 12 - 05)
                    && target == date!(2012 - 12 - 20)
                    && today == date!(2012 - 12 - 10)
        );
        Ok(())
    }

    #[test]
    fn empty_notes_block_the_rollover() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (mut state, store) = fixture(day, "")?;
        if let Some(log) = state.logs.get_mut(&Period::Day) {
            log.text = log_text("", "");
        }
        assert_matches!(
            run(&state, &prefs(), evening(day), &store)?,
            AdvanceOutcome::NeedsLogCompletion { period: Period::Day, log }
                if log == "December 5, 2012"
        );

        let relaxed = Preferences {
            completion_checking: CompletionChecking::Relaxed,
            ..prefs()
        };
        assert_matches!(
            run(&state, &relaxed, evening(day), &store)?,
            AdvanceOutcome::Advanced { .. }
        );
        Ok(())
    }

    #[test]
    fn unreviewed_agenda_is_returned_for_review() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) = fixture(day, "[ ] call bank\n")?;
        let unreviewed = Preferences {
            reviewed: Period::Zero,
            ..prefs()
        };
        assert_matches!(
            run(&state, &unreviewed, evening(day), &store)?,
            AdvanceOutcome::NeedsAgendaReview { period: Period::Day, agenda }
                if agenda == "[ ] call bank\n"
        );

        let saturday = date!(2012 - 12 - 08);
        let (state, store) = fixture(saturday, "")?;
        let day_only = Preferences {
            reviewed: Period::Day,
            ..prefs()
        };
        assert_matches!(
            run(&state, &day_only, evening(saturday), &store)?,
            AdvanceOutcome::NeedsAgendaReview { period: Period::Week, .. }
        );
        Ok(())
    }

    #[test]
    fn new_week_needs_a_theme() -> anyhow::Result<()> {
        let saturday = date!(2012 - 12 - 08);
        let (state, store) = fixture(saturday, "")?;
        let themeless = Preferences {
            week_theme: None,
            ..prefs()
        };
        assert_matches!(
            run(&state, &themeless, evening(saturday), &store)?,
            AdvanceOutcome::NeedsTheme { period: Period::Week }
        );
        Ok(())
    }

    #[test]
    fn scheduling_problems_are_recoverable() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) = fixture(day, "[o] waiting on bob\n")?;
        assert_matches!(
            run(&state, &prefs(), evening(day), &store)?,
            AdvanceOutcome::BlockedWithoutDate { entry } if entry == "[o] waiting on bob\n"
        );

        let (state, store) = fixture(day, "[o] x [$DECEMBER 1, 2012$]\n")?;
        assert_matches!(
            run(&state, &prefs(), evening(day), &store)?,
            AdvanceOutcome::ScheduledInPast { due, .. } if due == date!(2012 - 12 - 01)
        );
        Ok(())
    }

    #[test]
    fn existing_successor_log_is_fatal() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) = fixture(day, "")?;
        let store = store.with("December 6, 2012", "already here\n");
        assert_matches!(
            run(&state, &prefs(), evening(day), &store),
            Err(PlannerError::LogExists { name }) if name == "December 6, 2012"
        );
        Ok(())
    }

    #[test]
    fn jumps_cross_periods_without_logs() -> anyhow::Result<()> {
        let day = date!(2012 - 12 - 05);
        let (state, store) = fixture(day, "")?;
        let jump = Preferences {
            jump: Some(date!(2012 - 12 - 20)),
            ..prefs()
        };
        let christmas = evening(date!(2012 - 12 - 25));
        let (period, next, _) = advanced(run(&state, &jump, christmas, &store)?);
        assert_eq!(period, Period::Week);
        assert_eq!(next.date, date!(2012 - 12 - 20));
        assert_eq!(next.log(Period::Day).map(|l| l.name.as_str()), Some("December 20, 2012"));
        assert_eq!(
            next.log(Period::Week).map(|l| l.name.as_str()),
            Some("Week of December 16, 2012")
        );

        let backwards = Preferences {
            jump: Some(day),
            ..prefs()
        };
        assert_matches!(
            run(&state, &backwards, evening(day), &store),
            Err(PlannerError::InvalidJump { .. })
        );
        Ok(())
    }

    #[test]
    fn bootstrap_creates_linked_logs() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let (state, changes) = bootstrap(date!(2012 - 12 - 05), &prefs(), &store, &PlainTemplate)?;
        assert_eq!(state.logs.len(), 5);
        assert_eq!(changes.len(), 6);
        assert!(changes.get(TASKLIST).is_some());
        let week = changes.get("Week of December 1, 2012").expect("week log");
        assert!(week.contains("[[December 5, 2012]]\n"));
        assert!(changes.get("2012").is_some_and(|y| y.contains("[[Q4 2012]]\n")));

        let taken = MemoryStore::new().with("Q4 2012", "");
        assert_matches!(
            bootstrap(date!(2012 - 12 - 05), &prefs(), &taken, &PlainTemplate),
            Err(PlannerError::LogExists { .. })
        );
        Ok(())
    }
}
