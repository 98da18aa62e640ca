use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::config::AppConfig;
use crate::dateexpr;
use crate::period::Period;
use crate::planner::{self, AdvanceOutcome, PlainTemplate, PlannerState, Preferences};
use crate::storage::{DirectoryStore, StateFile, Store, TASKLIST};
use crate::tasklist::{self, ScheduledTask};
use crate::text::entry::{self, EntryStatus};

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// First tracked day, as any date expression (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
    /// Theme for the first week log
    #[arg(long)]
    pub theme: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AdvanceArgs {
    /// Theme for the week log begun by this run
    #[arg(long)]
    pub theme: Option<String>,
    /// Coarsest period whose pending agenda has been reviewed
    #[arg(long)]
    pub reviewed: Option<Period>,
    /// Jump straight to this date instead of the next day
    #[arg(long)]
    pub jump: Option<String>,
    /// Wall-clock time to advance against, as "YYYY-MM-DD HH:MM"
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Date expression, e.g. "next friday" or "Q3"
    #[arg(required = true)]
    pub expr: Vec<String>,
    /// Reference date for relative expressions (defaults to today)
    #[arg(long)]
    pub reference: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Task text carrying a [$date$] marker
    #[arg(required = true)]
    pub entry: Vec<String>,
    /// Reference date (defaults to the tracked date)
    #[arg(long)]
    pub reference: Option<String>,
}

pub struct Workspace {
    pub config: AppConfig,
    pub store: DirectoryStore,
    pub state: StateFile,
}

impl Workspace {
    fn load_state(&self) -> Result<PlannerState> {
        if !self.state.exists() {
            bail!("planner not initialised; run `planner init` first");
        }
        let record = self.state.load()?;
        PlannerState::load(&record, &self.store)
    }
}

pub fn init(ws: &mut Workspace, args: InitArgs, today: Date) -> Result<String> {
    if ws.state.exists() {
        bail!("planner already initialised at {}", ws.state.path().display());
    }
    let date = match &args.date {
        Some(text) => resolve_day(text, today)?,
        None => today,
    };
    let prefs = Preferences {
        week_theme: args.theme,
        ..ws.config.preferences()
    };
    let (state, changes) = planner::bootstrap(date, &prefs, &ws.store, &PlainTemplate)
        .context("creating first logs")?;
    ws.store.commit(&changes)?;
    ws.state.save(&state.record())?;
    tracing::info!(%date, "planner initialised");
    Ok(format!("Planner started on {date}.\n{}", format_logs(&state)))
}

pub fn advance(ws: &mut Workspace, args: AdvanceArgs, now: PrimitiveDateTime) -> Result<String> {
    let state = ws.load_state()?;
    let now = match &args.now {
        Some(text) => parse_now(text)?,
        None => now,
    };
    let jump = args
        .jump
        .as_deref()
        .map(|text| resolve_day(text, state.date))
        .transpose()?;
    let prefs = Preferences {
        week_theme: args.theme,
        reviewed: args.reviewed.unwrap_or(Period::Zero),
        jump,
        ..ws.config.preferences()
    };

    let outcome = planner::advance(&state, &prefs, now, &ws.store, &PlainTemplate)?;
    let message = match outcome {
        AdvanceOutcome::Advanced {
            period,
            state,
            changes,
        } => {
            ws.store.commit(&changes)?;
            ws.state.save(&state.record())?;
            format!(
                "Advanced to {} ({period} boundary, {} documents written).\n{}",
                state.date,
                changes.len(),
                format_logs(&state)
            )
        }
        AdvanceOutcome::DayInProgress { next_day } => format!(
            "Today is still in progress; {next_day} can begin after {}:00.\n",
            prefs.evening_hour
        ),
        AdvanceOutcome::NeedsLogCompletion { period, log } => {
            format!("Fill in the NOTES of the {period} log \"{log}\" before advancing.\n")
        }
        AdvanceOutcome::NeedsAgendaReview { period, agenda } => {
            let mut out = format!("Review the agenda for the new {period} log:\n");
            out.push_str(&agenda);
            let _ = writeln!(out, "Then rerun with --reviewed {period}.");
            out
        }
        AdvanceOutcome::NeedsTheme { period } => {
            format!("The new {period} log needs a theme; rerun with --theme.\n")
        }
        AdvanceOutcome::BlockedWithoutDate { entry } => {
            format!("Blocked task has no [$date$] marker:\n{entry}")
        }
        AdvanceOutcome::ScheduledInPast { entry, due } => {
            format!("Task is scheduled on or before today ({due}):\n{entry}")
        }
    };
    Ok(message)
}

pub fn parse_expr(args: ParseArgs, today: Date) -> Result<String> {
    let reference = match &args.reference {
        Some(text) => resolve_day(text, today)?,
        None => today,
    };
    let expr = dateexpr::parse(&args.expr.join(" "), Some(reference))?;
    Ok(format!("{expr}\t{}\t{}\n", expr.period, expr.date))
}

pub fn schedule(ws: &mut Workspace, args: ScheduleArgs, today: Date) -> Result<String> {
    let tracked = if ws.state.exists() {
        ws.state.load()?.date
    } else {
        today
    };
    let reference = match &args.reference {
        Some(text) => resolve_day(text, tracked)?,
        None => tracked,
    };
    let raw = format!("{}\n", args.entry.join(" ").trim());
    let raw = if entry::is_scheduled(&raw) {
        raw
    } else {
        entry::mark(&raw, EntryStatus::Scheduled)
    };
    let task = ScheduledTask::from_entry(&raw, Some(reference))?;
    if task.due.date <= reference {
        bail!(
            "task {:?} is due {} which is not after {reference}",
            task.entry.trim_end(),
            task.due.date
        );
    }
    let standardized = task.standardized();

    let current = ws
        .store
        .load_optional(TASKLIST)?
        .unwrap_or_else(tasklist::empty_tasklist);
    let updated = tasklist::place(&current, &[standardized.as_str()], reference)?;
    ws.store.save(TASKLIST, &updated)?;
    let section = tasklist::section_for(tasklist::bucket(task.due.date, reference)?);
    tracing::info!(entry = %standardized.trim_end(), section, "scheduled task");
    Ok(format!("{section}: {standardized}"))
}

pub fn status(ws: &Workspace) -> Result<String> {
    let state = ws.load_state()?;
    Ok(format!("Tracking {}.\n{}", state.date, format_logs(&state)))
}

/// Local wall-clock time, falling back to UTC when the offset is unknown.
pub fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|err| {
        tracing::warn!(?err, "local offset unavailable, using UTC");
        OffsetDateTime::now_utc()
    });
    PrimitiveDateTime::new(now.date(), now.time())
}

fn resolve_day(text: &str, reference: Date) -> Result<Date> {
    let expr = dateexpr::parse(text, Some(reference))
        .with_context(|| format!("parsing date {text:?}"))?;
    if expr.period != Period::Day {
        bail!("{text:?} names a {} rather than a single day", expr.period);
    }
    Ok(expr.date)
}

fn parse_now(text: &str) -> Result<PrimitiveDateTime> {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    PrimitiveDateTime::parse(text.trim(), &format)
        .with_context(|| format!("parsing --now {text:?} as YYYY-MM-DD HH:MM"))
}

fn format_logs(state: &PlannerState) -> String {
    let mut out = String::new();
    for (period, log) in &state.logs {
        let _ = writeln!(out, "  {:<8} {}", period.to_string(), log.name);
    }
    out
}
