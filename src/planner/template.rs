use time::{Date, Weekday};

use super::{Preferences, ScheduleVariant};
use crate::period::Period;

/// Everything the core decides about a freshly begun log. Rendering it into
/// a document is up to a [`LogTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSeed {
    pub period: Period,
    pub date: Date,
    pub title: String,
    pub links: Vec<String>,
    pub theme: Option<String>,
    pub checkpoints: String,
    pub agenda: String,
    pub periodic: String,
}

pub trait LogTemplate {
    fn render(&self, seed: &LogSeed, prefs: &Preferences) -> String;
}

/// Checkpoint document feeding a new log. Days pick the weekday or weekend
/// list; `Uniform` schedules always use the weekday one.
pub fn checkpoint_source(period: Period, date: Date, schedule: ScheduleVariant) -> String {
    match period {
        Period::Day => {
            let weekend = matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday);
            if weekend && schedule == ScheduleVariant::Standard {
                "Checkpoints_Weekend".to_string()
            } else {
                "Checkpoints_Weekday".to_string()
            }
        }
        other => format!("Checkpoints_{}", title_case(other)),
    }
}

pub fn periodic_source(period: Period) -> String {
    format!("Periodic_{}", title_case(period))
}

fn title_case(period: Period) -> String {
    let name = period.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTemplate;

impl LogTemplate for PlainTemplate {
    fn render(&self, seed: &LogSeed, prefs: &Preferences) -> String {
        let mut out = format!("= {} =\n", seed.title.to_uppercase());
        for link in &seed.links {
            push_line(&mut out, link);
        }
        if let Some(theme) = &seed.theme {
            out.push_str(&format!("Theme: {theme}\n"));
        }
        out.push('\n');

        push_section(&mut out, "CHECKPOINTS:", &seed.checkpoints);
        push_section(&mut out, "AGENDA:", &seed.agenda);
        let periodic: String = seed
            .periodic
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("{} {}\n", prefs.bullet, line.trim()))
            .collect();
        push_section(&mut out, &format!("{}s:", seed.period.noun()), &periodic);
        push_section(&mut out, "NOTES:", "");
        out.push_str("TIME SPENT ON PLANNER:\n");
        out
    }
}

fn push_section(out: &mut String, header: &str, body: &str) {
    out.push_str(header);
    out.push('\n');
    if !body.is_empty() {
        push_line(out, body);
    }
    out.push('\n');
}

fn push_line(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}
