use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use time::{Date, Month, Weekday};

use super::{DateExpr, DateExprError};
use crate::period::{quarter_of, quarter_start_month, Period};

const MONTH: &str = concat!(
    r"(?P<month>JAN(?:UARY)?|FEB(?:RUARY)?|MAR(?:CH)?|APR(?:IL)?|MAY|JUNE?|JULY?",
    r"|AUG(?:UST)?|SEP(?:T(?:EMBER)?)?|OCT(?:OBER)?|NOV(?:EMBER)?|DEC(?:EMBER)?)\.?",
);
const WEEKDAY: &str = concat!(
    r"(?P<weekday>SUN(?:DAY)?|MON(?:DAY)?|TUE(?:S(?:DAY)?)?|WED(?:NESDAY)?",
    r"|THU(?:R(?:S(?:DAY)?)?)?|FRI(?:DAY)?|SAT(?:URDAY)?)",
);
const DAY: &str = r"(?P<day>\d{1,2})(?:ST|ND|RD|TH)?";
const YEAR: &str = r"(?P<year>\d{4})";

/// How many years forward year inference looks before giving up; enough to
/// land on the next leap day.
const INFERENCE_HORIZON: i32 = 8;

pub(super) struct Input<'a> {
    pub text: &'a str,
    pub reference: Option<Date>,
}

impl Input<'_> {
    fn reference(&self) -> Result<Date, DateExprError> {
        self.reference
            .ok_or_else(|| DateExprError::RelativeWithoutReference {
                text: self.text.to_string(),
            })
    }

    fn invalid(&self) -> DateExprError {
        DateExprError::InvalidDate {
            text: self.text.to_string(),
        }
    }
}

type Resolve = fn(&Captures<'_>, &Input<'_>) -> Result<DateExpr, DateExprError>;

struct Shape {
    pattern: Regex,
    resolve: Resolve,
}

fn shape(pattern: &str, resolve: Resolve) -> Shape {
    let anchored = format!("^{pattern}$");
    Shape {
        pattern: Regex::new(&anchored).expect("valid date expression pattern"),
        resolve,
    }
}

static SHAPES: Lazy<Vec<Shape>> = Lazy::new(|| {
    vec![
        shape("SOMEDAY", |_, _| Ok(DateExpr::someday())),
        // absolute day
        shape(&format!("{MONTH} {DAY},? {YEAR}"), absolute_day),
        shape(&format!("{DAY} {MONTH},? {YEAR}"), absolute_day),
        shape(r"(?P<mm>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{4})", absolute_day),
        shape(r"(?P<mm>\d{1,2})-(?P<day>\d{1,2})-(?P<year>\d{4})", absolute_day),
        // relative day
        shape(&format!("{MONTH} {DAY}"), relative_day),
        shape(&format!("{DAY} {MONTH}"), relative_day),
        shape("TODAY", |_, input| offset_day(input, 0)),
        shape("TOMORROW", |_, input| offset_day(input, 1)),
        shape("(?:THE )?DAY AFTER TOMORROW", |_, input| offset_day(input, 2)),
        shape(WEEKDAY, next_weekday),
        // week
        shape("(?:THE )?WEEK OF (?P<inner>.+)", week_of),
        shape("NEXT WEEK", next_week),
        shape("THIS WEEKEND", |_, input| weekend(input, 0)),
        shape("NEXT WEEKEND", |_, input| weekend(input, 1)),
        // month
        shape(&format!("{MONTH},? {YEAR}"), absolute_month),
        shape(MONTH, relative_month),
        shape("NEXT MONTH", next_month),
        // quarter
        shape(r"Q(?P<quarter>[1-4]),? (?P<year>\d{4})", absolute_quarter),
        shape(r"Q(?P<quarter>[1-4])", relative_quarter),
        shape("NEXT QUARTER", next_quarter),
        // year
        shape(YEAR, absolute_year),
        shape("NEXT YEAR", next_year),
    ]
});

pub(super) fn resolve(input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    for shape in SHAPES.iter() {
        if let Some(caps) = shape.pattern.captures(input.text) {
            return (shape.resolve)(&caps, input);
        }
    }
    Err(DateExprError::Format {
        text: input.text.to_string(),
    })
}

pub(super) fn normalize(text: &str) -> String {
    let upper = text.trim().trim_end_matches('.').to_uppercase();
    upper.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn month_named(caps: &Captures<'_>) -> Option<Month> {
    let name = caps.name("month")?.as_str();
    let month = match name.get(..3)? {
        "JAN" => Month::January,
        "FEB" => Month::February,
        "MAR" => Month::March,
        "APR" => Month::April,
        "MAY" => Month::May,
        "JUN" => Month::June,
        "JUL" => Month::July,
        "AUG" => Month::August,
        "SEP" => Month::September,
        "OCT" => Month::October,
        "NOV" => Month::November,
        "DEC" => Month::December,
        _ => return None,
    };
    Some(month)
}

fn month_of(caps: &Captures<'_>) -> Option<Month> {
    match caps.name("mm") {
        Some(mm) => Month::try_from(mm.as_str().parse::<u8>().ok()?).ok(),
        None => month_named(caps),
    }
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: &str) -> Option<T> {
    caps.name(group)?.as_str().parse().ok()
}

fn day_expr(date: Date) -> DateExpr {
    DateExpr {
        date,
        period: Period::Day,
    }
}

fn absolute_day(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let month = month_of(caps).ok_or_else(|| input.invalid())?;
    let day: u8 = number(caps, "day").ok_or_else(|| input.invalid())?;
    let year: i32 = number(caps, "year").ok_or_else(|| input.invalid())?;
    Date::from_calendar_date(year, month, day)
        .map(day_expr)
        .map_err(|_| input.invalid())
}

fn relative_day(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let reference = input.reference()?;
    let month = month_of(caps).ok_or_else(|| input.invalid())?;
    let day: u8 = number(caps, "day").ok_or_else(|| input.invalid())?;
    infer_year(reference, |year| Date::from_calendar_date(year, month, day).ok())
        .map(day_expr)
        .ok_or_else(|| input.invalid())
}

/// Smallest year at or after the reference year whose candidate does not
/// fall before the reference date. A candidate equal to the reference wins.
fn infer_year<F>(reference: Date, build: F) -> Option<Date>
where
    F: Fn(i32) -> Option<Date>,
{
    (reference.year()..=reference.year() + INFERENCE_HORIZON)
        .filter_map(build)
        .find(|candidate| *candidate >= reference)
}

fn offset_day(input: &Input<'_>, days: u8) -> Result<DateExpr, DateExprError> {
    let mut date = input.reference()?;
    for _ in 0..days {
        date = date.next_day().ok_or_else(|| input.invalid())?;
    }
    Ok(day_expr(date))
}

fn weekday_named(caps: &Captures<'_>) -> Option<Weekday> {
    let name = caps.name("weekday")?.as_str();
    let weekday = match name.get(..3)? {
        "SUN" => Weekday::Sunday,
        "MON" => Weekday::Monday,
        "TUE" => Weekday::Tuesday,
        "WED" => Weekday::Wednesday,
        "THU" => Weekday::Thursday,
        "FRI" => Weekday::Friday,
        "SAT" => Weekday::Saturday,
        _ => return None,
    };
    Some(weekday)
}

fn next_weekday(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let reference = input.reference()?;
    let weekday = weekday_named(caps).ok_or_else(|| input.invalid())?;
    let date = following(reference, weekday).ok_or_else(|| input.invalid())?;
    Ok(day_expr(date))
}

/// First date strictly after `from` falling on `weekday`.
fn following(from: Date, weekday: Weekday) -> Option<Date> {
    let mut date = from.next_day()?;
    while date.weekday() != weekday {
        date = date.next_day()?;
    }
    Some(date)
}

fn week_expr(date: Date) -> Result<DateExpr, DateExprError> {
    Ok(DateExpr {
        date: Period::Week.get_start_date(date)?,
        period: Period::Week,
    })
}

fn week_of(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let inner = caps.name("inner").map(|m| m.as_str()).unwrap_or_default();
    let nested = Input {
        text: inner,
        reference: input.reference,
    };
    let expr = resolve(&nested)?;
    if expr.period != Period::Day {
        return Err(DateExprError::Format {
            text: input.text.to_string(),
        });
    }
    week_expr(expr.date)
}

fn next_week(_: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let end = Period::Week.get_end_date(input.reference()?)?;
    let start = end.next_day().ok_or_else(|| input.invalid())?;
    week_expr(start)
}

/// The week holding the first Saturday on or after the reference date,
/// shifted by `weeks_ahead` Saturdays.
fn weekend(input: &Input<'_>, weeks_ahead: u8) -> Result<DateExpr, DateExprError> {
    let reference = input.reference()?;
    let mut saturday = if reference.weekday() == Weekday::Saturday {
        reference
    } else {
        following(reference, Weekday::Saturday).ok_or_else(|| input.invalid())?
    };
    for _ in 0..weeks_ahead {
        saturday = following(saturday, Weekday::Saturday).ok_or_else(|| input.invalid())?;
    }
    week_expr(saturday)
}

fn month_expr(date: Date) -> DateExpr {
    DateExpr {
        date,
        period: Period::Month,
    }
}

fn absolute_month(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let month = month_named(caps).ok_or_else(|| input.invalid())?;
    let year: i32 = number(caps, "year").ok_or_else(|| input.invalid())?;
    Date::from_calendar_date(year, month, 1)
        .map(month_expr)
        .map_err(|_| input.invalid())
}

fn relative_month(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let reference = input.reference()?;
    let month = month_named(caps).ok_or_else(|| input.invalid())?;
    infer_year(reference, |year| Date::from_calendar_date(year, month, 1).ok())
        .map(month_expr)
        .ok_or_else(|| input.invalid())
}

fn next_month(_: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let end = Period::Month.get_end_date(input.reference()?)?;
    let start = end.next_day().ok_or_else(|| input.invalid())?;
    Ok(month_expr(start))
}

fn quarter_expr(date: Date) -> DateExpr {
    DateExpr {
        date,
        period: Period::Quarter,
    }
}

fn quarter_start(year: i32, quarter: u8) -> Option<Date> {
    Date::from_calendar_date(year, quarter_start_month(quarter)?, 1).ok()
}

fn absolute_quarter(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let quarter: u8 = number(caps, "quarter").ok_or_else(|| input.invalid())?;
    let year: i32 = number(caps, "year").ok_or_else(|| input.invalid())?;
    quarter_start(year, quarter)
        .map(quarter_expr)
        .ok_or_else(|| input.invalid())
}

/// Scans forward one quarter at a time from the reference's quarter until
/// the named quarter comes round without starting before the reference.
fn relative_quarter(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let reference = input.reference()?;
    let quarter: u8 = number(caps, "quarter").ok_or_else(|| input.invalid())?;
    let mut candidate = Period::Quarter.get_start_date(reference)?;
    for _ in 0..=4 {
        if quarter_of(candidate.month()) == quarter && candidate >= reference {
            return Ok(quarter_expr(candidate));
        }
        let end = Period::Quarter.get_end_date(candidate)?;
        candidate = end.next_day().ok_or_else(|| input.invalid())?;
    }
    Err(input.invalid())
}

fn next_quarter(_: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let end = Period::Quarter.get_end_date(input.reference()?)?;
    let start = end.next_day().ok_or_else(|| input.invalid())?;
    Ok(quarter_expr(start))
}

fn year_expr(year: i32, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    Date::from_calendar_date(year, Month::January, 1)
        .map(|date| DateExpr {
            date,
            period: Period::Year,
        })
        .map_err(|_| input.invalid())
}

fn absolute_year(caps: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    let year: i32 = number(caps, "year").ok_or_else(|| input.invalid())?;
    year_expr(year, input)
}

fn next_year(_: &Captures<'_>, input: &Input<'_>) -> Result<DateExpr, DateExprError> {
    year_expr(input.reference()?.year() + 1, input)
}
