use strum::{EnumIter, EnumString};
use thiserror::Error;
use time::{Date, Month, Weekday};

/// Boundary weeks at either end of a month are never shorter than this; a
/// Sunday that would leave a shorter fragment does not start a week.
pub const MIN_WEEK_LENGTH: u8 = 5;
pub const WEEK_START: Weekday = Weekday::Sunday;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumString, strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Period {
    Zero,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Eternity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("{period} has no calendar boundaries")]
    Unbounded { period: Period },
    #[error("no period adjacent to {period} (decreasing: {decreasing})")]
    OutOfRange { period: Period, decreasing: bool },
    #[error("calendar overflow near {date}")]
    DateRange { date: Date },
}

const SEQUENCE: [Period; 7] = [
    Period::Zero,
    Period::Day,
    Period::Week,
    Period::Month,
    Period::Quarter,
    Period::Year,
    Period::Eternity,
];

struct Boundaries {
    is_start: fn(Date) -> bool,
}

const DAY: Boundaries = Boundaries {
    is_start: is_day_start,
};
const WEEK: Boundaries = Boundaries {
    is_start: is_week_start,
};
const MONTH: Boundaries = Boundaries {
    is_start: is_month_start,
};
const QUARTER: Boundaries = Boundaries {
    is_start: is_quarter_start,
};
const YEAR: Boundaries = Boundaries {
    is_start: is_year_start,
};

impl Period {
    /// The granularities the planner keeps logs for, finest first.
    pub const TRACKED: [Period; 5] = [
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Quarter,
        Period::Year,
    ];

    fn boundaries(self) -> Option<&'static Boundaries> {
        match self {
            Period::Day => Some(&DAY),
            Period::Week => Some(&WEEK),
            Period::Month => Some(&MONTH),
            Period::Quarter => Some(&QUARTER),
            Period::Year => Some(&YEAR),
            Period::Zero | Period::Eternity => None,
        }
    }

    pub fn is_tracked(self) -> bool {
        self.boundaries().is_some()
    }

    pub fn is_start_of_period(self, date: Date) -> bool {
        match self.boundaries() {
            Some(bounds) => (bounds.is_start)(date),
            None => self == Period::Zero,
        }
    }

    pub fn get_start_date(self, date: Date) -> Result<Date, PeriodError> {
        let bounds = self.bounded()?;
        let mut current = date;
        while !(bounds.is_start)(current) {
            current = current
                .previous_day()
                .ok_or(PeriodError::DateRange { date })?;
        }
        Ok(current)
    }

    pub fn get_end_date(self, date: Date) -> Result<Date, PeriodError> {
        let bounds = self.bounded()?;
        let mut current = date;
        loop {
            let next = current.next_day().ok_or(PeriodError::DateRange { date })?;
            if (bounds.is_start)(next) {
                return Ok(current);
            }
            current = next;
        }
    }

    /// Upper-case adjective used for the periodic section header, e.g.
    /// `DAILY` in `DAILYs:`.
    pub fn noun(self) -> &'static str {
        match self {
            Period::Zero => "ZERO",
            Period::Day => "DAILY",
            Period::Week => "WEEKLY",
            Period::Month => "MONTHLY",
            Period::Quarter => "QUARTERLY",
            Period::Year => "YEARLY",
            Period::Eternity => "ETERNAL",
        }
    }

    pub fn coarser(self) -> Result<Period, PeriodError> {
        get_next_period(self, false)
    }

    pub fn finer(self) -> Result<Period, PeriodError> {
        get_next_period(self, true)
    }

    fn bounded(self) -> Result<&'static Boundaries, PeriodError> {
        self.boundaries()
            .ok_or(PeriodError::Unbounded { period: self })
    }
}

pub fn get_next_period(period: Period, decreasing: bool) -> Result<Period, PeriodError> {
    let index = SEQUENCE
        .iter()
        .position(|p| *p == period)
        .unwrap_or_default();
    let next = if decreasing {
        index.checked_sub(1)
    } else {
        Some(index + 1)
    };
    next.and_then(|idx| SEQUENCE.get(idx).copied())
        .ok_or(PeriodError::OutOfRange { period, decreasing })
}

fn is_day_start(_: Date) -> bool {
    true
}

fn is_month_start(date: Date) -> bool {
    date.day() == 1
}

fn is_quarter_start(date: Date) -> bool {
    date.day() == 1 && is_quarter_start_month(date.month())
}

fn is_year_start(date: Date) -> bool {
    date.day() == 1 && date.month() == Month::January
}

pub fn is_week_start(date: Date) -> bool {
    if date.day() == 1 {
        return true;
    }
    if date.weekday() != WEEK_START {
        return false;
    }
    let before = date.day() - 1;
    let remaining = date.month().length(date.year()) - date.day() + 1;
    before >= MIN_WEEK_LENGTH && remaining >= MIN_WEEK_LENGTH
}

pub fn quarter_of(month: Month) -> u8 {
    (u8::from(month) - 1) / 3 + 1
}

pub fn is_quarter_start_month(month: Month) -> bool {
    matches!(
        month,
        Month::January | Month::April | Month::July | Month::October
    )
}

pub fn quarter_start_month(quarter: u8) -> Option<Month> {
    match quarter {
        1 => Some(Month::January),
        2 => Some(Month::April),
        3 => Some(Month::July),
        4 => Some(Month::October),
        _ => None,
    }
}

/// Days covered by `[start, end]`, inclusive.
pub fn span_days(start: Date, end: Date) -> i64 {
    (end - start).whole_days() + 1
}
