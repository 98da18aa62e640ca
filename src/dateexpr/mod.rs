//! Free-form date expressions such as `DECEMBER 15, 2012`, `NEXT WEEK` or
//! `Q3`, resolved to a date and the period it denotes.
//!
//! Every period has one canonical rendering (see [`DateExpr`]'s `Display`),
//! and parsing a canonical string against the same reference date yields the
//! same expression again.

use std::fmt;

use thiserror::Error;
use time::Date;

use crate::period::{quarter_of, Period, PeriodError};

mod grammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateExpr {
    pub date: Date,
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateExprError {
    #[error("unrecognised date expression {text:?}")]
    Format { text: String },
    #[error("relative date expression {text:?} needs a reference date")]
    RelativeWithoutReference { text: String },
    #[error("{text:?} does not name a calendar date")]
    InvalidDate { text: String },
    #[error(transparent)]
    Period(#[from] PeriodError),
}

impl DateExpr {
    pub fn someday() -> Self {
        Self {
            date: Date::MAX,
            period: Period::Eternity,
        }
    }
}

impl fmt::Display for DateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = self.date.month().to_string().to_uppercase();
        let (day, year) = (self.date.day(), self.date.year());
        match self.period {
            Period::Day => write!(f, "{month} {day}, {year}"),
            Period::Week => write!(f, "WEEK OF {month} {day}, {year}"),
            Period::Month => write!(f, "{month} {year}"),
            Period::Quarter => write!(f, "Q{} {year}", quarter_of(self.date.month())),
            Period::Year => write!(f, "{year}"),
            Period::Zero | Period::Eternity => f.write_str("SOMEDAY"),
        }
    }
}

pub fn parse(text: &str, reference: Option<Date>) -> Result<DateExpr, DateExprError> {
    let normalized = grammar::normalize(text);
    grammar::resolve(&grammar::Input {
        text: &normalized,
        reference,
    })
}

pub fn canonical(expr: &DateExpr) -> String {
    expr.to_string()
}

/// Parses `text` and renders it back in canonical form.
pub fn standardize(text: &str, reference: Option<Date>) -> Result<String, DateExprError> {
    parse(text, reference).map(|expr| canonical(&expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn day(date: Date) -> DateExpr {
        DateExpr {
            date,
            period: Period::Day,
        }
    }

    #[test]
    fn parses_absolute_days_in_every_shape() -> Result<(), DateExprError> {
        let expected = day(date!(2012 - 12 - 15));
        for text in [
            "DECEMBER 15, 2012",
            "december 15 2012",
            "Dec. 15, 2012",
            "15 December, 2012",
            "15th dec 2012",
            "12/15/2012",
            "12-15-2012",
        ] {
            assert_eq!(parse(text, None)?, expected, "{text}");
        }
        Ok(())
    }

    #[test]
    fn relative_days_need_a_reference() {
        assert_eq!(
            parse("tomorrow", None),
            Err(DateExprError::RelativeWithoutReference {
                text: "TOMORROW".into()
            })
        );
        assert!(matches!(
            parse("next quarter", None),
            Err(DateExprError::RelativeWithoutReference { .. })
        ));
    }

    #[test]
    fn rejects_unknown_and_impossible_dates() {
        assert!(matches!(
            parse("whenever i feel like it", None),
            Err(DateExprError::Format { .. })
        ));
        assert!(matches!(
            parse("FEBRUARY 30, 2013", None),
            Err(DateExprError::InvalidDate { .. })
        ));
        assert!(matches!(
            parse("13/01/2013", None),
            Err(DateExprError::InvalidDate { .. })
        ));
    }

    #[test]
    fn relative_day_shapes() -> Result<(), DateExprError> {
        let wednesday = Some(date!(2012 - 12 - 05));
        assert_eq!(parse("today", wednesday)?, day(date!(2012 - 12 - 05)));
        assert_eq!(parse("tomorrow", wednesday)?, day(date!(2012 - 12 - 06)));
        assert_eq!(
            parse("day after tomorrow", wednesday)?,
            day(date!(2012 - 12 - 07))
        );
        assert_eq!(parse("friday", wednesday)?, day(date!(2012 - 12 - 07)));
        assert_eq!(parse("WED", wednesday)?, day(date!(2012 - 12 - 12)));
        assert_eq!(parse("dec 20", wednesday)?, day(date!(2012 - 12 - 20)));
        assert_eq!(parse("20 december", wednesday)?, day(date!(2012 - 12 - 20)));
        Ok(())
    }

    #[test]
    fn year_inference_keeps_ties_and_rolls_past_dates() -> Result<(), DateExprError> {
        let reference = Some(date!(2012 - 12 - 05));
        assert_eq!(parse("DECEMBER 5", reference)?, day(date!(2012 - 12 - 05)));
        assert_eq!(parse("DECEMBER 4", reference)?, day(date!(2013 - 12 - 04)));
        assert_eq!(parse("JANUARY 3", reference)?, day(date!(2013 - 01 - 03)));
        assert_eq!(
            parse("FEBRUARY 29", Some(date!(2013 - 03 - 01)))?,
            day(date!(2016 - 02 - 29))
        );
        assert_eq!(
            parse("MARCH", reference)?,
            DateExpr {
                date: date!(2013 - 03 - 01),
                period: Period::Month
            }
        );
        Ok(())
    }

    #[test]
    fn week_expressions_normalise_to_week_start() -> Result<(), DateExprError> {
        let week = |date| DateExpr {
            date,
            period: Period::Week,
        };
        assert_eq!(
            parse("WEEK OF MAY 2, 2013", None)?,
            week(date!(2013 - 05 - 01))
        );
        assert_eq!(
            parse("the week of dec 12", Some(date!(2012 - 12 - 05)))?,
            week(date!(2012 - 12 - 09))
        );
        let reference = Some(date!(2012 - 12 - 05));
        assert_eq!(parse("next week", reference)?, week(date!(2012 - 12 - 09)));
        assert_eq!(parse("this weekend", reference)?, week(date!(2012 - 12 - 01)));
        assert_eq!(parse("next weekend", reference)?, week(date!(2012 - 12 - 09)));
        assert!(matches!(
            parse("week of next month", reference),
            Err(DateExprError::Format { .. })
        ));
        Ok(())
    }

    #[test]
    fn month_quarter_and_year_shapes() -> Result<(), DateExprError> {
        let reference = Some(date!(2012 - 12 - 05));
        let expr = |date, period| DateExpr { date, period };
        assert_eq!(
            parse("MAY 2013", None)?,
            expr(date!(2013 - 05 - 01), Period::Month)
        );
        assert_eq!(
            parse("next month", reference)?,
            expr(date!(2013 - 01 - 01), Period::Month)
        );
        assert_eq!(
            parse("Q3 2013", None)?,
            expr(date!(2013 - 07 - 01), Period::Quarter)
        );
        assert_eq!(
            parse("Q4", reference)?,
            expr(date!(2013 - 10 - 01), Period::Quarter)
        );
        assert_eq!(
            parse("Q1", reference)?,
            expr(date!(2013 - 01 - 01), Period::Quarter)
        );
        assert_eq!(
            parse("Q4", Some(date!(2012 - 10 - 01)))?,
            expr(date!(2012 - 10 - 01), Period::Quarter)
        );
        assert_eq!(
            parse("next quarter", reference)?,
            expr(date!(2013 - 01 - 01), Period::Quarter)
        );
        assert_eq!(
            parse("2014", None)?,
            expr(date!(2014 - 01 - 01), Period::Year)
        );
        assert_eq!(
            parse("next year", reference)?,
            expr(date!(2013 - 01 - 01), Period::Year)
        );
        assert_eq!(parse("someday", None)?, DateExpr::someday());
        Ok(())
    }

    #[test]
    fn canonical_forms_per_period() -> Result<(), DateExprError> {
        let reference = Some(date!(2012 - 12 - 05));
        let cases = [
            ("tomorrow", "DECEMBER 6, 2012"),
            ("week of may 2, 2013", "WEEK OF MAY 1, 2013"),
            ("next month", "JANUARY 2013"),
            ("q2", "Q2 2013"),
            ("next year", "2013"),
            ("Someday", "SOMEDAY"),
        ];
        for (text, expected) in cases {
            assert_eq!(standardize(text, reference)?, expected, "{text}");
        }
        Ok(())
    }

    #[test]
    fn parse_canonicalize_parse_is_a_fixed_point() -> Result<(), DateExprError> {
        let expressions = [
            "tomorrow",
            "day after tomorrow",
            "saturday",
            "jan 3",
            "12/25/2012",
            "week of jan 2",
            "next week",
            "this weekend",
            "next weekend",
            "february",
            "next month",
            "q1",
            "next quarter",
            "2015",
            "next year",
            "someday",
        ];
        let references = [
            date!(2012 - 12 - 05),
            date!(2012 - 12 - 31),
            date!(2013 - 02 - 28),
            date!(2013 - 05 - 01),
        ];
        for reference in references {
            for text in expressions {
                let first = parse(text, Some(reference))?;
                let again = parse(&canonical(&first), Some(reference))?;
                assert_eq!(first, again, "{text} against {reference}");
            }
        }
        Ok(())
    }
}
