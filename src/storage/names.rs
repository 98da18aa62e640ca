use time::Date;

use crate::period::{quarter_of, Period, PeriodError};

pub const TASKLIST: &str = "Tasklist";

/// Logical document name for the log covering `date` at `period`.
pub fn log_name(period: Period, date: Date) -> Result<String, PeriodError> {
    let start = period.get_start_date(date)?;
    let (month, day, year) = (start.month(), start.day(), start.year());
    let name = match period {
        Period::Day => format!("{month} {day}, {year}"),
        Period::Week => format!("Week of {month} {day}, {year}"),
        Period::Month => format!("Month of {month}, {year}"),
        Period::Quarter => format!("Q{} {year}", quarter_of(month)),
        Period::Year => format!("{year}"),
        Period::Zero | Period::Eternity => return Err(PeriodError::Unbounded { period }),
    };
    Ok(name)
}

pub fn link(name: &str) -> String {
    format!("[[{name}]]\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn names_follow_period_start() -> Result<(), PeriodError> {
        let d = date!(2012 - 12 - 05);
        assert_eq!(log_name(Period::Day, d)?, "December 5, 2012");
        assert_eq!(log_name(Period::Week, d)?, "Week of December 1, 2012");
        assert_eq!(log_name(Period::Month, d)?, "Month of December, 2012");
        assert_eq!(log_name(Period::Quarter, d)?, "Q4 2012");
        assert_eq!(log_name(Period::Year, d)?, "2012");
        assert!(log_name(Period::Eternity, d).is_err());
        Ok(())
    }
}
