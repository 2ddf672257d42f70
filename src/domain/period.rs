//! Compact time period expressions
//!
//! Grammar:
//!
//! ```text
//! period     := YYYY | YYYY-MM | YYYY-MM-DD
//! expression := period | period "," period
//! ```
//!
//! A single period expands to the first and last calendar day it covers.
//! Two periods must share the same granularity; the result spans from the
//! start of the first to the end of the second, in the order given.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Smallest and largest years accepted in a period expression
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// An inclusive pair of calendar dates
///
/// No ordering is enforced: `start` may come after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

/// Precision at which a period is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
    Day,
}

/// One parsed period with its covered day span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Period {
    granularity: Granularity,
    first_day: NaiveDate,
    last_day: NaiveDate,
}

/// Parses a period expression into an inclusive date range
///
/// Returns `None` for anything malformed: non-numeric components, out of
/// range months or days, more than three components, or two periods of
/// different granularity.
pub fn parse_time_period(expression: &str) -> Option<DateRange> {
    match expression.split_once(',') {
        None => {
            let period = parse_period(expression)?;
            Some(DateRange::new(period.first_day, period.last_day))
        }
        Some((from, to)) => {
            let from = parse_period(from)?;
            let to = parse_period(to)?;
            if from.granularity != to.granularity {
                return None;
            }
            Some(DateRange::new(from.first_day, to.last_day))
        }
    }
}

fn parse_period(text: &str) -> Option<Period> {
    let components: Vec<&str> = text.trim().split('-').collect();

    match components.as_slice() {
        [year] => {
            let year = parse_year(year)?;
            Some(Period {
                granularity: Granularity::Year,
                first_day: NaiveDate::from_ymd_opt(year, 1, 1)?,
                last_day: NaiveDate::from_ymd_opt(year, 12, 31)?,
            })
        }
        [year, month] => {
            let year = parse_year(year)?;
            let month = parse_number(month)?;
            let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(Period {
                granularity: Granularity::Month,
                first_day,
                last_day: last_day_of_month(first_day)?,
            })
        }
        [year, month, day] => {
            let date =
                NaiveDate::from_ymd_opt(parse_year(year)?, parse_number(month)?, parse_number(day)?)?;
            Some(Period {
                granularity: Granularity::Day,
                first_day: date,
                last_day: date,
            })
        }
        _ => None,
    }
}

fn parse_year(text: &str) -> Option<i32> {
    let year = i32::try_from(parse_number(text)?).ok()?;
    (MIN_YEAR..=MAX_YEAR).contains(&year).then_some(year)
}

/// Accepts ASCII digits only, so signs and inner whitespace are rejected
fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn last_day_of_month(first_day: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if first_day.month() == 12 {
        (first_day.year() + 1, 1)
    } else {
        (first_day.year(), first_day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}
