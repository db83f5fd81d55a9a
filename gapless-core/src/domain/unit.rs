//! Discrete date granularity.
//!
//! Coverage sets address whole dates at a configurable step: one day, one
//! month, or one year. "Adjacent" everywhere in this crate means separated by
//! exactly one such step.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest step between addressable dates in a coverage set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscreteUnit {
    Day,
    Month,
    Year,
}

impl DiscreteUnit {
    /// All units, in ascending coarseness. Used to enumerate store records.
    pub const ALL: [DiscreteUnit; 3] = [Self::Day, Self::Month, Self::Year];

    /// The date exactly one unit after `date`.
    ///
    /// Calendar-correct: month and year steps clamp to the last valid day of
    /// the target month (2020-01-31 + 1 month = 2020-02-29). Returns `None`
    /// only at the edge of chrono's representable range.
    pub fn next(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => date.checked_add_days(Days::new(1)),
            Self::Month => date.checked_add_months(Months::new(1)),
            Self::Year => date.checked_add_months(Months::new(12)),
        }
    }

    /// The date exactly one unit before `date`.
    pub fn prev(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => date.checked_sub_days(Days::new(1)),
            Self::Month => date.checked_sub_months(Months::new(1)),
            Self::Year => date.checked_sub_months(Months::new(12)),
        }
    }

    /// The `resampleFreq` query parameter Tiingo expects for this unit.
    pub fn resample_freq(self) -> &'static str {
        match self {
            Self::Day => "daily",
            Self::Month => "monthly",
            Self::Year => "annually",
        }
    }
}

impl fmt::Display for DiscreteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DiscreteUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" | "daily" => Ok(Self::Day),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "annually" => Ok(Self::Year),
            other => Err(format!("unknown discrete unit '{other}' (expected day, month, or year)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_steps() {
        assert_eq!(DiscreteUnit::Day.next(d(2020, 2, 28)), Some(d(2020, 2, 29)));
        assert_eq!(DiscreteUnit::Day.next(d(2020, 12, 31)), Some(d(2021, 1, 1)));
        assert_eq!(DiscreteUnit::Day.prev(d(2020, 3, 1)), Some(d(2020, 2, 29)));
    }

    #[test]
    fn month_steps_clamp_to_valid_dates() {
        assert_eq!(DiscreteUnit::Month.next(d(2020, 1, 31)), Some(d(2020, 2, 29)));
        assert_eq!(DiscreteUnit::Month.next(d(2019, 1, 31)), Some(d(2019, 2, 28)));
        assert_eq!(DiscreteUnit::Month.prev(d(2020, 3, 31)), Some(d(2020, 2, 29)));
    }

    #[test]
    fn year_steps() {
        assert_eq!(DiscreteUnit::Year.next(d(2020, 2, 29)), Some(d(2021, 2, 28)));
        assert_eq!(DiscreteUnit::Year.prev(d(2021, 6, 15)), Some(d(2020, 6, 15)));
    }

    #[test]
    fn resample_freq_mapping() {
        assert_eq!(DiscreteUnit::Day.resample_freq(), "daily");
        assert_eq!(DiscreteUnit::Month.resample_freq(), "monthly");
        assert_eq!(DiscreteUnit::Year.resample_freq(), "annually");
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("day".parse::<DiscreteUnit>(), Ok(DiscreteUnit::Day));
        assert_eq!("monthly".parse::<DiscreteUnit>(), Ok(DiscreteUnit::Month));
        assert!("week".parse::<DiscreteUnit>().is_err());
    }
}
