//! Closed date intervals and the algebra coverage sets are built on.

use super::error::CoverageError;
use super::unit::DiscreteUnit;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One contiguous stretch of dates, inclusive on both ends.
///
/// Invariant: `start <= stop`. Construction through [`DateInterval::new`]
/// enforces it; a single date is the interval `[d, d]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateInterval {
    start: NaiveDate,
    stop: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, stop: NaiveDate) -> Result<Self, CoverageError> {
        if stop < start {
            return Err(CoverageError::InvalidRange { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Single-date interval.
    pub fn point(date: NaiveDate) -> Self {
        Self {
            start: date,
            stop: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn stop(&self) -> NaiveDate {
        self.stop
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.stop
    }

    /// True when the intervals overlap or are separated by less than one
    /// `unit` step.
    ///
    /// Folding adjacency into intersection is what makes union merge touching
    /// ranges into one continuous interval instead of leaving a one-unit gap.
    pub fn touches(&self, other: &DateInterval, unit: DiscreteUnit) -> bool {
        let self_clear_left = unit.next(self.stop).is_some_and(|d| d < other.start);
        let other_clear_left = unit.next(other.stop).is_some_and(|d| d < self.start);
        !(self_clear_left || other_clear_left)
    }

    /// Smallest interval containing both `self` and `other`.
    pub fn hull(&self, other: &DateInterval) -> DateInterval {
        DateInterval {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    /// Relative complement `self − other`: zero, one, or two closed intervals.
    ///
    /// Subtracting a closed interval from a closed interval would produce open
    /// ends; because dates are discrete, the cut points move inward by one
    /// `unit` step instead, so no date is lost or counted twice.
    pub fn subtract(&self, other: &DateInterval, unit: DiscreteUnit) -> Vec<DateInterval> {
        if !self.touches(other, unit) {
            return vec![*self];
        }

        let mut parts = Vec::with_capacity(2);
        if self.start < other.start {
            if let Some(stop) = unit.prev(other.start) {
                // stop < start only with endpoints not snapped to `unit`
                if self.start <= stop {
                    parts.push(DateInterval {
                        start: self.start,
                        stop,
                    });
                }
            }
        }
        if other.stop < self.stop {
            if let Some(start) = unit.next(other.stop) {
                if start <= self.stop {
                    parts.push(DateInterval {
                        start,
                        stop: self.stop,
                    });
                }
            }
        }
        parts
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn iv(start: (i32, u32, u32), stop: (i32, u32, u32)) -> DateInterval {
        DateInterval::new(d(start.0, start.1, start.2), d(stop.0, stop.1, stop.2)).unwrap()
    }

    #[test]
    fn rejects_stop_before_start() {
        let err = DateInterval::new(d(2020, 1, 10), d(2020, 1, 1)).unwrap_err();
        assert!(matches!(err, CoverageError::InvalidRange { .. }));
    }

    #[test]
    fn touches_on_overlap() {
        let a = iv((2020, 1, 1), (2020, 1, 10));
        let b = iv((2020, 1, 5), (2020, 1, 20));
        assert!(a.touches(&b, DiscreteUnit::Day));
        assert!(b.touches(&a, DiscreteUnit::Day));
    }

    #[test]
    fn touches_when_exactly_one_unit_apart() {
        let a = iv((2020, 1, 1), (2020, 1, 5));
        let b = iv((2020, 1, 6), (2020, 1, 10));
        assert!(a.touches(&b, DiscreteUnit::Day));
        assert!(b.touches(&a, DiscreteUnit::Day));
    }

    #[test]
    fn does_not_touch_across_a_two_unit_gap() {
        let a = iv((2020, 1, 1), (2020, 1, 5));
        let b = iv((2020, 1, 7), (2020, 1, 10));
        assert!(!a.touches(&b, DiscreteUnit::Day));
        assert!(!b.touches(&a, DiscreteUnit::Day));
    }

    #[test]
    fn monthly_adjacency() {
        let a = iv((2020, 1, 1), (2020, 3, 1));
        let b = iv((2020, 4, 1), (2020, 6, 1));
        assert!(a.touches(&b, DiscreteUnit::Month));
        assert!(!a.touches(&b, DiscreteUnit::Day));
    }

    #[test]
    fn subtract_disjoint_is_noop() {
        let a = iv((2020, 1, 1), (2020, 1, 10));
        let b = iv((2020, 2, 1), (2020, 2, 5));
        assert_eq!(a.subtract(&b, DiscreteUnit::Day), vec![a]);
    }

    #[test]
    fn subtract_full_cover_is_empty() {
        let a = iv((2020, 1, 3), (2020, 1, 8));
        let b = iv((2020, 1, 1), (2020, 1, 10));
        assert!(a.subtract(&b, DiscreteUnit::Day).is_empty());
        assert!(a.subtract(&a, DiscreteUnit::Day).is_empty());
    }

    #[test]
    fn subtract_strict_inside_splits_in_two() {
        let a = iv((2020, 1, 1), (2020, 1, 10));
        let b = iv((2020, 1, 4), (2020, 1, 6));
        assert_eq!(
            a.subtract(&b, DiscreteUnit::Day),
            vec![iv((2020, 1, 1), (2020, 1, 3)), iv((2020, 1, 7), (2020, 1, 10))]
        );
    }

    #[test]
    fn subtract_left_overlap_trims_start() {
        let a = iv((2020, 1, 5), (2020, 1, 15));
        let b = iv((2020, 1, 1), (2020, 1, 9));
        assert_eq!(
            a.subtract(&b, DiscreteUnit::Day),
            vec![iv((2020, 1, 10), (2020, 1, 15))]
        );
    }

    #[test]
    fn subtract_right_overlap_trims_stop() {
        let a = iv((2020, 1, 1), (2020, 1, 10));
        let b = iv((2020, 1, 8), (2020, 1, 20));
        assert_eq!(
            a.subtract(&b, DiscreteUnit::Day),
            vec![iv((2020, 1, 1), (2020, 1, 7))]
        );
    }

    #[test]
    fn subtract_adjacent_leaves_interval_unchanged() {
        // Adjacent ranges "touch" for merge purposes, but subtracting one
        // must not eat any dates from the other.
        let a = iv((2020, 1, 1), (2020, 1, 5));
        let b = iv((2020, 1, 6), (2020, 1, 10));
        assert_eq!(a.subtract(&b, DiscreteUnit::Day), vec![a]);
        assert_eq!(b.subtract(&a, DiscreteUnit::Day), vec![b]);
    }

    #[test]
    fn subtract_monthly_adjusts_by_one_month() {
        let a = iv((2020, 1, 1), (2020, 12, 1));
        let b = iv((2020, 5, 1), (2020, 7, 1));
        assert_eq!(
            a.subtract(&b, DiscreteUnit::Month),
            vec![iv((2020, 1, 1), (2020, 4, 1)), iv((2020, 8, 1), (2020, 12, 1))]
        );
    }
}
