//! Coverage sets ("sparsity mappings").
//!
//! A [`CoverageSet`] records which contiguous date ranges have already been
//! collected for one (ticker, unit) pair, as an ordered list of disjoint
//! closed intervals. The persisted form is a compact string:
//!
//! ```text
//! /2020-01-01|2020-06-30/2020-09-01|2020-12-31
//! ```
//!
//! with the empty set serializing to `/`. Invariants, re-established by every
//! mutation:
//! - intervals are sorted ascending by start,
//! - no two intervals intersect or sit within one unit step of each other
//!   (touching ranges are merged), so the list is a maximal disjoint
//!   decomposition.

use super::error::CoverageError;
use super::interval::DateInterval;
use super::unit::DiscreteUnit;
use chrono::NaiveDate;
use std::fmt;

/// Date format used in the serialized form. Must never produce the `/` or `|`
/// separator characters; `date_format_emits_no_separators` pins this down.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The set of date ranges already held for one (ticker, unit) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSet {
    unit: DiscreteUnit,
    intervals: Vec<DateInterval>,
}

impl CoverageSet {
    /// The empty set ("null domain") for a fresh ticker/unit pair.
    pub fn empty(unit: DiscreteUnit) -> Self {
        Self {
            unit,
            intervals: Vec::new(),
        }
    }

    /// A set covering exactly one interval.
    pub fn single(interval: DateInterval, unit: DiscreteUnit) -> Self {
        Self {
            unit,
            intervals: vec![interval],
        }
    }

    /// Parse and validate the serialized form.
    ///
    /// Well-formedness is stricter than the merge rule used during mutation:
    /// stored intervals must be strictly increasing and non-overlapping, each
    /// segment exactly two `|`-separated dates, the whole string starting
    /// with `/`. Anything else is a [`CoverageError::Format`].
    pub fn parse(s: &str, unit: DiscreteUnit) -> Result<Self, CoverageError> {
        let Some(body) = s.strip_prefix('/') else {
            return Err(CoverageError::format(s, "must start with '/'"));
        };

        let mut intervals = Vec::new();
        let mut running_stop: Option<NaiveDate> = None;

        for segment in body.split('/').filter(|seg| !seg.is_empty()) {
            let tokens: Vec<&str> = segment.split('|').collect();
            if tokens.len() != 2 {
                return Err(CoverageError::format(
                    s,
                    format!("segment '{segment}' must be exactly two '|'-separated dates"),
                ));
            }

            let start = parse_date(s, tokens[0])?;
            let stop = parse_date(s, tokens[1])?;
            if stop < start {
                return Err(CoverageError::format(
                    s,
                    format!("stop {stop} precedes start {start}"),
                ));
            }
            if let Some(prev_stop) = running_stop {
                if start <= prev_stop {
                    return Err(CoverageError::format(
                        s,
                        format!("interval starting {start} does not follow previous stop {prev_stop}"),
                    ));
                }
            }
            running_stop = Some(stop);

            // start <= stop was just checked
            intervals.push(DateInterval::new(start, stop)?);
        }

        Ok(Self { unit, intervals })
    }

    pub fn unit(&self) -> DiscreteUnit {
        self.unit
    }

    /// True iff no dates are covered (serialized form is `/`).
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Covered intervals, ascending by start. Drives per-gap fetch loops.
    pub fn intervals(&self) -> &[DateInterval] {
        &self.intervals
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.intervals.iter().any(|iv| iv.contains(date))
    }

    /// Absorb one interval: widen it over every covered range it touches,
    /// drop those ranges, insert the result in order.
    pub fn insert(&mut self, interval: DateInterval) -> &mut Self {
        let unit = self.unit;
        let mut merged = interval;
        self.intervals.retain(|iv| {
            if iv.touches(&merged, unit) {
                merged = merged.hull(iv);
                false
            } else {
                true
            }
        });
        self.intervals.push(merged);
        self.intervals.sort_by_key(|iv| iv.start());
        self
    }

    /// Remove one interval, splitting covered ranges on partial overlap.
    pub fn remove(&mut self, interval: DateInterval) -> &mut Self {
        let unit = self.unit;
        self.intervals = self
            .intervals
            .iter()
            .flat_map(|iv| iv.subtract(&interval, unit))
            .collect();
        self.intervals.sort_by_key(|iv| iv.start());
        self
    }

    /// Set union: absorb every interval of `other` into this set.
    ///
    /// Idempotent — unioning an already-covered range changes nothing. Fails
    /// without mutating if the sets were built with different units.
    pub fn union(&mut self, other: &CoverageSet) -> Result<&mut Self, CoverageError> {
        self.check_unit(other)?;
        for iv in &other.intervals {
            self.insert(*iv);
        }
        Ok(self)
    }

    /// Relative complement: remove every interval of `other` from this set.
    ///
    /// May empty the set, at which point the owning persisted record should
    /// be deleted rather than stored as `/`.
    pub fn difference(&mut self, other: &CoverageSet) -> Result<&mut Self, CoverageError> {
        self.check_unit(other)?;
        for iv in &other.intervals {
            self.remove(*iv);
        }
        Ok(self)
    }

    /// The ranges of `requested` not covered by this set, ascending.
    ///
    /// These are exactly the intervals a collector must still fetch.
    pub fn gaps(&self, requested: DateInterval) -> Vec<DateInterval> {
        let mut wanted = CoverageSet::single(requested, self.unit);
        for iv in &self.intervals {
            wanted.remove(*iv);
        }
        wanted.intervals
    }

    /// True when `interval` is fully covered.
    pub fn covers(&self, interval: DateInterval) -> bool {
        self.gaps(interval).is_empty()
    }

    fn check_unit(&self, other: &CoverageSet) -> Result<(), CoverageError> {
        if self.unit != other.unit {
            return Err(CoverageError::UnitMismatch {
                left: self.unit,
                right: other.unit,
            });
        }
        Ok(())
    }
}

impl fmt::Display for CoverageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "/");
        }
        for iv in &self.intervals {
            write!(
                f,
                "/{}|{}",
                iv.start().format(DATE_FORMAT),
                iv.stop().format(DATE_FORMAT)
            )?;
        }
        Ok(())
    }
}

fn parse_date(input: &str, token: &str) -> Result<NaiveDate, CoverageError> {
    if token.is_empty() {
        return Err(CoverageError::format(input, "empty date token"));
    }
    NaiveDate::parse_from_str(token, DATE_FORMAT)
        .map_err(|e| CoverageError::format(input, format!("bad date '{token}': {e}")))
}
