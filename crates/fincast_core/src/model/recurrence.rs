//! `<number>[w|m|y]` recurrence grammar

use std::fmt;
use std::str::FromStr;

use jiff::ToSpan;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceUnit {
    Week,
    Month,
    Year,
}

/// How often an income, expense or transaction repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recurrence {
    pub count: u32,
    pub unit: RecurrenceUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("recurrence '{0}' should be a whole number followed by w, m or y")]
pub struct RecurrenceError(pub String);

impl FromStr for Recurrence {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || RecurrenceError(s.to_string());
        let unit = match s.chars().last() {
            Some('w') => RecurrenceUnit::Week,
            Some('m') => RecurrenceUnit::Month,
            Some('y') => RecurrenceUnit::Year,
            _ => return Err(err()),
        };
        let digits = &s[..s.len() - 1];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let count: u32 = digits.parse().map_err(|_| err())?;
        if count == 0 {
            return Err(err());
        }
        Ok(Recurrence { count, unit })
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            RecurrenceUnit::Week => 'w',
            RecurrenceUnit::Month => 'm',
            RecurrenceUnit::Year => 'y',
        };
        write!(f, "{}{unit}", self.count)
    }
}

impl Recurrence {
    pub const MONTHLY: Recurrence = Recurrence {
        count: 1,
        unit: RecurrenceUnit::Month,
    };

    pub const WEEKLY: Recurrence = Recurrence {
        count: 1,
        unit: RecurrenceUnit::Week,
    };

    /// Span covering `times` repetitions
    pub fn span(&self, times: i64) -> jiff::Span {
        let n = i64::from(self.count) * times;
        match self.unit {
            RecurrenceUnit::Week => n.weeks(),
            RecurrenceUnit::Month => n.months(),
            RecurrenceUnit::Year => n.years(),
        }
    }

    /// The `k`th occurrence counted from `start` (negative `k` steps back).
    ///
    /// Always measured from `start` so month-end dates do not drift.
    pub fn nth(&self, start: Date, k: i64) -> Option<Date> {
        start.checked_add(self.span(k)).ok()
    }

    /// Occurrences from `start` (inclusive) up to `end` (exclusive)
    pub fn dates_until(&self, start: Date, end: Date) -> Vec<Date> {
        let mut dates = Vec::new();
        let mut k = 0;
        while let Some(d) = self.nth(start, k) {
            if d >= end {
                break;
            }
            dates.push(d);
            k += 1;
        }
        dates
    }

    /// Step `start` back by whole recurrences until it is no later than `anchor`
    pub fn align_back(&self, start: Date, anchor: Date) -> Date {
        let mut k = 0;
        let mut current = start;
        while current > anchor {
            k -= 1;
            match self.nth(start, k) {
                Some(d) => current = d,
                None => break,
            }
        }
        current
    }
}
