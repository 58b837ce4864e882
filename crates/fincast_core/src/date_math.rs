//! Date parsing, trigger resolution and UK tax-period arithmetic.
//!
//! Model dates are strings: a literal (`1 Jan 2017`, `2017-01-01`), a trigger
//! name, or a trigger name with an offset (`Retire+1y`, `Retire-6m`). Tax years
//! start on 6 April and tax months on the 6th, so a date on day 1-5 belongs to
//! the previous tax month.

use jiff::ToSpan;
use jiff::civil::Date;
use rustc_hash::FxHashMap;

use crate::error::DateError;
use crate::model::ModelData;

pub const MIN_YEAR: i16 = 1870;
pub const MAX_YEAR: i16 = 2199;

/// Trigger chains deeper than this are treated as cyclic
pub const MAX_TRIGGER_DEPTH: usize = 10;

const TAX_DAY: i8 = 6;
const TAX_YEAR_MONTH: i8 = 4;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_number(word: &str) -> Option<i8> {
    let lower = word.to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let position = MONTHS.iter().position(|m| lower.starts_with(m))?;
    Some(position as i8 + 1)
}

/// Parse a literal date: `1 Jan 2017`, `1 January 2017` or `2017-01-01`
pub fn parse_date_literal(text: &str) -> Option<Date> {
    let text = text.trim();
    if let Ok(date) = text.parse::<Date>() {
        return Some(date);
    }
    let mut parts = text.split_whitespace();
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let day: i8 = day.parse().ok()?;
    let month = month_number(month)?;
    let year: i16 = year.parse().ok()?;
    Date::new(year, month, day).ok()
}

/// Format a date the way stored models write them (`1 Jan 2017`)
pub fn format_date(date: Date) -> String {
    let month = MONTHS[(date.month() - 1) as usize];
    let mut chars = month.chars();
    let month = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    };
    format!("{} {} {}", date.day(), month, date.year())
}

pub fn in_supported_range(date: Date) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&date.year())
}

/// Split `Trigger+3m` into (`Trigger`, span)
fn split_offset(expr: &str) -> Option<(&str, jiff::Span)> {
    let at = expr.rfind(|c: char| c == '+' || c == '-')?;
    let (base, offset) = expr.split_at(at);
    let sign: i64 = if offset.starts_with('-') { -1 } else { 1 };
    let offset = &offset[1..];
    let unit = offset.chars().last()?;
    let count: i64 = offset[..offset.len() - unit.len_utf8()].parse().ok()?;
    let n = sign * count;
    let span = match unit {
        'd' => n.days(),
        'w' => n.weeks(),
        'm' => n.months(),
        'y' => n.years(),
        _ => return None,
    };
    Some((base.trim(), span))
}

/// Resolves date expressions against a model's triggers
#[derive(Debug, Clone, Default)]
pub struct DateResolver {
    triggers: FxHashMap<String, String>,
}

impl DateResolver {
    pub fn new(model: &ModelData) -> Self {
        Self {
            triggers: model
                .triggers
                .iter()
                .map(|t| (t.name.clone(), t.date.clone()))
                .collect(),
        }
    }

    pub fn resolve(&self, expr: &str) -> Result<Date, DateError> {
        self.resolve_at_depth(expr, 0)
    }

    /// Like `resolve`, treating an empty expression as absent
    pub fn resolve_optional(&self, expr: &str) -> Result<Option<Date>, DateError> {
        if expr.trim().is_empty() {
            Ok(None)
        } else {
            self.resolve(expr).map(Some)
        }
    }

    fn resolve_at_depth(&self, expr: &str, depth: usize) -> Result<Date, DateError> {
        if depth > MAX_TRIGGER_DEPTH {
            return Err(DateError::TooDeep(expr.to_string()));
        }
        let expr = expr.trim();
        if let Some(date) = parse_date_literal(expr) {
            return Ok(date);
        }
        if let Some(target) = self.triggers.get(expr) {
            return self.resolve_at_depth(target, depth + 1);
        }
        if let Some((base, span)) = split_offset(expr)
            && !base.is_empty()
        {
            let date = self.resolve_at_depth(base, depth + 1)?;
            return date
                .checked_add(span)
                .map_err(|_| DateError::OutOfRange(expr.to_string()));
        }
        Err(DateError::Unparseable(expr.to_string()))
    }
}

/// Calendar year in which the tax year containing `date` starts
pub fn tax_year_of(date: Date) -> i16 {
    if (date.month(), date.day()) >= (TAX_YEAR_MONTH, TAX_DAY) {
        date.year()
    } else {
        date.year() - 1
    }
}

/// 6 April opening the tax year that starts in `year`
pub fn tax_year_start(year: i16) -> Date {
    jiff::civil::date(year, TAX_YEAR_MONTH, TAX_DAY)
}

/// The 6th opening the tax month containing `date`
pub fn tax_month_start(date: Date) -> Date {
    let sixth = jiff::civil::date(date.year(), date.month(), TAX_DAY);
    if date.day() >= TAX_DAY {
        sixth
    } else {
        sixth.saturating_sub(1.month())
    }
}

/// The 6th opening the tax month after the one containing `date`
pub fn next_tax_month_start(date: Date) -> Date {
    tax_month_start(date).saturating_add(1.month())
}

/// True when a tax month starting at `month_start` also opens a tax year
pub fn opens_tax_year(month_start: Date) -> bool {
    month_start.month() == TAX_YEAR_MONTH && month_start.day() == TAX_DAY
}

/// First 6 April on or after `date`
pub fn first_tax_year_start_from(date: Date) -> Date {
    let this_year = tax_year_start(date.year());
    if this_year >= date {
        this_year
    } else {
        tax_year_start(date.year() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Trigger;
    use jiff::civil::date;

    fn resolver(triggers: &[(&str, &str)]) -> DateResolver {
        let model = ModelData {
            triggers: triggers
                .iter()
                .map(|(name, d)| Trigger {
                    name: name.to_string(),
                    date: d.to_string(),
                    era: None,
                })
                .collect(),
            ..Default::default()
        };
        DateResolver::new(&model)
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_date_literal("1 Jan 2017"), Some(date(2017, 1, 1)));
        assert_eq!(parse_date_literal("6 April 2020"), Some(date(2020, 4, 6)));
        assert_eq!(parse_date_literal("2019-12-31"), Some(date(2019, 12, 31)));
        assert_eq!(parse_date_literal("31 Feb 2019"), None);
        assert_eq!(parse_date_literal("Retirement"), None);
        assert_eq!(parse_date_literal(""), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(date(2017, 1, 1)), "1 Jan 2017");
        let round_trip = parse_date_literal(&format_date(date(2031, 11, 23)));
        assert_eq!(round_trip, Some(date(2031, 11, 23)));
    }

    #[test]
    fn test_trigger_offsets() {
        let r = resolver(&[("Retire", "1 Jun 2030"), ("Later", "Retire+1y")]);
        assert_eq!(r.resolve("Retire"), Ok(date(2030, 6, 1)));
        assert_eq!(r.resolve("Later"), Ok(date(2031, 6, 1)));
        assert_eq!(r.resolve("Retire-6m"), Ok(date(2029, 12, 1)));
        assert_eq!(r.resolve("Later+2w"), Ok(date(2031, 6, 15)));
        assert!(r.resolve("Nobody+1y").is_err());
    }

    #[test]
    fn test_trigger_cycle_is_bounded() {
        let r = resolver(&[("A", "B"), ("B", "A")]);
        assert!(matches!(r.resolve("A"), Err(DateError::TooDeep(_))));
    }

    #[test]
    fn test_tax_periods() {
        assert_eq!(tax_year_of(date(2020, 4, 5)), 2019);
        assert_eq!(tax_year_of(date(2020, 4, 6)), 2020);
        assert_eq!(tax_month_start(date(2020, 3, 5)), date(2020, 2, 6));
        assert_eq!(tax_month_start(date(2020, 3, 6)), date(2020, 3, 6));
        assert_eq!(tax_month_start(date(2020, 1, 1)), date(2019, 12, 6));
        assert_eq!(next_tax_month_start(date(2020, 3, 20)), date(2020, 4, 6));
        assert!(opens_tax_year(date(2020, 4, 6)));
        assert!(!opens_tax_year(date(2020, 5, 6)));
        assert_eq!(first_tax_year_start_from(date(2020, 4, 7)), date(2021, 4, 6));
        assert_eq!(first_tax_year_start_from(date(2020, 1, 1)), date(2020, 4, 6));
    }
}
