//! Moment generation
//!
//! Expands the model's entities into the flat list of dated moments the
//! scheduler consumes. Sequences run up to, but not including, the end of the
//! view range.

use std::str::FromStr;

use jiff::ToSpan;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::date_math::{DateResolver, first_tax_year_start_from};
use crate::error::{Result, SimulationError};
use crate::model::{
    ModelData, Moment, MomentKind, Recurrence, classify,
    tokens::{self, CPI},
};

/// How often the caller wants to view results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewFrequency {
    #[default]
    Monthly,
    Annually,
    Weekly,
}

impl FromStr for ViewFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            tokens::MONTHLY => Ok(ViewFrequency::Monthly),
            tokens::ANNUALLY => Ok(ViewFrequency::Annually),
            tokens::WEEKLY => Ok(ViewFrequency::Weekly),
            other => Err(format!("unknown view frequency '{other}'")),
        }
    }
}

/// What to generate beyond the model's own entities
#[derive(Debug, Clone, Default)]
pub struct MomentOptions<'o> {
    pub frequency: ViewFrequency,
    pub today: Option<Date>,
    /// Bond pre-pass: (target setting, maturity date) pairs to sample
    pub probes: &'o [(String, Date)],
}

/// Name carried by inflation moments
pub const INFLATION_SUBJECT: &str = CPI;
/// Name carried by the snapshot moment
pub const TODAY_SUBJECT: &str = "Today";

struct FlowKinds {
    start: MomentKind,
    start_prep: MomentKind,
    repeat: MomentKind,
}

const INCOME_KINDS: FlowKinds = FlowKinds {
    start: MomentKind::IncomeStart,
    start_prep: MomentKind::IncomeStartPrep,
    repeat: MomentKind::Income,
};

const EXPENSE_KINDS: FlowKinds = FlowKinds {
    start: MomentKind::ExpenseStart,
    start_prep: MomentKind::ExpenseStartPrep,
    repeat: MomentKind::Expense,
};

struct FlowSpec<'e> {
    name: &'e str,
    start: &'e str,
    end: &'e str,
    value: &'e str,
    value_set: &'e str,
    recurrence: &'e str,
}

pub fn generate_moments(
    model: &ModelData,
    range: (Date, Date),
    options: &MomentOptions<'_>,
) -> Result<Vec<Moment>> {
    let resolver = DateResolver::new(model);
    let roi_end = range.1;
    let mut moments = Vec::new();

    for income in &model.incomes {
        let spec = FlowSpec {
            name: &income.name,
            start: &income.start,
            end: &income.end,
            value: &income.value,
            value_set: &income.value_set,
            recurrence: &income.recurrence,
        };
        flow_moments(&resolver, &spec, &INCOME_KINDS, roi_end, &mut moments)?;
    }
    for expense in &model.expenses {
        let spec = FlowSpec {
            name: &expense.name,
            start: &expense.start,
            end: &expense.end,
            value: &expense.value,
            value_set: &expense.value_set,
            recurrence: &expense.recurrence,
        };
        flow_moments(&resolver, &spec, &EXPENSE_KINDS, roi_end, &mut moments)?;
    }

    for asset in &model.assets {
        let start = resolver
            .resolve(&asset.start)
            .map_err(SimulationError::date(format!("start of asset {}", asset.name)))?;
        if start >= roi_end {
            continue;
        }
        moments.push(Moment::seeded(
            start,
            asset.name.as_str(),
            MomentKind::AssetStart,
            &asset.value,
        ));
        moments.extend(
            Recurrence::MONTHLY
                .dates_until(start, roi_end)
                .into_iter()
                .skip(1)
                .map(|d| Moment::new(d, asset.name.as_str(), MomentKind::Asset)),
        );
        if options.frequency == ViewFrequency::Weekly {
            moments.extend(
                Recurrence::WEEKLY
                    .dates_until(start, roi_end)
                    .into_iter()
                    .skip(1)
                    .map(|d| Moment::new(d, asset.name.as_str(), MomentKind::AssetTracking)),
            );
        }
    }

    for (index, t) in model.transactions.iter().enumerate() {
        if classify(t)?.consumed_by_income() {
            continue;
        }
        let date = resolver
            .resolve(&t.date)
            .map_err(SimulationError::date(format!("date of transaction {}", t.name)))?;
        if t.recurrence.trim().is_empty() {
            if date < roi_end {
                moments.push(Moment::for_transaction(date, t.name.as_str(), index));
            }
            continue;
        }
        let recurrence: Recurrence = t.recurrence.parse()?;
        let stop = resolver
            .resolve_optional(&t.stop_date)
            .map_err(SimulationError::date(format!("stop date of transaction {}", t.name)))?
            .map_or(roi_end, |stop| stop.min(roi_end));
        moments.extend(
            recurrence
                .dates_until(date, stop)
                .into_iter()
                .map(|d| Moment::for_transaction(d, t.name.as_str(), index)),
        );
    }

    moments.extend(
        options
            .probes
            .iter()
            .map(|(target, date)| Moment::new(*date, target.as_str(), MomentKind::BondProbe)),
    );
    if let Some(today) = options.today
        && (range.0..=range.1).contains(&today)
    {
        moments.push(Moment::new(today, TODAY_SUBJECT, MomentKind::Today));
    }

    inflation_moments(&mut moments);
    Ok(moments)
}

fn flow_moments(
    resolver: &DateResolver,
    spec: &FlowSpec<'_>,
    kinds: &FlowKinds,
    roi_end: Date,
    moments: &mut Vec<Moment>,
) -> Result<()> {
    let start = resolver
        .resolve(spec.start)
        .map_err(SimulationError::date(format!("start of {}", spec.name)))?;
    let end = resolver
        .resolve_optional(spec.end)
        .map_err(SimulationError::date(format!("end of {}", spec.name)))?
        .map_or(roi_end, |end| end.min(roi_end));
    let value_set = resolver
        .resolve_optional(spec.value_set)
        .map_err(SimulationError::date(format!("value set date of {}", spec.name)))?
        .unwrap_or(start);
    let recurrence: Recurrence = spec.recurrence.parse()?;

    let first = recurrence.align_back(start, value_set);
    for (i, date) in recurrence.dates_until(first, end).into_iter().enumerate() {
        let moment = match i {
            0 if first < start => Moment::seeded(date, spec.name, kinds.start_prep, spec.value),
            0 => Moment::seeded(date, spec.name, kinds.start, spec.value),
            _ => Moment::new(date, spec.name, kinds.repeat),
        };
        moments.push(moment);
    }
    Ok(())
}

/// Monthly CPI moments from a year before the earliest real moment through
/// the last moment, plus an annual snapshot on every 6 April in that span
fn inflation_moments(moments: &mut Vec<Moment>) {
    let Some(earliest) = moments
        .iter()
        .filter(|m| m.kind.is_real())
        .map(|m| m.date)
        .min()
    else {
        return;
    };
    let Some(last) = moments.iter().map(|m| m.date).max() else {
        return;
    };
    let first = earliest.saturating_sub(1.year());
    let until = last.saturating_add(1.day());

    let monthly: Vec<Moment> = Recurrence::MONTHLY
        .dates_until(first, until)
        .into_iter()
        .map(|d| Moment::new(d, INFLATION_SUBJECT, MomentKind::Inflation))
        .collect();
    let annual: Vec<Moment> = Recurrence {
        count: 1,
        unit: crate::model::RecurrenceUnit::Year,
    }
    .dates_until(first_tax_year_start_from(first), until)
    .into_iter()
    .map(|d| Moment::new(d, INFLATION_SUBJECT, MomentKind::InflationAnnual))
    .collect();

    moments.extend(monthly);
    moments.extend(annual);
}
