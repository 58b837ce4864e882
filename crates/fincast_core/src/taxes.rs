//! UK income tax, National Insurance and capital gains tax
//!
//! Income is accrued per liability (person and kind of tax) as it is paid.
//! Fixed income (salaries, pensions in payment) drives a monthly estimate paid
//! from cash at every tax-month boundary. At each tax-year boundary the year's
//! true liability is computed from everything accrued, including flexible
//! income such as pension drawdown, and the difference from the estimates is
//! settled. Capital gains are only settled annually.

use std::collections::BTreeMap;

use jiff::ToSpan;
use jiff::civil::Date;

use crate::date_math::{next_tax_month_start, opens_tax_year, tax_year_of};
use crate::model::{Liability, TaxKind, TaxTable, TaxYearBands, tokens};
use crate::simulation_state::SimulationState;

/// A band of taxable amount starting at `threshold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub threshold: f64,
    pub rate: f64,
}

/// Tax on `amount` using progressive brackets sorted by threshold
pub fn progressive_tax(amount: f64, brackets: &[TaxBracket]) -> f64 {
    if amount <= 0.0 || brackets.is_empty() {
        return 0.0;
    }

    let mut tax = 0.0;
    for (i, bracket) in brackets.iter().enumerate() {
        if amount <= bracket.threshold {
            break;
        }
        let next_threshold = brackets
            .get(i + 1)
            .map_or(f64::INFINITY, |b| b.threshold);
        tax += (amount.min(next_threshold) - bracket.threshold) * bracket.rate;
    }
    tax
}

fn floor_to_pence(amount: f64) -> f64 {
    (amount * 100.0).floor() / 100.0
}

/// Band lookup and tax arithmetic over an injected table
#[derive(Debug, Clone)]
pub struct TaxEngine<'t> {
    table: &'t TaxTable,
    /// Annual CPI index in force for the last tax year the table defines
    anchor_index: Option<f64>,
}

impl<'t> TaxEngine<'t> {
    pub fn new(table: &'t TaxTable) -> Self {
        Self {
            table,
            anchor_index: None,
        }
    }

    /// Bands for a tax year. Past the table's end, thresholds follow the
    /// annual CPI index relative to the last defined year.
    pub fn bands(&mut self, tax_year: i16, annual_index: f64) -> Option<TaxYearBands> {
        let bands = *self.table.bands_for(tax_year)?;
        if !self.table.is_beyond(tax_year) {
            self.anchor_index = Some(annual_index);
            return Some(bands);
        }
        let anchor = *self.anchor_index.get_or_insert(annual_index);
        let factor = if anchor > 0.0 {
            annual_index / anchor
        } else {
            1.0
        };
        Some(bands.scaled(factor))
    }

    pub fn personal_allowance(&self, income: f64, bands: &TaxYearBands) -> f64 {
        let excess = (income - self.table.taper_threshold).max(0.0);
        (bands.personal_allowance - excess * self.table.taper_rate).max(0.0)
    }

    fn basic_band(bands: &TaxYearBands) -> f64 {
        (bands.higher_rate_threshold - bands.personal_allowance).max(0.0)
    }

    fn taxable_income(&self, income: f64, bands: &TaxYearBands) -> f64 {
        (income - self.personal_allowance(income, bands)).max(0.0)
    }

    pub fn income_tax(&self, income: f64, bands: &TaxYearBands) -> f64 {
        let brackets = [
            TaxBracket {
                threshold: 0.0,
                rate: bands.basic_rate,
            },
            TaxBracket {
                threshold: Self::basic_band(bands),
                rate: bands.higher_rate,
            },
            TaxBracket {
                threshold: bands.additional_rate_threshold,
                rate: bands.additional_rate,
            },
        ];
        progressive_tax(self.taxable_income(income, bands), &brackets)
    }

    pub fn national_insurance(&self, income: f64, bands: &TaxYearBands) -> f64 {
        let brackets = [
            TaxBracket {
                threshold: bands.ni_primary_threshold,
                rate: bands.ni_main_rate,
            },
            TaxBracket {
                threshold: bands.ni_upper_earnings_limit,
                rate: bands.ni_upper_rate,
            },
        ];
        progressive_tax(income, &brackets)
    }

    /// CGT on a year's gains. The low rate applies up to whatever remains of
    /// the basic-rate band after `income`.
    pub fn capital_gains_tax(&self, gains: f64, income: f64, bands: &TaxYearBands) -> f64 {
        let net = (gains - bands.cgt_annual_exempt).max(0.0);
        let headroom = (Self::basic_band(bands) - self.taxable_income(income, bands)).max(0.0);
        let low = net.min(headroom);
        low * bands.cgt_low_rate + (net - low) * bands.cgt_high_rate
    }

    /// One month's instalment, projecting the month's income over a year
    pub fn monthly_estimate(&self, kind: TaxKind, month_income: f64, bands: &TaxYearBands) -> f64 {
        let annual = month_income * 12.0;
        let liability = match kind {
            TaxKind::IncomeTax => self.income_tax(annual, bands),
            TaxKind::NationalInsurance => self.national_insurance(annual, bands),
            TaxKind::CapitalGains => 0.0,
        };
        floor_to_pence(liability / 12.0)
    }

    pub fn liability(&self, kind: TaxKind, income: f64, bands: &TaxYearBands) -> f64 {
        match kind {
            TaxKind::IncomeTax => self.income_tax(income, bands),
            TaxKind::NationalInsurance => self.national_insurance(income, bands),
            TaxKind::CapitalGains => 0.0,
        }
    }
}

/// Amounts accrued against one liability
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxAccrual {
    pub month_fixed: f64,
    pub year_fixed: f64,
    /// Flexible income, or gains for a CGT liability
    pub year_flexible: f64,
    pub estimates_paid: f64,
}

impl TaxAccrual {
    pub fn year_total(&self) -> f64 {
        self.year_fixed + self.year_flexible
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaxLedger {
    pub accruals: BTreeMap<Liability, TaxAccrual>,
    /// First tax-month boundary not yet settled
    pub next_boundary: Option<Date>,
}

impl TaxLedger {
    fn entry(&mut self, person: &str, kind: TaxKind) -> &mut TaxAccrual {
        self.accruals
            .entry(Liability {
                person: person.to_string(),
                kind,
            })
            .or_default()
    }

    /// Regular income, included in monthly estimates
    pub fn accrue_fixed(&mut self, liability: &Liability, amount: f64) {
        let accrual = self.entry(&liability.person, liability.kind);
        accrual.month_fixed += amount;
        accrual.year_fixed += amount;
    }

    /// Irregular income, settled at the year end only
    pub fn accrue_flexible(&mut self, person: &str, amount: f64) {
        self.entry(person, TaxKind::IncomeTax).year_flexible += amount;
    }

    pub fn accrue_gain(&mut self, person: &str, amount: f64) {
        self.entry(person, TaxKind::CapitalGains).year_flexible += amount;
    }

    pub fn year_income(&self, person: &str) -> f64 {
        self.accruals
            .get(&Liability {
                person: person.to_string(),
                kind: TaxKind::IncomeTax,
            })
            .map_or(0.0, TaxAccrual::year_total)
    }
}

/// Settle every tax-month (and tax-year) boundary on or before `date`
pub fn settle_due(state: &mut SimulationState<'_>, date: Date) {
    let mut boundary = match state.taxes.ledger.next_boundary {
        Some(boundary) => boundary,
        None => {
            state.taxes.ledger.next_boundary = Some(next_tax_month_start(date));
            return;
        }
    };
    while date >= boundary {
        settle_month(state, boundary);
        if opens_tax_year(boundary) {
            settle_year(state, boundary);
        }
        boundary = boundary.saturating_add(1.month());
        state.taxes.ledger.next_boundary = Some(boundary);
    }
}

fn bands_for_period(state: &mut SimulationState<'_>, boundary: Date) -> Option<TaxYearBands> {
    let closing_year = tax_year_of(boundary.saturating_sub(1.day()));
    let annual_index = state.store.annual_cpi_index();
    state.taxes.engine.bands(closing_year, annual_index)
}

/// Pay the monthly estimate for the tax month ending at `boundary`
fn settle_month(state: &mut SimulationState<'_>, boundary: Date) {
    let Some(bands) = bands_for_period(state, boundary) else {
        return;
    };
    let mut payments = Vec::new();
    for (liability, accrual) in state.taxes.ledger.accruals.iter_mut() {
        if accrual.month_fixed <= 0.0 {
            continue;
        }
        let estimate = state
            .taxes
            .engine
            .monthly_estimate(liability.kind, accrual.month_fixed, &bands);
        accrual.month_fixed = 0.0;
        if estimate > 0.0 {
            accrual.estimates_paid += estimate;
            payments.push((liability.subject(), estimate));
        }
    }
    for (subject, estimate) in payments {
        state.adjust_cash(-estimate, boundary, &subject);
    }
}

/// Draw crystallized pensions into cash up to each owner's unused allowance
fn sweep_crystallized_pensions(state: &mut SimulationState<'_>, boundary: Date, bands: &TaxYearBands) {
    let model = state.model;
    for asset in &model.assets {
        if !asset.name.starts_with(tokens::CRYSTALLIZED_PENSION) {
            continue;
        }
        let Some(owner) = asset
            .liabilities()
            .filter_map(Liability::parse)
            .find(|l| l.kind == TaxKind::IncomeTax)
        else {
            continue;
        };
        let Some(balance) = state.value(&asset.name) else {
            continue;
        };
        let income = state.taxes.ledger.year_income(&owner.person);
        let unused = state.taxes.engine.personal_allowance(income, bands) - income;
        let amount = unused.min(balance);
        if amount <= 0.0 {
            continue;
        }
        tracing::debug!(asset = %asset.name, amount, "drawing pension within allowance");
        state.set_value(&asset.name, balance - amount, boundary, &asset.name);
        state.adjust_cash(amount, boundary, &asset.name);
        state.taxes.ledger.accrue_flexible(&owner.person, amount);
    }
}

/// Settle the tax year closing at `boundary` and reset the accumulators
fn settle_year(state: &mut SimulationState<'_>, boundary: Date) {
    let Some(bands) = bands_for_period(state, boundary) else {
        return;
    };
    sweep_crystallized_pensions(state, boundary, &bands);

    let ledger = std::mem::take(&mut state.taxes.ledger.accruals);
    let persons = {
        let mut persons: Vec<&str> = ledger.keys().map(|l| l.person.as_str()).collect();
        persons.dedup();
        persons
    };
    for person in persons {
        let income = ledger
            .get(&Liability {
                person: person.to_string(),
                kind: TaxKind::IncomeTax,
            })
            .map_or(0.0, TaxAccrual::year_total);
        for kind in TaxKind::ALL {
            let Some(accrual) = ledger.get(&Liability {
                person: person.to_string(),
                kind,
            }) else {
                continue;
            };
            let liability = match kind {
                TaxKind::CapitalGains => {
                    state
                        .taxes
                        .engine
                        .capital_gains_tax(accrual.year_flexible, income, &bands)
                }
                _ => state.taxes.engine.liability(kind, accrual.year_total(), &bands),
            };
            let liability = floor_to_pence(liability);
            if liability == 0.0 && accrual.estimates_paid == 0.0 {
                continue;
            }
            let subject = kind.subject(person);
            state.set_value(&subject, liability, boundary, &subject);
            let balance = liability - accrual.estimates_paid;
            if balance != 0.0 {
                state.adjust_cash(-balance, boundary, &subject);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_and_bands(year: i16) -> (TaxTable, TaxYearBands) {
        let table = TaxTable::uk();
        let bands = table.bands_for(year).copied().unwrap();
        (table, bands)
    }

    #[test]
    fn test_progressive_tax() {
        let brackets = [
            TaxBracket {
                threshold: 0.0,
                rate: 0.1,
            },
            TaxBracket {
                threshold: 100.0,
                rate: 0.5,
            },
        ];
        assert_eq!(progressive_tax(50.0, &brackets), 5.0);
        assert_eq!(progressive_tax(200.0, &brackets), 60.0);
        assert_eq!(progressive_tax(-10.0, &brackets), 0.0);
    }

    #[test]
    fn test_income_tax_bands() {
        let (table, bands) = engine_and_bands(2019);
        let engine = TaxEngine::new(&table);
        assert_eq!(engine.income_tax(12_000.0, &bands), 0.0);
        assert!((engine.income_tax(20_000.0, &bands) - 1_500.0).abs() < 1e-9);
        assert!((engine.income_tax(60_000.0, &bands) - 11_500.0).abs() < 1e-9);
        // allowance halves away above 100k: 110k keeps 7_500 of it
        assert!((engine.personal_allowance(110_000.0, &bands) - 7_500.0).abs() < 1e-9);
        assert!((engine.income_tax(110_000.0, &bands) - 33_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_national_insurance() {
        let (table, bands) = engine_and_bands(2019);
        let engine = TaxEngine::new(&table);
        assert!((engine.national_insurance(30_000.0, &bands) - 2_564.16).abs() < 1e-9);
        let above = engine.national_insurance(60_000.0, &bands);
        let expected = (50_000.0 - 8_632.0) * 0.12 + 10_000.0 * 0.02;
        assert!((above - expected).abs() < 1e-9);
    }

    #[test]
    fn test_capital_gains_split() {
        let (table, bands) = engine_and_bands(2019);
        let engine = TaxEngine::new(&table);
        assert_eq!(engine.capital_gains_tax(10_000.0, 0.0, &bands), 0.0);
        // 8_000 net gain fits inside the remaining basic band
        assert!((engine.capital_gains_tax(20_000.0, 20_000.0, &bands) - 800.0).abs() < 1e-9);
        // no headroom left: all at the high rate
        assert!((engine.capital_gains_tax(20_000.0, 80_000.0, &bands) - 1_600.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_estimate_floors_to_pence() {
        let (table, bands) = engine_and_bands(2019);
        let engine = TaxEngine::new(&table);
        let estimate = engine.monthly_estimate(TaxKind::IncomeTax, 5_000.0, &bands);
        assert_eq!(estimate, 958.33);
    }

    #[test]
    fn test_bands_scale_past_table() {
        let table = TaxTable::uk();
        let mut engine = TaxEngine::new(&table);
        let last = engine.bands(2024, 1.5).map(|b| b.personal_allowance);
        assert_eq!(last, Some(12_570.0));
        let later = engine.bands(2026, 3.0).map(|b| b.personal_allowance);
        assert_eq!(later, Some(25_140.0));
    }
}
