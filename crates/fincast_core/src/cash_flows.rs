//! Asset, income and expense moments
//!
//! Seeds values at start moments, applies monthly growth, pays incomes into
//! cash (net of pension contributions drawn from them) and accrues the income
//! against each liability it carries.

use jiff::civil::Date;

use crate::error::{Result, SimulationError};
use crate::model::{
    Asset, Income, Liability, Moment, MomentKind, PensionFlow, TaxKind, TransactionClass,
};
use crate::simulation::ModelIndex;
use crate::simulation_state::SimulationState;

/// Seed a value from a start moment. A subject that already holds a value
/// (accrued before its start, e.g. defined-benefit accrual) keeps it and has
/// the literal added.
fn seed(state: &mut SimulationState<'_>, moment: &Moment) {
    let Some(literal) = moment.seed.as_deref() else {
        return;
    };
    let Some(value) = state.resolve(literal) else {
        tracing::debug!(name = %moment.name, literal, "start value unresolved, skipping seed");
        return;
    };
    let existing = state.value(&moment.name).unwrap_or(0.0);
    state.set_value(&moment.name, existing + value, moment.date, &moment.name);
}

pub fn process_asset(state: &mut SimulationState<'_>, moment: &Moment) -> Result<()> {
    match moment.kind {
        MomentKind::AssetStart => {
            let model = state.model;
            let asset = model
                .asset(&moment.name)
                .ok_or_else(|| SimulationError::missing("asset", &moment.name))?;
            start_asset(state, asset, moment);
        }
        MomentKind::Asset => state.grow(&moment.name, moment.date),
        MomentKind::AssetTracking => state.track(&moment.name, moment.date),
        _ => {}
    }
    Ok(())
}

fn start_asset(state: &mut SimulationState<'_>, asset: &Asset, moment: &Moment) {
    let Some(value) = moment.seed.as_deref().and_then(|s| state.resolve(s)) else {
        tracing::debug!(asset = %asset.name, "start value unresolved, asset not started");
        return;
    };
    if asset.is_quantised() {
        let quantity = state.resolve(&asset.quantity).unwrap_or(0.0);
        state.store.set_unit_price(&asset.name, value);
        state.set_quantity(&asset.name, quantity, moment.date, &asset.name);
    } else {
        state.set_value(&asset.name, value, moment.date, &asset.name);
    }

    if capital_gains_owners(asset).next().is_some() {
        let basis = state
            .resolve(&asset.purchase_price)
            .or_else(|| state.value(&asset.name))
            .unwrap_or(0.0);
        state.store.set_purchase_price(&asset.name, basis);
    }
}

/// People owing CGT on an asset
pub fn capital_gains_owners(asset: &Asset) -> impl Iterator<Item = String> + '_ {
    owners(asset.liabilities(), TaxKind::CapitalGains)
}

/// People owing income tax on an asset
pub fn income_tax_owners(asset: &Asset) -> impl Iterator<Item = String> + '_ {
    owners(asset.liabilities(), TaxKind::IncomeTax)
}

fn owners<'a>(
    words: impl Iterator<Item = &'a str> + 'a,
    kind: TaxKind,
) -> impl Iterator<Item = String> + 'a {
    words
        .filter_map(Liability::parse)
        .filter(move |l| l.kind == kind)
        .map(|l| l.person)
}

/// True once a flow's sequence has reached its START date
fn has_started(index: &ModelIndex, moment: &Moment) -> bool {
    index
        .flow_start(&moment.name)
        .is_none_or(|start| moment.date >= start)
}

pub fn process_income(
    state: &mut SimulationState<'_>,
    index: &ModelIndex,
    moment: &Moment,
) -> Result<()> {
    let model = state.model;
    let income = model
        .income(&moment.name)
        .ok_or_else(|| SimulationError::missing("income", &moment.name))?;
    seed(state, moment);
    if moment.kind == MomentKind::IncomeStartPrep || !has_started(index, moment) {
        return Ok(());
    }
    let Some(amount) = state.value(&income.name) else {
        return Ok(());
    };
    pay_income(state, index, income, amount, moment.date)
}

pub fn process_expense(
    state: &mut SimulationState<'_>,
    index: &ModelIndex,
    moment: &Moment,
) -> Result<()> {
    if state.model.expense(&moment.name).is_none() {
        return Err(SimulationError::missing("expense", &moment.name));
    }
    seed(state, moment);
    if moment.kind == MomentKind::ExpenseStartPrep || !has_started(index, moment) {
        return Ok(());
    }
    if let Some(amount) = state.value(&moment.name) {
        state.adjust_cash(-amount, moment.date, &moment.name);
    }
    Ok(())
}

/// Tax relief granted by pension contributions from one payment
#[derive(Debug, Default, Clone, Copy)]
struct Relief {
    income_tax: f64,
    national_insurance: f64,
}

fn pay_income(
    state: &mut SimulationState<'_>,
    index: &ModelIndex,
    income: &Income,
    amount: f64,
    date: Date,
) -> Result<()> {
    let model = state.model;
    let mut to_cash = amount;
    let mut relief = Relief::default();

    for &i in index.pensions_drawn_from(&income.name) {
        if !index.is_active(i, date) {
            continue;
        }
        let t = &model.transactions[i];
        let Some(rate) = state.resolve(&t.from_value) else {
            continue;
        };
        let contribution = if t.from_absolute { rate } else { amount * rate };
        let to_rate = state.resolve(&t.to_value).unwrap_or(1.0);
        let Some(to) = t.to_words().next() else {
            continue;
        };
        match index.class(i) {
            TransactionClass::Pension(PensionFlow::Contribution { salary_sacrifice }) => {
                let credit = if t.to_absolute {
                    to_rate
                } else {
                    contribution * to_rate
                };
                state.adjust(to, credit, date, &t.name);
                relief.income_tax += contribution;
                if salary_sacrifice {
                    relief.national_insurance += contribution;
                }
            }
            TransactionClass::Pension(PensionFlow::DefinedBenefitAccrual) => {
                let accrual = if t.to_absolute {
                    to_rate
                } else {
                    amount * to_rate
                };
                state.adjust(to, accrual, date, &t.name);
                relief.income_tax += contribution;
            }
            _ => continue,
        }
        to_cash -= contribution;
    }

    state.adjust_cash(to_cash, date, &income.name);

    for liability in income.liabilities().filter_map(Liability::parse) {
        let relieved = match liability.kind {
            TaxKind::IncomeTax => relief.income_tax,
            TaxKind::NationalInsurance => relief.national_insurance,
            TaxKind::CapitalGains => continue,
        };
        state
            .taxes
            .ledger
            .accrue_fixed(&liability, (amount - relieved).max(0.0));
    }
    Ok(())
}
