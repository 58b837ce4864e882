//! Transaction moments
//!
//! Revaluations set new values on their TO subjects. Everything else moves
//! value for each pair of FROM and TO words in turn, categories expanded: the
//! amount leaving FROM is `fromChange`, the amount arriving at TO is
//! `toChange`. Proportional values multiply the FROM subject's current value
//! (FROM side) or `fromChange` (TO side); absolute values are taken as they
//! are.

use jiff::ToSpan;
use jiff::civil::Date;

use crate::cash_flows::{capital_gains_owners, income_tax_owners};
use crate::error::{DateError, Result, SimulationError};
use crate::model::{
    Asset, Moment, PensionFlow, RevalueTarget, Transaction, TransactionClass,
    tokens::{BOND_MATURITY, CASH, CPI, CRYSTALLIZED_PENSION, GRAIN},
};
use crate::simulation::ModelIndex;
use crate::simulation_state::SimulationState;
use crate::value_store::StoredValue;
use crate::values::{bond_target, split_composite, strip_bond_tag};

/// Sales may overshoot a non-negative holding by this much before being
/// treated as an overdraft
const CLAMP_TOLERANCE: f64 = 1e-5;

pub fn process_transaction(
    state: &mut SimulationState<'_>,
    index: &ModelIndex,
    moment: &Moment,
) -> Result<()> {
    let model = state.model;
    let i = moment
        .transaction
        .ok_or_else(|| SimulationError::missing("transaction", &moment.name))?;
    let t = model
        .transactions
        .get(i)
        .ok_or_else(|| SimulationError::missing("transaction", &moment.name))?;
    let date = moment.date;

    match index.class(i) {
        TransactionClass::Revalue(target) => revalue(state, t, target, date),
        TransactionClass::BondInvest { years } => bond_invest(state, t, years, date),
        TransactionClass::BondMature { .. } => bond_mature(state, t, date),
        TransactionClass::Pension(PensionFlow::DefinedBenefitTransfer) => {
            pension_transfer(state, t, date);
            Ok(())
        }
        TransactionClass::Pension(flow) if flow.consumed_by_income() => Ok(()),
        class => {
            let targets = model.expand_list(&t.to);
            for from in model.expand_list(&t.from) {
                if targets.is_empty() {
                    transfer(state, t, class, &from, None, date)?;
                }
                for to in &targets {
                    transfer(state, t, class, &from, Some(to.as_str()), date)?;
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Revaluation
// ============================================================================

/// New value from TO_VALUE: absolute, or proportional to `current`
fn revalued(state: &SimulationState<'_>, t: &Transaction, current: Option<f64>) -> Option<f64> {
    let value = state.resolve(&t.to_value)?;
    if t.to_absolute {
        Some(value)
    } else {
        Some(current? * value)
    }
}

fn revalue(
    state: &mut SimulationState<'_>,
    t: &Transaction,
    target: RevalueTarget,
    date: Date,
) -> Result<()> {
    let model = state.model;
    for name in model.expand_list(&t.to) {
        match target {
            RevalueTarget::Asset | RevalueTarget::Debt => {
                let asset = model
                    .asset(&name)
                    .ok_or_else(|| SimulationError::missing("asset", &name))?;
                revalue_asset(state, t, asset, date);
            }
            RevalueTarget::Setting if t.to_absolute && state.resolve(&t.to_value).is_none() => {
                state.set_stored(&name, StoredValue::parse(&t.to_value), date, &t.name);
            }
            RevalueTarget::Setting | RevalueTarget::Income | RevalueTarget::Expense => {
                match revalued(state, t, state.value(&name)) {
                    Some(value) => state.set_value(&name, value, date, &t.name),
                    None => tracing::debug!(name = %name, txn = %t.name, "revaluation unresolved"),
                }
            }
        }
    }
    Ok(())
}

fn revalue_asset(state: &mut SimulationState<'_>, t: &Transaction, asset: &Asset, date: Date) {
    let name = asset.name.as_str();
    let old = state.value(name);

    if asset.is_quantised() {
        let Some(price) = revalued(state, t, state.store.unit_price(name)) else {
            return;
        };
        state.set_unit_price(name, price, date, &t.name);
    } else {
        let Some(value) = revalued(state, t, old) else {
            return;
        };
        state.set_value(name, value, date, &t.name);
    }
    let Some(new) = state.value(name) else {
        return;
    };

    let cgt_owners: Vec<String> = capital_gains_owners(asset).collect();
    if !cgt_owners.is_empty() {
        let basis = state.store.purchase_price(name).unwrap_or(0.0);
        let gain = new - basis;
        if gain > 0.0 {
            let share = gain / cgt_owners.len() as f64;
            for owner in &cgt_owners {
                state.taxes.ledger.accrue_gain(owner, share);
            }
        }
        state.store.set_purchase_price(name, new);
    }

    let it_owners: Vec<String> = income_tax_owners(asset).collect();
    let gain = new - old.unwrap_or(0.0);
    if !it_owners.is_empty() && gain > 0.0 {
        let share = gain / it_owners.len() as f64;
        for owner in &it_owners {
            state.taxes.ledger.accrue_flexible(owner, share);
        }
    }
}

// ============================================================================
// Transfers
// ============================================================================

/// Remove the part of the CGT basis matching the fraction of `name` sold and
/// accrue the gain realised
fn realise_gain(state: &mut SimulationState<'_>, asset: &Asset, held: f64, sold: f64) {
    let owners: Vec<String> = capital_gains_owners(asset).collect();
    if owners.is_empty() || held <= 0.0 {
        return;
    }
    let Some(basis) = state.store.purchase_price(&asset.name) else {
        return;
    };
    let fraction = (sold / held).min(1.0);
    let basis_sold = basis * fraction;
    state
        .store
        .set_purchase_price(&asset.name, basis - basis_sold);
    let share = (sold - basis_sold) / owners.len() as f64;
    for owner in &owners {
        state.taxes.ledger.accrue_gain(owner, share);
    }
}

fn add_to_basis(state: &mut SimulationState<'_>, asset: &Asset, amount: f64) {
    if capital_gains_owners(asset).next().is_some() {
        let basis = state.store.purchase_price(&asset.name).unwrap_or(0.0);
        state.store.set_purchase_price(&asset.name, basis + amount);
    }
}

/// Whole units of a quantised holding worth `change`, rounded up for
/// conditional sales and down otherwise
fn units_sold(change: f64, price: f64, held: f64, conditional: bool) -> f64 {
    let wanted = change / price;
    let sold = if conditional { wanted.ceil() } else { wanted.floor() };
    sold.clamp(0.0, held)
}

fn transfer(
    state: &mut SimulationState<'_>,
    t: &Transaction,
    class: TransactionClass,
    from: &str,
    to: Option<&str>,
    date: Date,
) -> Result<()> {
    let model = state.model;
    let Some(from_value) = state.value(from) else {
        tracing::debug!(from, txn = %t.name, "transfer source has no value yet");
        return Ok(());
    };
    let Some(from_rate) = state.resolve(&t.from_value) else {
        tracing::debug!(txn = %t.name, value = %t.from_value, "FROM_VALUE unresolved");
        return Ok(());
    };
    let to_rate = state.resolve(&t.to_value).unwrap_or(1.0);
    let from_asset = model.asset(from);
    let to_asset = to.and_then(|to| model.asset(to));
    let conditional = class.is_conditional();

    let mut from_change = if t.from_absolute {
        from_rate
    } else {
        from_value * from_rate
    };

    if conditional {
        let Some(to) = to else {
            return Ok(());
        };
        let to_current = state.value(to).unwrap_or(0.0);
        if to_current >= 0.0 {
            return Ok(());
        }
        let proportion = if t.to_absolute { 1.0 } else { to_rate };
        if proportion <= 0.0 {
            return Ok(());
        }
        from_change = from_change.min(-to_current / proportion);
        if let Some(grain) = state.resolve(GRAIN).filter(|g| *g > 0.0) {
            from_change = (from_change / grain).ceil() * grain;
        }
    }

    let mut units = None;
    if let Some(asset) = from_asset.filter(|a| a.is_quantised()) {
        let price = state.store.unit_price(from).unwrap_or(0.0);
        if price <= 0.0 {
            tracing::debug!(from, txn = %t.name, price, "unit price not positive, transfer skipped");
            return Ok(());
        }
        let held = state.store.quantity(from).unwrap_or(0.0);
        let sold = units_sold(from_change, price, held, conditional);
        from_change = sold * price;
        units = Some((asset, held, price, sold));
    }

    let may_go_negative = from_asset.is_none_or(|a| a.can_be_negative || a.is_a_debt);
    if !may_go_negative && from_change > from_value {
        if from_change - from_value > CLAMP_TOLERANCE {
            tracing::debug!(from, txn = %t.name, from_change, from_value, "sale clamped to holding");
        }
        from_change = from_value.max(0.0);
    }

    let mut to_change = if t.to_absolute {
        to_rate
    } else {
        from_change * to_rate
    };

    // Purchases of quantised holdings buy whole units
    let mut bought = None;
    if let (Some(to), Some(asset)) = (to, to_asset.filter(|a| a.is_quantised())) {
        let price = state.store.unit_price(to).unwrap_or(0.0);
        if price > 0.0 {
            let whole = (to_change / price).floor().max(0.0);
            to_change = whole * price;
            if !t.to_absolute && to_rate > 0.0 {
                from_change = from_change.min(to_change / to_rate);
                if let Some((_, held, from_price, sold)) = &mut units {
                    *sold = units_sold(from_change, *from_price, *held, conditional);
                    from_change = *sold * *from_price;
                }
            }
            bought = Some((asset, whole));
        }
    }

    if from_change <= 0.0 {
        return Ok(());
    }

    if let Some(asset) = from_asset {
        realise_gain(state, asset, from_value, from_change);
    }
    match units {
        Some((asset, held, _, sold)) => {
            state.set_quantity(&asset.name, held - sold, date, &t.name);
        }
        None => state.set_value(from, from_value - from_change, date, &t.name),
    }

    let Some(to) = to else {
        return Ok(());
    };
    credit(state, t, from_asset, to, to_change, bought, date);
    Ok(())
}

fn credit(
    state: &mut SimulationState<'_>,
    t: &Transaction,
    from_asset: Option<&Asset>,
    to: &str,
    to_change: f64,
    bought: Option<(&Asset, f64)>,
    date: Date,
) {
    if to == CASH
        && let Some(pension) = from_asset.filter(|a| a.name.starts_with(CRYSTALLIZED_PENSION))
    {
        state.adjust_cash(to_change, date, &t.name);
        let owners: Vec<String> = income_tax_owners(pension).collect();
        if !owners.is_empty() {
            let share = to_change / owners.len() as f64;
            for owner in &owners {
                state.taxes.ledger.accrue_flexible(owner, share);
            }
        }
        return;
    }

    match bought {
        Some((asset, whole)) => {
            let held = state.store.quantity(to).unwrap_or(0.0);
            state.set_quantity(to, held + whole, date, &t.name);
            add_to_basis(state, asset, to_change);
        }
        None => {
            state.adjust(to, to_change, date, &t.name);
            if let Some(asset) = state.model.asset(to) {
                add_to_basis(state, asset, to_change);
            }
        }
    }
}

/// Move a proportion of a defined-benefit income to another income and stop
/// the original
fn pension_transfer(state: &mut SimulationState<'_>, t: &Transaction, date: Date) {
    let model = state.model;
    let (Some(from), Some(to)) = (t.from_words().next(), t.to_words().next()) else {
        return;
    };
    let Some(source) = state.value(from) else {
        return;
    };
    let proportion = state.resolve(&t.to_value).unwrap_or(1.0);
    let moved = if t.to_absolute {
        proportion
    } else {
        source * proportion
    };
    if model.income(to).is_some() {
        state.adjust(to, moved, date, &t.name);
    }
    state.set_value(from, 0.0, date, &t.name);
}

// ============================================================================
// Bonds
// ============================================================================

/// Name of the generated setting carrying the value a bond must reach
pub fn generated_bond_setting(target: &str, maturity: Date) -> String {
    format!("{BOND_MATURITY}{target} {maturity}")
}

fn bond_invest(
    state: &mut SimulationState<'_>,
    t: &Transaction,
    years: u32,
    date: Date,
) -> Result<()> {
    let Some(target) = bond_target(&t.from_value) else {
        return Ok(());
    };
    let multiplier = strip_bond_tag(&t.from_value)
        .and_then(split_composite)
        .map_or(1.0, |(n, _)| n);
    let maturity = date
        .checked_add(i64::from(years).years())
        .map_err(|_| SimulationError::Date {
            context: format!("maturity of {}", t.name),
            source: DateError::OutOfRange(date.to_string()),
        })?;
    let Some(maturity_value) = state.value(&generated_bond_setting(target, maturity)) else {
        tracing::debug!(txn = %t.name, %maturity, "no maturity value generated, bond skipped");
        return Ok(());
    };
    let maturity_value = maturity_value * multiplier;

    let Some(to) = t.to_words().next() else {
        return Ok(());
    };
    let years = i32::try_from(years).unwrap_or(i32::MAX);
    let mut compounding = 1.0;
    if let Some(growth) = state.store.growth(to) {
        compounding *= growth.monthly_scale.powi(years.saturating_mul(12));
        if growth.cpi_adjusted {
            let cpi = state.value(CPI).unwrap_or(0.0);
            compounding *= (1.0 + cpi / 100.0).powi(years);
        }
    }
    let invested = maturity_value / compounding;

    for from in t.from_words() {
        state.adjust(from, -invested, date, &t.name);
    }
    state.adjust(to, invested, date, &t.name);
    state.bonds.record(target, maturity, maturity_value);
    Ok(())
}

fn bond_mature(state: &mut SimulationState<'_>, t: &Transaction, date: Date) -> Result<()> {
    let Some(target) = bond_target(&t.from_value) else {
        return Ok(());
    };
    let Some(promised) = state.bonds.take(target, date) else {
        tracing::debug!(txn = %t.name, %date, "no bond matures here");
        return Ok(());
    };
    let Some(from) = t.from_words().next() else {
        return Ok(());
    };
    let available = state.value(from).unwrap_or(0.0);
    let paid = promised.min(available).max(0.0);
    if paid <= 0.0 {
        return Ok(());
    }
    state.adjust(from, -paid, date, &t.name);
    for to in t.to_words() {
        state.adjust(to, paid, date, &t.name);
    }
    Ok(())
}
