//! Integration tests for the simulation engine
//!
//! Tests are organized by topic:
//! - `validator` - model checks and rejected runs
//! - `scenarios` - small end-to-end households
//! - `transactions` - transfers, quantised holdings, conditionals, pensions
//! - `taxes` - monthly estimates and year-end settlement
//! - `bonds` - bond investment priced by the pre-pass
//! - `properties` - determinism, chronology, conservation, reporting

mod properties;
mod taxes;
mod transactions;

use jiff::civil::{Date, date};

use crate::model::{
    Asset, Expense, Income, ModelData, Setting, SimulationOutput, Transaction, tokens,
};
use crate::simulation::{SimulationOptions, run_simulation};

fn setting(name: &str, value: &str) -> Setting {
    Setting {
        name: name.to_string(),
        value: value.to_string(),
        ..Default::default()
    }
}

/// A valid model holding nothing but the required settings
fn empty_model(start: &str, end: &str, cpi: &str) -> ModelData {
    let mut settings = vec![
        setting(tokens::ROI_START, start),
        setting(tokens::ROI_END, end),
        setting(tokens::BIRTH_DATE, ""),
        setting(tokens::CPI, cpi),
        setting(tokens::VIEW_FREQUENCY, tokens::MONTHLY),
    ];
    for focus in [
        tokens::ASSET_CHART_FOCUS,
        tokens::DEBT_CHART_FOCUS,
        tokens::INCOME_CHART_FOCUS,
        tokens::EXPENSE_CHART_FOCUS,
        tokens::TAX_CHART_FOCUS_PERSON,
        tokens::TAX_CHART_FOCUS_TYPE,
    ] {
        settings.push(setting(focus, tokens::ALL_ITEMS));
    }
    ModelData {
        name: "test model".to_string(),
        settings,
        ..Default::default()
    }
}

/// A CPI-immune asset without growth
fn asset(name: &str, value: &str, start: &str) -> Asset {
    Asset {
        name: name.to_string(),
        category: String::new(),
        start: start.to_string(),
        value: value.to_string(),
        growth: "0".to_string(),
        cpi_immune: true,
        ..Default::default()
    }
}

/// A CPI-immune monthly income
fn income(name: &str, value: &str, start: &str, liability: &str) -> Income {
    Income {
        name: name.to_string(),
        start: start.to_string(),
        value: value.to_string(),
        cpi_immune: true,
        recurrence: "1m".to_string(),
        liability: liability.to_string(),
        ..Default::default()
    }
}

/// A CPI-immune monthly expense
fn expense(name: &str, value: &str, start: &str) -> Expense {
    Expense {
        name: name.to_string(),
        start: start.to_string(),
        value: value.to_string(),
        cpi_immune: true,
        recurrence: "1m".to_string(),
        ..Default::default()
    }
}

/// A one-off custom transaction, proportional on both sides unless changed
fn transaction(name: &str, from: &str, from_value: &str, to: &str, when: &str) -> Transaction {
    Transaction {
        name: name.to_string(),
        from: from.to_string(),
        from_value: from_value.to_string(),
        to: to.to_string(),
        to_value: if to.is_empty() { String::new() } else { "1".to_string() },
        date: when.to_string(),
        transaction_type: tokens::TYPE_CUSTOM.to_string(),
        ..Default::default()
    }
}

const TODAY: Date = date(2020, 6, 1);

fn run(model: &ModelData) -> SimulationOutput {
    run_simulation(model, &SimulationOptions::new(TODAY)).expect("simulation should run")
}

/// (old, new) of every write to `name` made by `source`
fn changes(output: &SimulationOutput, name: &str, source: &str) -> Vec<(f64, f64)> {
    output
        .evaluations_from(name, source)
        .map(|e| (e.old_value.unwrap_or(0.0), e.value))
        .collect()
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "{what}: expected {expected:.6}, got {actual:.6}"
    );
}
