//! Command-line front end for the household finance engine
//!
//! Loads a model, runs [`fincast_core::run_simulation`] and prints the parts
//! of the output the caller asked for as JSON.

pub mod loader;
pub mod logging;

pub use loader::{LoadError, load_model, write_json};
pub use logging::{LogTarget, default_log_path, init_logging};

use fincast_core::model::SimulationOutput;
use fincast_core::{ReportPredicate, SimulationOptions};
use jiff::civil::Date;
use serde_json::{Map, Value, json};

/// Which parts of a simulation output to print
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputView {
    pub report: bool,
    pub snapshots: bool,
    /// Keep only report rows whose subject contains this text
    pub filter: Option<String>,
}

impl OutputView {
    pub fn wants_report(&self) -> bool {
        self.report || self.filter.is_some()
    }

    /// Predicate for the engine's report feed, if a report is wanted
    pub fn report_predicate(&self) -> Option<Box<ReportPredicate>> {
        if !self.wants_report() {
            return None;
        }
        let filter = self.filter.clone().unwrap_or_default();
        Some(Box::new(move |name: &str, _: f64, _: Date, _: &str| {
            name.contains(filter.as_str())
        }))
    }

    /// Attach the report predicate to `options` when one is wanted
    pub fn apply(&self, options: SimulationOptions) -> SimulationOptions {
        match self.report_predicate() {
            Some(predicate) => options.with_report(predicate),
            None => options,
        }
    }

    /// The evaluations log is always included; report and snapshots on request
    pub fn render(&self, output: &SimulationOutput) -> color_eyre::Result<Value> {
        let mut rendered = Map::new();
        rendered.insert(
            "evaluations".into(),
            serde_json::to_value(&output.evaluations)?,
        );
        if self.wants_report() {
            rendered.insert("report".into(), serde_json::to_value(&output.report_data)?);
        }
        if self.snapshots {
            rendered.insert(
                "today".into(),
                json!({
                    "assets": output.todays_asset_values,
                    "debts": output.todays_debt_values,
                    "incomes": output.todays_income_values,
                    "expenses": output.todays_expense_values,
                    "settings": output.todays_setting_values,
                }),
            );
        }
        Ok(Value::Object(rendered))
    }
}
