//! Simulation results
//!
//! The evaluation log, the report feed and the "today" snapshots. This is the
//! whole surface consumed by reporting and chart layers.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::tokens::ESTATE;

/// One recorded change of a subject's value. The log of these is the complete
/// audit trail of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub name: String,
    pub date: Date,
    /// Value before the write, absent when the subject had no value yet
    pub old_value: Option<f64>,
    pub value: f64,
    pub source: String,
}

/// A human-facing report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDatum {
    pub name: String,
    pub date: Date,
    pub change: Option<f64>,
    pub old_val: Option<f64>,
    pub new_val: Option<f64>,
    /// For quantised holdings: `"+3 units at 12.50"` style description
    pub qchange: Option<String>,
    pub qold_val: Option<f64>,
    pub qnew_val: Option<f64>,
    pub source: String,
}

impl ReportDatum {
    pub fn error(date: Date, message: &str) -> Self {
        Self {
            name: "Error".to_string(),
            date,
            change: None,
            old_val: None,
            new_val: None,
            qchange: None,
            qold_val: None,
            qnew_val: None,
            source: message.to_string(),
        }
    }

    pub fn estate_final(date: Date, value: f64) -> Self {
        Self {
            name: format!("{ESTATE} final value"),
            date,
            change: None,
            old_val: None,
            new_val: Some(value),
            qchange: None,
            qold_val: None,
            qnew_val: None,
            source: ESTATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSnapshot {
    pub value: f64,
    pub quantity: Option<f64>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub value: f64,
    pub category: String,
    pub has_started: bool,
    pub has_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSnapshot {
    pub value: String,
}

/// Everything a simulation run produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    pub evaluations: Vec<Evaluation>,
    pub todays_asset_values: BTreeMap<String, AssetSnapshot>,
    pub todays_debt_values: BTreeMap<String, AssetSnapshot>,
    pub todays_income_values: BTreeMap<String, FlowSnapshot>,
    pub todays_expense_values: BTreeMap<String, FlowSnapshot>,
    pub todays_setting_values: BTreeMap<String, SettingSnapshot>,
    pub report_data: Vec<ReportDatum>,
}

impl SimulationOutput {
    /// Output for a model that failed validation
    pub fn rejected(date: Date, message: &str) -> Self {
        Self {
            report_data: vec![ReportDatum::error(date, message)],
            ..Default::default()
        }
    }

    /// All evaluations of one subject, in log order
    pub fn evaluations_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Evaluation> {
        self.evaluations.iter().filter(move |e| e.name == name)
    }

    /// Evaluations of one subject written by one source
    pub fn evaluations_from<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
    ) -> impl Iterator<Item = &'a Evaluation> {
        self.evaluations_for(name).filter(move |e| e.source == source)
    }

    /// Last recorded value of a subject
    pub fn final_value(&self, name: &str) -> Option<f64> {
        self.evaluations_for(name).last().map(|e| e.value)
    }

    /// Last recorded value of a subject on or before `date`
    pub fn value_at(&self, name: &str, date: Date) -> Option<f64> {
        self.evaluations_for(name)
            .take_while(|e| e.date <= date)
            .last()
            .map(|e| e.value)
    }
}
