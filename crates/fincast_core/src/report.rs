//! Report feed
//!
//! `ReportRecorder` observes every logged write and keeps the rows a
//! caller-supplied predicate accepts. Writes to a quantity subject become a
//! single row describing both the unit change and the money it represents.

use jiff::civil::Date;

use crate::model::{
    Evaluation, ReportDatum,
    tokens::{ESTATE, QUANTITY},
};

/// `(name, value, date, source) -> keep this row?`
pub type ReportPredicate = dyn Fn(&str, f64, Date, &str) -> bool + Send + Sync;

/// A change of unit count on a quantised holding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantityChange {
    pub old_quantity: Option<f64>,
    pub new_quantity: f64,
    pub unit_price: f64,
}

pub struct ReportRecorder<'p> {
    predicate: &'p ReportPredicate,
    rows: Vec<ReportDatum>,
}

impl<'p> ReportRecorder<'p> {
    pub fn new(predicate: &'p ReportPredicate) -> Self {
        Self {
            predicate,
            rows: Vec::new(),
        }
    }

    /// Offer one write to the feed
    pub fn observe(&mut self, evaluation: &Evaluation, quantity: Option<QuantityChange>) {
        if !(self.predicate)(
            &evaluation.name,
            evaluation.value,
            evaluation.date,
            &evaluation.source,
        ) {
            return;
        }
        let row = match quantity {
            Some(q) => quantity_row(evaluation, q),
            None => ReportDatum {
                name: evaluation.name.clone(),
                date: evaluation.date,
                change: Some(evaluation.value - evaluation.old_value.unwrap_or(0.0)),
                old_val: evaluation.old_value,
                new_val: Some(evaluation.value),
                qchange: None,
                qold_val: None,
                qnew_val: None,
                source: evaluation.source.clone(),
            },
        };
        self.rows.push(row);
    }

    /// Rows most recent first, closed by the estate's final value when known
    pub fn finish(self, estate: Option<(Date, f64)>) -> Vec<ReportDatum> {
        let mut rows = self.rows;
        rows.reverse();
        if let Some((date, value)) = estate {
            rows.push(ReportDatum::estate_final(date, value));
        }
        rows
    }
}

fn quantity_row(evaluation: &Evaluation, q: QuantityChange) -> ReportDatum {
    let old_quantity = q.old_quantity.unwrap_or(0.0);
    let units = q.new_quantity - old_quantity;
    let old_val = old_quantity * q.unit_price;
    let new_val = q.new_quantity * q.unit_price;
    let name = evaluation
        .name
        .strip_prefix(QUANTITY)
        .map_or_else(|| evaluation.name.clone(), quantity_label);
    ReportDatum {
        name,
        date: evaluation.date,
        change: Some(new_val - old_val),
        old_val: Some(old_val),
        new_val: Some(new_val),
        qchange: Some(format!("{units:+} units at {:.2}", q.unit_price)),
        qold_val: q.old_quantity,
        qnew_val: Some(q.new_quantity),
        source: evaluation.source.clone(),
    }
}

/// Name the report uses for a quantity subject: `quantity of Shares`
pub fn quantity_label(asset: &str) -> String {
    format!("quantity of {asset}")
}

/// Final value of the estate subject in an evaluation log
pub fn estate_value(evaluations: &[Evaluation]) -> Option<(Date, f64)> {
    evaluations
        .iter()
        .rev()
        .find(|e| e.name == ESTATE)
        .map(|e| (e.date, e.value))
}
