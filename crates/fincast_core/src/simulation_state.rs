use jiff::civil::Date;
use rustc_hash::FxHashMap;

use crate::growth::growth_registry;
use crate::model::{Evaluation, ModelData, TaxTable, tokens};
use crate::report::{QuantityChange, ReportRecorder};
use crate::taxes::{TaxEngine, TaxLedger};
use crate::value_store::{StoredValue, ValueStore};

/// Source tag of monthly growth evaluations
pub const GROWTH_SOURCE: &str = "growth";

/// Runtime state for one simulation pass. Owned by the orchestrator for the
/// duration of a call and never shared.
pub struct SimulationState<'a> {
    pub model: &'a ModelData,
    pub store: ValueStore,
    pub taxes: SimTaxState<'a>,
    pub bonds: BondLedger,
    pub history: SimHistory,
    recorder: Option<ReportRecorder<'a>>,
}

pub struct SimTaxState<'a> {
    pub engine: TaxEngine<'a>,
    pub ledger: TaxLedger,
}

/// Maturity values promised by bond investments, keyed by (target setting,
/// maturity date)
#[derive(Debug, Clone, Default)]
pub struct BondLedger {
    pub invested: FxHashMap<(String, Date), f64>,
}

impl BondLedger {
    pub fn record(&mut self, target: &str, maturity: Date, value: f64) {
        *self
            .invested
            .entry((target.to_string(), maturity))
            .or_insert(0.0) += value;
    }

    /// Take the value promised for `target` maturing on `maturity`
    pub fn take(&mut self, target: &str, maturity: Date) -> Option<f64> {
        self.invested.remove(&(target.to_string(), maturity))
    }
}

/// Append-only log of every value change
#[derive(Debug, Clone, Default)]
pub struct SimHistory {
    pub evaluations: Vec<Evaluation>,
}

impl<'a> SimulationState<'a> {
    pub fn new(
        model: &'a ModelData,
        table: &'a TaxTable,
        recorder: Option<ReportRecorder<'a>>,
    ) -> Self {
        let mut store = ValueStore::new(growth_registry(model));
        for setting in &model.settings {
            store.set_stored(&setting.name, StoredValue::parse(&setting.value));
        }
        Self {
            model,
            store,
            taxes: SimTaxState {
                engine: TaxEngine::new(table),
                ledger: TaxLedger::default(),
            },
            bonds: BondLedger::default(),
            history: SimHistory::default(),
            recorder,
        }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.store.display_value(name)
    }

    pub fn resolve(&self, expr: &str) -> Option<f64> {
        self.store.resolve(expr)
    }

    fn record(
        &mut self,
        name: &str,
        date: Date,
        old_value: Option<f64>,
        value: f64,
        source: &str,
        quantity: Option<QuantityChange>,
    ) {
        let evaluation = Evaluation {
            name: name.to_string(),
            date,
            old_value,
            value,
            source: source.to_string(),
        };
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.observe(&evaluation, quantity);
        }
        self.history.evaluations.push(evaluation);
    }

    /// Set the displayed value of a subject and log it
    pub fn set_value(&mut self, name: &str, value: f64, date: Date, source: &str) {
        let old = self.value(name);
        self.store.set_display(name, value);
        let new = self.value(name).unwrap_or(value);
        self.record(name, date, old, new, source, None);
    }

    /// Store an expression (settings may hold text); logged when it resolves
    pub fn set_stored(&mut self, name: &str, stored: StoredValue, date: Date, source: &str) {
        let old = self.value(name);
        self.store.set_stored(name, stored);
        match self.value(name) {
            Some(new) => self.record(name, date, old, new, source, None),
            None => tracing::debug!(name, %date, "stored value does not resolve yet"),
        }
    }

    /// Add `delta` to a subject's displayed value
    pub fn adjust(&mut self, name: &str, delta: f64, date: Date, source: &str) {
        let current = self.value(name).unwrap_or(0.0);
        self.set_value(name, current + delta, date, source);
    }

    /// Every monetary effect on the cash holding goes through here
    pub fn adjust_cash(&mut self, delta: f64, date: Date, source: &str) {
        self.adjust(tokens::CASH, delta, date, source);
    }

    /// Apply one month of growth to a subject's base
    pub fn grow(&mut self, name: &str, date: Date) {
        let Some(old) = self.value(name) else {
            return;
        };
        if let Some(growth) = self.store.growth(name) {
            self.store.scale_base(name, growth.monthly_scale);
        }
        let new = self.value(name).unwrap_or(old);
        self.record(name, date, Some(old), new, GROWTH_SOURCE, None);
    }

    /// Log the current value unchanged (weekly tracking)
    pub fn track(&mut self, name: &str, date: Date) {
        if let Some(value) = self.value(name) {
            self.record(name, date, Some(value), value, GROWTH_SOURCE, None);
        }
    }

    /// Set the unit count of a quantised holding. Logs the quantity subject
    /// and the holding's resulting value.
    pub fn set_quantity(&mut self, asset: &str, quantity: f64, date: Date, source: &str) {
        let old_quantity = self.store.quantity(asset);
        let old_value = self.value(asset);
        self.store.set_quantity(asset, quantity);
        let unit_price = self.store.unit_price(asset).unwrap_or(0.0);
        self.record(
            &tokens::quantity_name(asset),
            date,
            old_quantity,
            quantity,
            source,
            Some(QuantityChange {
                old_quantity,
                new_quantity: quantity,
                unit_price,
            }),
        );
        if let Some(new_value) = self.value(asset) {
            self.record(asset, date, old_value, new_value, source, None);
        }
    }

    /// Set the unit price of a quantised holding and log its value
    pub fn set_unit_price(&mut self, asset: &str, price: f64, date: Date, source: &str) {
        let old = self.value(asset);
        self.store.set_unit_price(asset, price);
        let new = self.value(asset).unwrap_or(0.0);
        self.record(asset, date, old, new, source, None);
    }

    pub fn into_parts(self) -> (Vec<Evaluation>, Option<ReportRecorder<'a>>) {
        (self.history.evaluations, self.recorder)
    }
}
