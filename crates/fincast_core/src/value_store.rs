//! Name → value storage with indirect resolution and display scaling.
//!
//! The store keeps *base* values. What the rest of the engine sees is the
//! display value: the resolved base times the unit count (quantised assets)
//! times the CPI base-index (CPI-adjusted subjects). The store never logs;
//! every logged write goes through `SimulationState`.

use rustc_hash::FxHashMap;

use crate::growth::GrowthData;
use crate::values::{NamedValues, resolve_expression};

#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Number(f64),
    /// Unresolved expression: a setting name, `<number><word>`, ...
    Text(String),
}

impl StoredValue {
    /// Store a number when the text is one, otherwise keep the expression
    pub fn parse(text: &str) -> Self {
        match crate::values::parse_number(text) {
            Some(n) => StoredValue::Number(n),
            None => StoredValue::Text(text.trim().to_string()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            StoredValue::Number(n) => n.to_string(),
            StoredValue::Text(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueStore {
    values: FxHashMap<String, StoredValue>,
    quantities: FxHashMap<String, f64>,
    purchase_prices: FxHashMap<String, f64>,
    growth: FxHashMap<String, GrowthData>,
    cpi_index: f64,
    annual_cpi_index: f64,
}

impl ValueStore {
    pub fn new(growth: FxHashMap<String, GrowthData>) -> Self {
        Self {
            values: FxHashMap::default(),
            quantities: FxHashMap::default(),
            purchase_prices: FxHashMap::default(),
            growth,
            cpi_index: 1.0,
            annual_cpi_index: 1.0,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn stored(&self, name: &str) -> Option<&StoredValue> {
        self.values.get(name)
    }

    pub fn growth(&self, name: &str) -> Option<GrowthData> {
        self.growth.get(name).copied()
    }

    pub fn cpi_index(&self) -> f64 {
        self.cpi_index
    }

    pub fn annual_cpi_index(&self) -> f64 {
        self.annual_cpi_index
    }

    /// Compound the monthly index by one month at `cpi` percent a year
    pub fn compound_cpi(&mut self, cpi: f64) {
        self.cpi_index *= crate::growth::monthly_scale(cpi);
    }

    /// Snapshot the monthly index into the annual one
    pub fn snapshot_annual_cpi(&mut self) {
        self.annual_cpi_index = self.cpi_index;
    }

    fn cpi_factor(&self, name: &str) -> f64 {
        match self.growth.get(name) {
            Some(g) if g.cpi_adjusted && g.annual_cpi => self.annual_cpi_index,
            Some(g) if g.cpi_adjusted => self.cpi_index,
            _ => 1.0,
        }
    }

    /// Product of the quantity and CPI factors between base and display
    fn display_factor(&self, name: &str) -> f64 {
        self.quantities.get(name).copied().unwrap_or(1.0) * self.cpi_factor(name)
    }

    fn base_at_depth(&self, name: &str, depth: usize) -> Option<f64> {
        match self.values.get(name)? {
            StoredValue::Number(n) => Some(*n),
            StoredValue::Text(expr) => resolve_expression(self, expr, depth),
        }
    }

    /// Resolved base value, before quantity and CPI scaling
    pub fn base_value(&self, name: &str) -> Option<f64> {
        self.base_at_depth(name, 0)
    }

    /// Resolved value as seen by the model
    pub fn display_value(&self, name: &str) -> Option<f64> {
        self.named_value(name, 0)
    }

    /// Unit price of a quantised holding, in display terms
    pub fn unit_price(&self, name: &str) -> Option<f64> {
        Some(self.base_value(name)? * self.cpi_factor(name))
    }

    /// Store the base of a quantised holding so one unit displays as `price`
    pub fn set_unit_price(&mut self, name: &str, price: f64) {
        let cpi = self.cpi_factor(name);
        self.set_stored(name, StoredValue::Number(price / cpi));
    }

    /// Resolve an arbitrary expression against the stored values
    pub fn resolve(&self, expr: &str) -> Option<f64> {
        resolve_expression(self, expr, 0)
    }

    pub fn set_stored(&mut self, name: &str, value: StoredValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Store the base which displays as `display`
    pub fn set_display(&mut self, name: &str, display: f64) {
        let factor = self.display_factor(name);
        let base = if factor == 0.0 { display } else { display / factor };
        self.set_stored(name, StoredValue::Number(base));
    }

    /// Multiply the stored base by `scale`; unresolvable bases are left alone
    pub fn scale_base(&mut self, name: &str, scale: f64) {
        if let Some(base) = self.base_value(name) {
            self.set_stored(name, StoredValue::Number(base * scale));
        }
    }

    pub fn quantity(&self, name: &str) -> Option<f64> {
        self.quantities.get(name).copied()
    }

    pub fn set_quantity(&mut self, name: &str, quantity: f64) {
        self.quantities.insert(name.to_string(), quantity);
    }

    pub fn purchase_price(&self, name: &str) -> Option<f64> {
        self.purchase_prices.get(name).copied()
    }

    pub fn set_purchase_price(&mut self, name: &str, price: f64) {
        self.purchase_prices.insert(name.to_string(), price);
    }
}

impl NamedValues for ValueStore {
    fn named_value(&self, name: &str, depth: usize) -> Option<f64> {
        Some(self.base_at_depth(name, depth)? * self.display_factor(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ValueStore {
        let mut growth = FxHashMap::default();
        growth.insert("Salary".to_string(), GrowthData::CPI_LINKED);
        growth.insert(
            "Tax band".to_string(),
            GrowthData {
                annual_cpi: true,
                ..GrowthData::CPI_LINKED
            },
        );
        ValueStore::new(growth)
    }

    #[test]
    fn test_indirect_resolution() {
        let mut s = store();
        s.set_stored("SharePrice", StoredValue::parse("12.5"));
        s.set_stored("Holding", StoredValue::parse("4SharePrice"));
        s.set_stored("Alias", StoredValue::parse("Holding"));
        assert_eq!(s.display_value("Alias"), Some(50.0));
        assert_eq!(s.resolve("2Alias"), Some(100.0));
        assert_eq!(s.display_value("Nothing"), None);
    }

    #[test]
    fn test_cpi_scaling_round_trips() {
        let mut s = store();
        for _ in 0..12 {
            s.compound_cpi(12.0);
        }
        assert!((s.cpi_index() - 1.12).abs() < 1e-12);

        s.set_display("Salary", 1000.0);
        assert!((s.base_value("Salary").unwrap_or_default() - 1000.0 / 1.12).abs() < 1e-9);
        assert!((s.display_value("Salary").unwrap_or_default() - 1000.0).abs() < 1e-9);

        // annual index lags until the tax-year snapshot
        s.set_display("Tax band", 500.0);
        assert_eq!(s.base_value("Tax band"), Some(500.0));
        s.snapshot_annual_cpi();
        assert!((s.display_value("Tax band").unwrap_or_default() - 560.0).abs() < 1e-9);
    }

    #[test]
    fn test_quantity_scaling() {
        let mut s = store();
        s.set_quantity("Shares", 10.0);
        s.set_display("Shares", 250.0);
        assert_eq!(s.base_value("Shares"), Some(25.0));
        assert_eq!(s.unit_price("Shares"), Some(25.0));
        s.set_quantity("Shares", 4.0);
        assert_eq!(s.display_value("Shares"), Some(100.0));
    }
}
