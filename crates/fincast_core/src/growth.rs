//! Growth and inflation descriptors
//!
//! Rates in the model are annual percentages. A non CPI-immune asset grows by
//! its "adapted" rate in base terms while its displayed value is scaled by the
//! CPI base-index, so the combined nominal growth is `g + cpi`.

use rustc_hash::FxHashMap;

use crate::model::{ModelData, TransactionKind, tokens::CPI};
use crate::values::{ModelValues, bond_target};

/// How a subject's stored base value relates to its displayed value over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthData {
    /// Multiplier applied to the base value at every monthly growth moment
    pub monthly_scale: f64,
    /// Display value is the base times the CPI base-index
    pub cpi_adjusted: bool,
    /// Use the annual (tax-year) index instead of the monthly one
    pub annual_cpi: bool,
}

impl GrowthData {
    pub const FIXED: GrowthData = GrowthData {
        monthly_scale: 1.0,
        cpi_adjusted: false,
        annual_cpi: false,
    };

    pub const CPI_LINKED: GrowthData = GrowthData {
        monthly_scale: 1.0,
        cpi_adjusted: true,
        annual_cpi: false,
    };
}

/// Real growth rate which, compounded with CPI, yields `growth + cpi` nominal
pub fn adapted_growth(growth: f64, cpi: f64) -> f64 {
    ((1.0 + (growth + cpi) / 100.0) / (1.0 + cpi / 100.0) - 1.0) * 100.0
}

/// Monthly multiplier for an annual percentage rate
pub fn monthly_scale(annual_percent: f64) -> f64 {
    (1.0 + annual_percent / 100.0).powf(1.0 / 12.0)
}

/// Growth descriptor for every asset, income, expense and bond target setting.
///
/// Rates are read once from the model as it stands before simulation.
pub fn growth_registry(model: &ModelData) -> FxHashMap<String, GrowthData> {
    let values = ModelValues::new(model);
    let cpi = values.resolve(CPI).unwrap_or(0.0);
    let mut registry = FxHashMap::default();

    for asset in &model.assets {
        let growth = values.resolve(&asset.growth).unwrap_or_else(|| {
            tracing::debug!(asset = %asset.name, growth = %asset.growth, "growth unresolved, using 0");
            0.0
        });
        let data = if asset.cpi_immune {
            GrowthData {
                monthly_scale: monthly_scale(growth),
                ..GrowthData::FIXED
            }
        } else {
            GrowthData {
                monthly_scale: monthly_scale(adapted_growth(growth, cpi)),
                ..GrowthData::CPI_LINKED
            }
        };
        registry.insert(asset.name.clone(), data);
    }

    let flows = model
        .incomes
        .iter()
        .map(|i| (&i.name, i.cpi_immune))
        .chain(model.expenses.iter().map(|e| (&e.name, e.cpi_immune)));
    for (name, cpi_immune) in flows {
        let data = if cpi_immune {
            GrowthData::FIXED
        } else {
            GrowthData::CPI_LINKED
        };
        registry.insert(name.clone(), data);
    }

    for t in &model.transactions {
        if TransactionKind::from(t.transaction_type.as_str()) == TransactionKind::BondInvest
            && let Some(target) = bond_target(&t.from_value)
        {
            registry.insert(target.to_string(), GrowthData::CPI_LINKED);
        }
    }

    registry
}
