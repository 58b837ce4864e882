//! Moments - dated events expanded from model entities
//!
//! Moments are runtime-only. They are regenerated on every run and consumed
//! exactly once by the scheduler.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentKind {
    /// First moment of an asset; seeds its value
    AssetStart,
    /// Monthly growth of an asset
    Asset,
    /// Weekly record of an asset at weekly view frequency
    AssetTracking,
    IncomeStart,
    /// Income sequence begins before START to carry CPI from the value-set date
    IncomeStartPrep,
    Income,
    ExpenseStart,
    ExpenseStartPrep,
    Expense,
    Transaction,
    /// Monthly CPI compounding
    Inflation,
    /// Tax-year snapshot of the CPI base-index
    InflationAnnual,
    /// Point-in-time snapshot of every value
    Today,
    /// Bond pre-pass: sample a maturity setting
    BondProbe,
}

impl MomentKind {
    /// Type tag used for ordering and diagnostics
    pub fn tag(self) -> &'static str {
        match self {
            MomentKind::AssetStart => "AssetStart",
            MomentKind::Asset => "Asset",
            MomentKind::AssetTracking => "AssetTracking",
            MomentKind::IncomeStart => "IncomeStart",
            MomentKind::IncomeStartPrep => "IncomeStartPrep",
            MomentKind::Income => "Income",
            MomentKind::ExpenseStart => "ExpenseStart",
            MomentKind::ExpenseStartPrep => "ExpenseStartPrep",
            MomentKind::Expense => "Expense",
            MomentKind::Transaction => "Transaction",
            MomentKind::Inflation => "Inflation",
            MomentKind::InflationAnnual => "InflationAnnual",
            MomentKind::Today => "Today",
            MomentKind::BondProbe => "BondProbe",
        }
    }

    /// Generic asset-type moments (growth and tracking, not the start)
    pub fn is_generic_asset(self) -> bool {
        matches!(self, MomentKind::Asset | MomentKind::AssetTracking)
    }

    pub fn is_income(self) -> bool {
        matches!(
            self,
            MomentKind::Income | MomentKind::IncomeStart | MomentKind::IncomeStartPrep
        )
    }

    pub fn is_expense(self) -> bool {
        matches!(
            self,
            MomentKind::Expense | MomentKind::ExpenseStart | MomentKind::ExpenseStartPrep
        )
    }

    /// Real moments are those coming from model entities rather than the
    /// engine's own bookkeeping
    pub fn is_real(self) -> bool {
        !matches!(
            self,
            MomentKind::Inflation
                | MomentKind::InflationAnnual
                | MomentKind::Today
                | MomentKind::BondProbe
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Moment {
    pub date: Date,
    pub name: String,
    pub kind: MomentKind,
    /// Literal value applied by a seeding moment
    pub seed: Option<String>,
    /// Index into the model's transactions
    pub transaction: Option<usize>,
}

impl Moment {
    pub fn new(date: Date, name: impl Into<String>, kind: MomentKind) -> Self {
        Self {
            date,
            name: name.into(),
            kind,
            seed: None,
            transaction: None,
        }
    }

    pub fn seeded(date: Date, name: impl Into<String>, kind: MomentKind, seed: &str) -> Self {
        Self {
            seed: Some(seed.to_string()),
            ..Self::new(date, name, kind)
        }
    }

    pub fn for_transaction(date: Date, name: impl Into<String>, index: usize) -> Self {
        Self {
            transaction: Some(index),
            ..Self::new(date, name, MomentKind::Transaction)
        }
    }
}
