//! Reserved literal tokens
//!
//! These strings are part of the stored model format and must be preserved
//! exactly: stored models, the validator and the engine all agree on them.

/// Joins lists of entity names in FROM / TO / LIABILITY fields
pub const SEPARATOR: char = '/';

pub const CASH: &str = "Cash";
pub const ESTATE: &str = "Estate";
pub const GRAIN: &str = "Grain";

pub const CONDITIONAL: &str = "Conditional";
pub const REVALUE: &str = "Revalue";

// Pension family. Order matters when prefix matching: longer prefixes first.
pub const PENSION_SS: &str = "PensionSS";
pub const PENSION_DB: &str = "PensionDB";
pub const PENSION_TRANSFER: &str = "PensionTransfer";
pub const PENSION: &str = "Pension";
pub const MOVE_TAX_FREE_PART: &str = "MoveTaxFreePart";
pub const TRANSFER_CRYSTALLIZED_PENSION: &str = "TransferCrystallizedPension";
pub const CRYSTALLIZED_PENSION: &str = "CrystallizedPension";
pub const TAX_FREE: &str = "TaxFree";

pub const PENSION_PREFIXES: [&str; 8] = [
    PENSION_SS,
    PENSION_DB,
    PENSION_TRANSFER,
    PENSION,
    MOVE_TAX_FREE_PART,
    TRANSFER_CRYSTALLIZED_PENSION,
    CRYSTALLIZED_PENSION,
    TAX_FREE,
];

/// Prefix marking a value as a bond maturity value
pub const BOND_MATURITY: &str = "BMV";

/// Evaluations of unit counts are stored under `quantity<asset name>`
pub const QUANTITY: &str = "quantity";

// Liability suffixes, e.g. `JoeIncomeTax/JoeNI`
pub const INCOME_TAX: &str = "IncomeTax";
pub const NATIONAL_INSURANCE: &str = "NI";
pub const CGT: &str = "CGT";

// Transaction TYPE discriminators
pub const TYPE_AUTO: &str = "auto";
pub const TYPE_LIQUIDATE_ASSET: &str = "liquidateAsset";
pub const TYPE_PAY_OFF_DEBT: &str = "payOffDebt";
pub const TYPE_BOND_INVEST: &str = "bondInvest";
pub const TYPE_BOND_MATURE: &str = "bondMature";
pub const TYPE_REVALUE_ASSET: &str = "revalueAsset";
pub const TYPE_REVALUE_DEBT: &str = "revalueDebt";
pub const TYPE_REVALUE_INCOME: &str = "revalueInc";
pub const TYPE_REVALUE_EXPENSE: &str = "revalueExp";
pub const TYPE_REVALUE_SETTING: &str = "revalueSetting";
pub const TYPE_CUSTOM: &str = "custom";

// Settings
pub const ROI_START: &str = "Beginning of view range";
pub const ROI_END: &str = "End of view range";
pub const BIRTH_DATE: &str = "Date of birth";
pub const CPI: &str = "cpi";
pub const VIEW_FREQUENCY: &str = "View frequency";
pub const ASSET_CHART_FOCUS: &str = "Focus of assets chart";
pub const DEBT_CHART_FOCUS: &str = "Focus of debts chart";
pub const INCOME_CHART_FOCUS: &str = "Focus of incomes chart";
pub const EXPENSE_CHART_FOCUS: &str = "Focus of expenses chart";
pub const TAX_CHART_FOCUS_PERSON: &str = "Focus of tax chart, person";
pub const TAX_CHART_FOCUS_TYPE: &str = "Focus of tax chart, type";

pub const REQUIRED_SETTINGS: [&str; 11] = [
    ROI_START,
    ROI_END,
    BIRTH_DATE,
    CPI,
    VIEW_FREQUENCY,
    ASSET_CHART_FOCUS,
    DEBT_CHART_FOCUS,
    INCOME_CHART_FOCUS,
    EXPENSE_CHART_FOCUS,
    TAX_CHART_FOCUS_PERSON,
    TAX_CHART_FOCUS_TYPE,
];

/// Settings retired from the model format; their presence marks a stale model
pub const RETIRED_SETTINGS: [&str; 2] = ["View detail", "Type of view for chart"];

pub const MONTHLY: &str = "Monthly";
pub const ANNUALLY: &str = "Annually";
pub const WEEKLY: &str = "Weekly";
pub const ALL_ITEMS: &str = "All";

/// Returns the pension-family prefix `name` starts with, longest match first
pub fn pension_prefix(name: &str) -> Option<&'static str> {
    PENSION_PREFIXES
        .iter()
        .copied()
        .filter(|prefix| name.starts_with(prefix))
        .max_by_key(|prefix| prefix.len())
}

/// Name of a quantity subject for a quantised asset
pub fn quantity_name(asset: &str) -> String {
    format!("{QUANTITY}{asset}")
}

/// Split a separator-joined list, dropping empty words
pub fn split_words(list: &str) -> impl Iterator<Item = &str> {
    list.split(SEPARATOR).map(str::trim).filter(|w| !w.is_empty())
}
