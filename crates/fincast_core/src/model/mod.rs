mod data;
mod kinds;
mod liability;
mod moments;
mod recurrence;
mod results;
mod tax_table;
pub mod tokens;

pub use data::{
    Asset, EntityKind, Expense, Income, ModelData, Setting, SettingType, Transaction, Trigger,
};
pub use kinds::{
    ClassifyError, ConditionalKind, PensionFlow, RevalueTarget, TransactionClass, TransactionKind,
    bond_duration_years, classify,
};
pub use liability::{Liability, TaxKind};
pub use moments::{Moment, MomentKind};
pub use recurrence::{Recurrence, RecurrenceError, RecurrenceUnit};
pub use results::{
    AssetSnapshot, Evaluation, FlowSnapshot, ReportDatum, SettingSnapshot, SimulationOutput,
};
pub use tax_table::{TaxTable, TaxYearBands};
