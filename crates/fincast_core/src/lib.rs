//! Household finance simulation and UK tax engine
//!
//! A model describes assets, debts, incomes, expenses and dated transactions.
//! [`run_simulation`] validates it, expands every entity into dated moments,
//! processes them in a fixed chronological order and returns the full log of
//! value changes together with point-in-time snapshots and a filtered report.
//!
//! The engine covers:
//! - growth and CPI indexing of every value, monthly and annually
//! - proportional, absolute, conditional and unit-quantised transfers
//! - income tax, National Insurance and capital gains tax for several people,
//!   with monthly estimates and a settlement each 6 April
//! - pension contributions, crystallization and drawdown
//! - bonds whose maturity values are priced by a reduced pre-pass
//!
//! ```ignore
//! use fincast_core::{SimulationOptions, model::ModelData, run_simulation};
//!
//! let model: ModelData = serde_json::from_str(&json)?;
//! let options = SimulationOptions::new(jiff::civil::date(2024, 1, 1))
//!     .with_report(|name, _, _, _| name == "Cash");
//! let output = run_simulation(&model, &options)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod cash_flows;
pub mod date_math;
pub mod error;
pub mod growth;
pub mod report;
pub mod schedule;
pub mod simulation;
pub mod simulation_state;
pub mod taxes;
pub mod timeline;
pub mod transactions;
pub mod validate;
pub mod value_store;
pub mod values;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use error::{CheckError, CheckedItem, DateError, SimulationError};
pub use report::ReportPredicate;
pub use simulation::{SimulationOptions, run_simulation};
pub use timeline::ViewFrequency;
pub use validate::{check_data, check_transaction};
