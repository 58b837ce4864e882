//! Transaction classification
//!
//! A transaction's raw TYPE string and name prefix together decide its
//! structural shape. The mapping is computed once per transaction and then
//! matched on by both the validator and the engine.

use serde::{Deserialize, Serialize};

use super::data::Transaction;
use super::tokens::{self, CONDITIONAL, REVALUE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevalueTarget {
    Asset,
    Debt,
    Income,
    Expense,
    Setting,
}

/// The closed set of TYPE discriminators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Auto-generated pension transfer
    Auto,
    LiquidateAsset,
    PayOffDebt,
    BondInvest,
    BondMature,
    Revalue(RevalueTarget),
    Custom,
    /// Anything outside the closed set; rejected by validation
    Unrecognized(String),
}

impl From<&str> for TransactionKind {
    fn from(raw: &str) -> Self {
        match raw {
            tokens::TYPE_AUTO => TransactionKind::Auto,
            tokens::TYPE_LIQUIDATE_ASSET => TransactionKind::LiquidateAsset,
            tokens::TYPE_PAY_OFF_DEBT => TransactionKind::PayOffDebt,
            tokens::TYPE_BOND_INVEST => TransactionKind::BondInvest,
            tokens::TYPE_BOND_MATURE => TransactionKind::BondMature,
            tokens::TYPE_REVALUE_ASSET => TransactionKind::Revalue(RevalueTarget::Asset),
            tokens::TYPE_REVALUE_DEBT => TransactionKind::Revalue(RevalueTarget::Debt),
            tokens::TYPE_REVALUE_INCOME => TransactionKind::Revalue(RevalueTarget::Income),
            tokens::TYPE_REVALUE_EXPENSE => TransactionKind::Revalue(RevalueTarget::Expense),
            tokens::TYPE_REVALUE_SETTING => TransactionKind::Revalue(RevalueTarget::Setting),
            tokens::TYPE_CUSTOM => TransactionKind::Custom,
            other => TransactionKind::Unrecognized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionalKind {
    /// Sell assets into cash while cash is negative
    Liquidate,
    /// Pay cash into a debt while the debt is outstanding
    PayOff,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PensionFlow {
    /// Defined-contribution pension paid from an income
    Contribution { salary_sacrifice: bool },
    /// Defined-benefit accrual driven by an income
    DefinedBenefitAccrual,
    /// Move a defined-benefit income to another income (e.g. a survivor)
    DefinedBenefitTransfer,
    MoveTaxFreePart,
    Crystallize,
}

impl PensionFlow {
    /// Flows handled while processing the income they draw from
    pub fn consumed_by_income(self) -> bool {
        matches!(
            self,
            PensionFlow::Contribution { .. } | PensionFlow::DefinedBenefitAccrual
        )
    }
}

/// Structural shape of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionClass {
    Revalue(RevalueTarget),
    Conditional(ConditionalKind),
    Pension(PensionFlow),
    BondInvest { years: u32 },
    BondMature { years: u32 },
    Plain,
}

impl TransactionClass {
    pub fn consumed_by_income(self) -> bool {
        matches!(self, TransactionClass::Pension(flow) if flow.consumed_by_income())
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, TransactionClass::Conditional(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ClassifyError(pub String);

/// Trailing `<N>y` on a bond transaction name
pub fn bond_duration_years(name: &str) -> Option<u32> {
    let body = name.strip_suffix('y')?;
    let digits_start = body
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let years: u32 = body[digits_start..].parse().ok()?;
    (years > 0).then_some(years)
}

fn bond_years(name: &str) -> Result<u32, ClassifyError> {
    bond_duration_years(name).ok_or_else(|| {
        ClassifyError(format!(
            "Bond transaction '{name}' should have a name ending with a duration like 5y"
        ))
    })
}

/// Decide the shape of a transaction from its TYPE and name
pub fn classify(t: &Transaction) -> Result<TransactionClass, ClassifyError> {
    let kind = TransactionKind::from(t.transaction_type.as_str());
    let name = t.name.as_str();
    let conditional = name.starts_with(CONDITIONAL);

    match kind {
        TransactionKind::Revalue(target) => {
            if !name.starts_with(REVALUE) {
                return Err(ClassifyError(format!(
                    "Revaluation transaction '{name}' should have a name beginning with {REVALUE}"
                )));
            }
            if t.from_words().next().is_some() {
                return Err(ClassifyError(format!(
                    "Revaluation transaction '{name}' should not have a FROM"
                )));
            }
            Ok(TransactionClass::Revalue(target))
        }
        TransactionKind::LiquidateAsset | TransactionKind::PayOffDebt if !conditional => {
            Err(ClassifyError(format!(
                "Transaction '{name}' of type {} should have a name beginning with {CONDITIONAL}",
                t.transaction_type
            )))
        }
        TransactionKind::LiquidateAsset => {
            Ok(TransactionClass::Conditional(ConditionalKind::Liquidate))
        }
        TransactionKind::PayOffDebt => Ok(TransactionClass::Conditional(ConditionalKind::PayOff)),
        TransactionKind::Custom => {
            if tokens::pension_prefix(name).is_some() {
                Err(ClassifyError(format!(
                    "Custom transaction '{name}' should not use a pension name prefix"
                )))
            } else if conditional {
                Ok(TransactionClass::Conditional(ConditionalKind::Custom))
            } else {
                Ok(TransactionClass::Plain)
            }
        }
        TransactionKind::Auto => {
            let flow = match tokens::pension_prefix(name) {
                Some(tokens::PENSION_SS) => PensionFlow::Contribution {
                    salary_sacrifice: true,
                },
                Some(tokens::PENSION_DB) => PensionFlow::DefinedBenefitAccrual,
                Some(tokens::PENSION_TRANSFER) => PensionFlow::DefinedBenefitTransfer,
                Some(tokens::PENSION) => PensionFlow::Contribution {
                    salary_sacrifice: false,
                },
                Some(tokens::MOVE_TAX_FREE_PART) => PensionFlow::MoveTaxFreePart,
                Some(tokens::TRANSFER_CRYSTALLIZED_PENSION) => PensionFlow::Crystallize,
                _ => {
                    return Err(ClassifyError(format!(
                        "Auto-generated transaction '{name}' should begin with a pension prefix"
                    )));
                }
            };
            Ok(TransactionClass::Pension(flow))
        }
        TransactionKind::BondInvest => {
            bond_years(name).map(|years| TransactionClass::BondInvest { years })
        }
        TransactionKind::BondMature => {
            bond_years(name).map(|years| TransactionClass::BondMature { years })
        }
        TransactionKind::Unrecognized(raw) => Err(ClassifyError(format!(
            "Transaction '{name}' has unrecognised type '{raw}'"
        ))),
    }
}
