use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ClassifyError, RecurrenceError};

/// Errors resolving a date expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("'{0}' is not a date or a known trigger")]
    Unparseable(String),
    #[error("date '{0}' refers to triggers too deeply (cyclic?)")]
    TooDeep(String),
    #[error("date '{0}' is out of range")]
    OutOfRange(String),
}

/// Which part of a model a validation failure concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckedItem {
    Model,
    Setting,
    Trigger,
    Asset,
    Income,
    Expense,
    Transaction,
}

/// A model-integrity failure found by the validator.
///
/// Validation failures are values: the orchestrator turns them into a report
/// row instead of simulating.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?} '{item_name}': {message}")]
pub struct CheckError {
    pub kind: CheckedItem,
    pub item_name: String,
    pub message: String,
}

impl CheckError {
    pub fn new(kind: CheckedItem, item_name: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            item_name: item_name.to_string(),
            message: message.into(),
        }
    }
}

/// A broken engine contract. Validation is supposed to rule these out, so
/// hitting one aborts the whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("{kind} '{name}' referenced by the simulation does not exist")]
    MissingEntity { kind: &'static str, name: String },

    #[error("required setting '{0}' is missing or invalid")]
    MissingSetting(String),

    #[error("bad date for {context}: {source}")]
    Date {
        context: String,
        #[source]
        source: DateError,
    },

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
}

impl SimulationError {
    pub fn date(context: impl Into<String>) -> impl FnOnce(DateError) -> SimulationError {
        let context = context.into();
        move |source| SimulationError::Date { context, source }
    }

    pub fn missing(kind: &'static str, name: &str) -> Self {
        SimulationError::MissingEntity {
            kind,
            name: name.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
