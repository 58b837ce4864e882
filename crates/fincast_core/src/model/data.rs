//! Stored model entities
//!
//! Field names round-trip exactly with stored models, so every entity keeps
//! the upper-case JSON keys of the stored format.

use serde::{Deserialize, Serialize};

use super::tokens::{self, CASH, SEPARATOR};

/// A complete household model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub settings: Vec<Setting>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub incomes: Vec<Income>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Named date, referenced from date fields elsewhere in the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Trigger {
    pub name: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingType {
    #[default]
    #[serde(rename = "const")]
    Constant,
    #[serde(rename = "view")]
    View,
    #[serde(rename = "adjustable")]
    Adjustable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Setting {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default, rename = "TYPE")]
    pub setting_type: SettingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Asset {
    pub name: String,
    pub category: String,
    pub start: String,
    pub value: String,
    /// Unit count for holdings priced per unit; empty when not quantised
    pub quantity: String,
    pub growth: String,
    pub cpi_immune: bool,
    pub can_be_negative: bool,
    pub is_a_debt: bool,
    pub liability: String,
    pub purchase_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

impl Asset {
    pub fn is_cash(&self) -> bool {
        self.name == CASH
    }

    pub fn is_quantised(&self) -> bool {
        !self.quantity.trim().is_empty()
    }

    pub fn liabilities(&self) -> impl Iterator<Item = &str> {
        tokens::split_words(&self.liability)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Income {
    pub name: String,
    pub category: String,
    pub start: String,
    pub end: String,
    pub value: String,
    pub value_set: String,
    pub cpi_immune: bool,
    pub recurrence: String,
    pub liability: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

impl Income {
    pub fn liabilities(&self) -> impl Iterator<Item = &str> {
        tokens::split_words(&self.liability)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Expense {
    pub name: String,
    pub category: String,
    pub start: String,
    pub end: String,
    pub value: String,
    pub value_set: String,
    pub cpi_immune: bool,
    pub recurrence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Transaction {
    pub name: String,
    pub from: String,
    pub from_absolute: bool,
    pub from_value: String,
    pub to: String,
    pub to_absolute: bool,
    pub to_value: String,
    pub date: String,
    pub stop_date: String,
    pub recurrence: String,
    pub category: String,
    #[serde(rename = "TYPE")]
    pub transaction_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub era: Option<i32>,
}

impl Transaction {
    pub fn from_words(&self) -> impl Iterator<Item = &str> {
        tokens::split_words(&self.from)
    }

    pub fn to_words(&self) -> impl Iterator<Item = &str> {
        tokens::split_words(&self.to)
    }
}

/// The kind of entity a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Trigger,
    Setting,
    Asset,
    Debt,
    Income,
    Expense,
    Transaction,
}

impl ModelData {
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn income(&self, name: &str) -> Option<&Income> {
        self.incomes.iter().find(|i| i.name == name)
    }

    pub fn expense(&self, name: &str) -> Option<&Expense> {
        self.expenses.iter().find(|e| e.name == name)
    }

    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.name == name)
    }

    pub fn setting_value(&self, name: &str) -> Option<&str> {
        self.setting(name).map(|s| s.value.as_str())
    }

    pub fn trigger(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name == name)
    }

    /// Kind of the asset/income/expense/setting named `name`
    pub fn value_kind(&self, name: &str) -> Option<EntityKind> {
        if let Some(asset) = self.asset(name) {
            Some(if asset.is_a_debt {
                EntityKind::Debt
            } else {
                EntityKind::Asset
            })
        } else if self.income(name).is_some() {
            Some(EntityKind::Income)
        } else if self.expense(name).is_some() {
            Some(EntityKind::Expense)
        } else if self.setting(name).is_some() {
            Some(EntityKind::Setting)
        } else {
            None
        }
    }

    /// Expand a FROM/TO word: a category name expands to every asset, income
    /// or expense in that category, anything else stands for itself
    pub fn expand_word(&self, word: &str) -> Vec<String> {
        if self.value_kind(word).is_some() {
            return vec![word.to_string()];
        }
        let members: Vec<String> = self
            .assets
            .iter()
            .filter(|a| a.category == word)
            .map(|a| a.name.clone())
            .chain(
                self.incomes
                    .iter()
                    .filter(|i| i.category == word)
                    .map(|i| i.name.clone()),
            )
            .chain(
                self.expenses
                    .iter()
                    .filter(|e| e.category == word)
                    .map(|e| e.name.clone()),
            )
            .collect();
        if members.is_empty() {
            vec![word.to_string()]
        } else {
            members
        }
    }

    /// Expand a separator-joined list of words, categories included
    pub fn expand_list(&self, list: &str) -> Vec<String> {
        tokens::split_words(list)
            .flat_map(|w| self.expand_word(w))
            .collect()
    }

    /// Every name defined anywhere in the model, with its kind
    pub fn all_names(&self) -> Vec<(&str, EntityKind)> {
        let mut names = Vec::new();
        names.extend(
            self.triggers
                .iter()
                .map(|t| (t.name.as_str(), EntityKind::Trigger)),
        );
        names.extend(
            self.settings
                .iter()
                .map(|s| (s.name.as_str(), EntityKind::Setting)),
        );
        names.extend(self.assets.iter().map(|a| {
            (
                a.name.as_str(),
                if a.is_a_debt {
                    EntityKind::Debt
                } else {
                    EntityKind::Asset
                },
            )
        }));
        names.extend(
            self.incomes
                .iter()
                .map(|i| (i.name.as_str(), EntityKind::Income)),
        );
        names.extend(
            self.expenses
                .iter()
                .map(|e| (e.name.as_str(), EntityKind::Expense)),
        );
        names.extend(
            self.transactions
                .iter()
                .map(|t| (t.name.as_str(), EntityKind::Transaction)),
        );
        names
    }

    /// True when a name contains the list separator and so cannot be stored
    pub fn name_has_separator(name: &str) -> bool {
        name.contains(SEPARATOR)
    }
}
