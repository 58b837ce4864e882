//! Model validation
//!
//! `check_data` must accept a model before it may be simulated. Checks run in
//! a fixed order and stop at the first failure, which is returned as a
//! [`CheckError`] value rather than raised.

use jiff::civil::Date;
use rustc_hash::FxHashSet;

use crate::date_math::{DateResolver, in_supported_range};
use crate::error::{CheckError, CheckedItem};
use crate::model::{
    Asset, ConditionalKind, EntityKind, Expense, Income, Liability, ModelData, PensionFlow,
    Recurrence, RevalueTarget, TaxKind, Transaction, TransactionClass, Trigger, classify,
    tokens::{self, CASH, CRYSTALLIZED_PENSION, TAX_FREE},
};
use crate::values::{ModelValues, bond_target, parse_number, split_composite, strip_bond_tag};

pub type CheckResult = Result<(), CheckError>;

/// Shared lookups for one validation run
struct Checker<'m> {
    model: &'m ModelData,
    dates: DateResolver,
    values: ModelValues<'m>,
}

/// Validate a whole model. `Ok(())` means it may be simulated.
pub fn check_data(model: &ModelData) -> CheckResult {
    let checker = Checker::new(model);
    checker.check_names()?;
    checker.check_settings()?;
    checker.check_view_range()?;
    checker.check_personal_settings()?;
    for t in &model.transactions {
        checker.check_transaction(t)?;
    }
    for asset in &model.assets {
        checker.check_asset(asset)?;
    }
    for income in &model.incomes {
        checker.check_income(income)?;
    }
    for expense in &model.expenses {
        checker.check_expense(expense)?;
    }
    for trigger in &model.triggers {
        checker.check_trigger(trigger)?;
    }
    Ok(())
}

/// Validate one transaction against the rest of its model
pub fn check_transaction(model: &ModelData, t: &Transaction) -> CheckResult {
    Checker::new(model).check_transaction(t)
}

fn fail<T>(kind: CheckedItem, name: &str, message: impl Into<String>) -> Result<T, CheckError> {
    Err(CheckError::new(kind, name, message))
}

impl<'m> Checker<'m> {
    fn new(model: &'m ModelData) -> Self {
        Self {
            model,
            dates: DateResolver::new(model),
            values: ModelValues::new(model),
        }
    }

    // ========================================================================
    // Model-wide checks
    // ========================================================================

    fn check_names(&self) -> CheckResult {
        let mut seen = FxHashSet::default();
        for (name, kind) in self.model.all_names() {
            let item = checked_item(kind);
            if name.trim().is_empty() {
                return fail(item, name, "Name should not be empty");
            }
            if ModelData::name_has_separator(name) {
                return fail(
                    item,
                    name,
                    format!("Name should not contain '{}'", tokens::SEPARATOR),
                );
            }
            if tokens::pension_prefix(name).is_some() {
                continue;
            }
            if !seen.insert(name) {
                return fail(item, name, "Name is used more than once");
            }
        }
        Ok(())
    }

    fn check_settings(&self) -> CheckResult {
        for required in tokens::REQUIRED_SETTINGS {
            if self.model.setting(required).is_none() {
                return fail(CheckedItem::Setting, required, "Required setting is missing");
            }
        }
        for retired in tokens::RETIRED_SETTINGS {
            if self.model.setting(retired).is_some() {
                return fail(
                    CheckedItem::Setting,
                    retired,
                    "Setting is no longer supported and should be removed",
                );
            }
        }
        Ok(())
    }

    fn check_view_range(&self) -> CheckResult {
        let start = self.setting_date(tokens::ROI_START)?;
        let end = self.setting_date(tokens::ROI_END)?;
        if start > end {
            return fail(
                CheckedItem::Setting,
                tokens::ROI_START,
                "View range should start before it ends",
            );
        }
        Ok(())
    }

    fn setting_date(&self, name: &str) -> Result<Date, CheckError> {
        let value = self.model.setting_value(name).unwrap_or_default();
        match self.dates.resolve(value) {
            Ok(date) if in_supported_range(date) => Ok(date),
            Ok(_) => fail(
                CheckedItem::Setting,
                name,
                format!("Date '{value}' is out of range"),
            ),
            Err(e) => fail(CheckedItem::Setting, name, e.to_string()),
        }
    }

    fn check_personal_settings(&self) -> CheckResult {
        let birth = self.model.setting_value(tokens::BIRTH_DATE).unwrap_or_default();
        if !birth.trim().is_empty() {
            self.setting_date(tokens::BIRTH_DATE)?;
        }
        let cpi = self.model.setting_value(tokens::CPI).unwrap_or_default();
        if self.values.resolve(cpi).is_none() {
            return fail(
                CheckedItem::Setting,
                tokens::CPI,
                format!("CPI '{cpi}' should be a number"),
            );
        }
        Ok(())
    }

    // ========================================================================
    // Shared field checks
    // ========================================================================

    fn date(
        &self,
        item: CheckedItem,
        name: &str,
        field: &str,
        expr: &str,
    ) -> Result<Date, CheckError> {
        match self.dates.resolve(expr) {
            Ok(date) if in_supported_range(date) => Ok(date),
            Ok(_) => fail(item, name, format!("{field} '{expr}' is out of range")),
            Err(e) => fail(item, name, format!("{field}: {e}")),
        }
    }

    fn optional_date(
        &self,
        item: CheckedItem,
        name: &str,
        field: &str,
        expr: &str,
    ) -> Result<Option<Date>, CheckError> {
        if expr.trim().is_empty() {
            return Ok(None);
        }
        self.date(item, name, field, expr).map(Some)
    }

    /// A value is acceptable when it resolves through the settings or names
    /// a subject whose value only exists at run time
    fn is_valuable(&self, expr: &str) -> bool {
        let expr = strip_bond_tag(expr).unwrap_or(expr).trim();
        if self.values.resolve(expr).is_some() || self.model.value_kind(expr).is_some() {
            return true;
        }
        split_composite(expr).is_some_and(|(_, word)| self.model.value_kind(word).is_some())
    }

    fn value(&self, item: CheckedItem, name: &str, field: &str, expr: &str) -> CheckResult {
        if !self.is_valuable(expr) {
            return fail(
                item,
                name,
                format!("{field} '{expr}' is not a number or known setting"),
            );
        }
        Ok(())
    }

    fn recurrence(&self, item: CheckedItem, name: &str, recurrence: &str) -> CheckResult {
        if let Err(e) = recurrence.parse::<Recurrence>() {
            return fail(item, name, e.to_string());
        }
        Ok(())
    }

    fn liabilities(
        &self,
        item: CheckedItem,
        name: &str,
        words: impl Iterator<Item = &'m str>,
        allowed: &[TaxKind],
    ) -> CheckResult {
        for word in words {
            let accepted = Liability::parse(word).is_some_and(|l| allowed.contains(&l.kind));
            if !accepted {
                let suffixes: Vec<&str> = allowed.iter().map(|k| k.suffix()).collect();
                return fail(
                    item,
                    name,
                    format!(
                        "Liability '{word}' should be a person's name followed by one of {}",
                        suffixes.join(", ")
                    ),
                );
            }
        }
        Ok(())
    }

    // ========================================================================
    // Entities
    // ========================================================================

    fn check_asset(&self, asset: &'m Asset) -> CheckResult {
        let item = CheckedItem::Asset;
        let name = asset.name.as_str();
        self.date(item, name, "Start date", &asset.start)?;
        self.value(item, name, "Value", &asset.value)?;
        self.value(item, name, "Growth", &asset.growth)?;

        let quantity = asset.quantity.trim();
        if !quantity.is_empty() {
            if asset.is_cash() {
                return fail(item, name, "Cash should not have a quantity");
            }
            let whole = self
                .values
                .resolve(quantity)
                .is_some_and(|q| q >= 0.0 && q.fract() == 0.0);
            if !whole {
                return fail(
                    item,
                    name,
                    format!("Quantity '{quantity}' should be a non-negative whole number"),
                );
            }
        }
        if !asset.purchase_price.trim().is_empty() {
            self.value(item, name, "Purchase price", &asset.purchase_price)?;
        }
        self.liabilities(
            item,
            name,
            asset.liabilities(),
            &[TaxKind::CapitalGains, TaxKind::IncomeTax],
        )?;
        if asset.is_a_debt
            && let Some(value) = parse_number(&asset.value)
            && value > 0.0
        {
            return fail(item, name, "Debt should have a value of zero or less");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_flow(
        &self,
        item: CheckedItem,
        name: &str,
        start: &str,
        end: &str,
        value: &str,
        value_set: &str,
        recurrence: &str,
    ) -> CheckResult {
        let start = self.date(item, name, "Start date", start)?;
        if let Some(end) = self.optional_date(item, name, "End date", end)?
            && end < start
        {
            return fail(item, name, "End date should not be before start date");
        }
        if let Some(set) = self.optional_date(item, name, "Value set date", value_set)?
            && set > start
        {
            return fail(item, name, "Value set date should not be after start date");
        }
        self.value(item, name, "Value", value)?;
        self.recurrence(item, name, recurrence)
    }

    fn check_income(&self, income: &'m Income) -> CheckResult {
        self.check_flow(
            CheckedItem::Income,
            &income.name,
            &income.start,
            &income.end,
            &income.value,
            &income.value_set,
            &income.recurrence,
        )?;
        self.liabilities(
            CheckedItem::Income,
            &income.name,
            income.liabilities(),
            &[TaxKind::IncomeTax, TaxKind::NationalInsurance],
        )
    }

    fn check_expense(&self, expense: &Expense) -> CheckResult {
        self.check_flow(
            CheckedItem::Expense,
            &expense.name,
            &expense.start,
            &expense.end,
            &expense.value,
            &expense.value_set,
            &expense.recurrence,
        )
    }

    fn check_trigger(&self, trigger: &Trigger) -> CheckResult {
        self.date(CheckedItem::Trigger, &trigger.name, "Date", &trigger.date)?;
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn check_transaction(&self, t: &Transaction) -> CheckResult {
        let item = CheckedItem::Transaction;
        let name = t.name.as_str();
        let class = match classify(t) {
            Ok(class) => class,
            Err(e) => return fail(item, name, e.0),
        };

        let date = self.date(item, name, "Date", &t.date)?;
        if let Some(stop) = self.optional_date(item, name, "Stop date", &t.stop_date)?
            && stop <= date
        {
            return fail(item, name, "Stop date should be after the transaction date");
        }
        if !t.recurrence.trim().is_empty() {
            self.recurrence(item, name, &t.recurrence)?;
        }
        if t.from_words().next().is_some() {
            self.value(item, name, "From value", &t.from_value)?;
        }
        let textual = class == TransactionClass::Revalue(RevalueTarget::Setting);
        if t.to_words().next().is_some() && !textual {
            self.value(item, name, "To value", &t.to_value)?;
        }

        let from = self.model.expand_list(&t.from);
        let to = self.model.expand_list(&t.to);
        match class {
            TransactionClass::Revalue(target) => self.check_revalue(t, target, &to),
            TransactionClass::Conditional(kind) => self.check_conditional(t, kind, &from, &to),
            TransactionClass::Pension(flow) => self.check_pension(t, flow, &from, &to),
            TransactionClass::BondInvest { .. } => self.check_bond_invest(t, date, &from, &to),
            TransactionClass::BondMature { .. } => self.check_bond_mature(t, &from, &to),
            TransactionClass::Plain => self.check_plain(t, &from, &to),
        }
    }

    fn kind_of(&self, word: &str) -> Option<EntityKind> {
        self.model.value_kind(word)
    }

    fn is_asset(&self, word: &str) -> bool {
        matches!(self.kind_of(word), Some(EntityKind::Asset | EntityKind::Debt))
    }

    fn single<'w>(
        &self,
        t: &Transaction,
        words: &'w [String],
        side: &str,
    ) -> Result<&'w str, CheckError> {
        match words {
            [one] => Ok(one.as_str()),
            _ => fail(
                CheckedItem::Transaction,
                &t.name,
                format!("Transaction should have a single {side}"),
            ),
        }
    }

    fn check_revalue(&self, t: &Transaction, target: RevalueTarget, to: &[String]) -> CheckResult {
        let expected = match target {
            RevalueTarget::Asset => EntityKind::Asset,
            RevalueTarget::Debt => EntityKind::Debt,
            RevalueTarget::Income => EntityKind::Income,
            RevalueTarget::Expense => EntityKind::Expense,
            RevalueTarget::Setting => EntityKind::Setting,
        };
        if to.is_empty() {
            return fail(CheckedItem::Transaction, &t.name, "Revaluation should have a TO");
        }
        for word in to {
            if self.kind_of(word) != Some(expected) {
                return fail(
                    CheckedItem::Transaction,
                    &t.name,
                    format!("Revaluation target '{word}' should be a {expected:?}"),
                );
            }
        }
        Ok(())
    }

    fn check_conditional(
        &self,
        t: &Transaction,
        kind: ConditionalKind,
        from: &[String],
        to: &[String],
    ) -> CheckResult {
        let item = CheckedItem::Transaction;
        let target = self.single(t, to, "TO")?;
        if !self.is_asset(target) {
            return fail(
                item,
                &t.name,
                format!("Conditional target '{target}' should be an asset"),
            );
        }
        if from.is_empty() {
            return fail(item, &t.name, "Conditional transaction should have a FROM");
        }
        match kind {
            ConditionalKind::Liquidate => {
                if target != CASH {
                    return fail(item, &t.name, "Liquidation should pay into Cash");
                }
                if let Some(bad) = from
                    .iter()
                    .find(|w| self.kind_of(w) != Some(EntityKind::Asset))
                {
                    return fail(item, &t.name, format!("Liquidated '{bad}' should be an asset"));
                }
            }
            ConditionalKind::PayOff => {
                if *from != [CASH] {
                    return fail(item, &t.name, "Debt payments should come from Cash");
                }
                if self.kind_of(target) != Some(EntityKind::Debt) {
                    return fail(item, &t.name, format!("Paid-off '{target}' should be a debt"));
                }
            }
            ConditionalKind::Custom => {
                if let Some(bad) = from.iter().find(|w| !self.is_asset(w)) {
                    return fail(item, &t.name, format!("Source '{bad}' should be an asset"));
                }
            }
        }
        Ok(())
    }

    fn check_pension(
        &self,
        t: &Transaction,
        flow: PensionFlow,
        from: &[String],
        to: &[String],
    ) -> CheckResult {
        let item = CheckedItem::Transaction;
        let target = self.single(t, to, "TO")?;
        if from.is_empty() {
            return fail(item, &t.name, "Pension transaction should have a FROM");
        }
        let (from_kind, to_ok, expectation) = match flow {
            PensionFlow::Contribution { .. } => (
                EntityKind::Income,
                self.is_asset(target),
                "contributions should pay from an income into a pension asset",
            ),
            PensionFlow::DefinedBenefitAccrual => (
                EntityKind::Income,
                self.kind_of(target) == Some(EntityKind::Income),
                "defined benefit accrual should pay from an income into a pension income",
            ),
            PensionFlow::DefinedBenefitTransfer => (
                EntityKind::Income,
                self.kind_of(target) == Some(EntityKind::Income),
                "defined benefit transfers should move one income to another",
            ),
            PensionFlow::MoveTaxFreePart => (
                EntityKind::Asset,
                self.is_asset(target) && target.starts_with(TAX_FREE),
                "tax-free parts should move from a pension into a TaxFree asset",
            ),
            PensionFlow::Crystallize => (
                EntityKind::Asset,
                self.is_asset(target) && target.starts_with(CRYSTALLIZED_PENSION),
                "crystallization should move a pension into a CrystallizedPension asset",
            ),
        };
        let from_ok = from.iter().all(|w| self.kind_of(w) == Some(from_kind));
        if !(from_ok && to_ok) {
            return fail(
                item,
                &t.name,
                format!("Pension transaction is malformed: {expectation}"),
            );
        }
        Ok(())
    }

    fn check_bond_invest(
        &self,
        t: &Transaction,
        date: Date,
        from: &[String],
        to: &[String],
    ) -> CheckResult {
        let item = CheckedItem::Transaction;
        if *from != [CASH] {
            return fail(item, &t.name, "Bond investments should come from Cash");
        }
        let Some(target) = bond_target(&t.from_value) else {
            return fail(
                item,
                &t.name,
                format!("Bond investment value should begin with {}", tokens::BOND_MATURITY),
            );
        };
        if self.model.setting(target).is_none() {
            return fail(
                item,
                &t.name,
                format!("Bond target setting '{target}' does not exist"),
            );
        }
        if !self.revalued_by(target, date) {
            return fail(
                item,
                &t.name,
                format!("Bond target setting '{target}' is not revalued by the investment date"),
            );
        }
        let bond = self.single(t, to, "TO")?;
        if !self.is_asset(bond) {
            return fail(item, &t.name, format!("Bond '{bond}' should be an asset"));
        }
        Ok(())
    }

    /// True when a `revalueSetting` transaction dated no later than `date`
    /// targets `setting`
    fn revalued_by(&self, setting: &str, date: Date) -> bool {
        self.model.transactions.iter().any(|r| {
            matches!(classify(r), Ok(TransactionClass::Revalue(RevalueTarget::Setting)))
                && self.model.expand_list(&r.to).iter().any(|w| w == setting)
                && self.dates.resolve(&r.date).is_ok_and(|d| d <= date)
        })
    }

    fn check_bond_mature(&self, t: &Transaction, from: &[String], to: &[String]) -> CheckResult {
        let item = CheckedItem::Transaction;
        if *to != [CASH] {
            return fail(item, &t.name, "Bond maturity should pay into Cash");
        }
        if strip_bond_tag(&t.from_value).is_none() {
            return fail(
                item,
                &t.name,
                format!("Bond maturity value should begin with {}", tokens::BOND_MATURITY),
            );
        }
        let bond = self.single(t, from, "FROM")?;
        if !self.is_asset(bond) {
            return fail(item, &t.name, format!("Bond '{bond}' should be an asset"));
        }
        Ok(())
    }

    fn check_plain(&self, t: &Transaction, from: &[String], to: &[String]) -> CheckResult {
        let item = CheckedItem::Transaction;
        if from.is_empty() {
            return fail(item, &t.name, "Transaction should have a FROM");
        }
        if let Some(bad) = from.iter().find(|w| !self.is_asset(w)) {
            return fail(item, &t.name, format!("Source '{bad}' should be an asset"));
        }
        if let Some(bad) = to.iter().find(|w| !self.is_asset(w)) {
            return fail(item, &t.name, format!("Target '{bad}' should be an asset"));
        }
        Ok(())
    }
}

fn checked_item(kind: EntityKind) -> CheckedItem {
    match kind {
        EntityKind::Trigger => CheckedItem::Trigger,
        EntityKind::Setting => CheckedItem::Setting,
        EntityKind::Asset | EntityKind::Debt => CheckedItem::Asset,
        EntityKind::Income => CheckedItem::Income,
        EntityKind::Expense => CheckedItem::Expense,
        EntityKind::Transaction => CheckedItem::Transaction,
    }
}
