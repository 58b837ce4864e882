use std::borrow::Cow;

use jiff::ToSpan;
use jiff::civil::Date;
use rustc_hash::FxHashMap;

use crate::cash_flows::{process_asset, process_expense, process_income};
use crate::date_math::DateResolver;
use crate::error::{DateError, Result, SimulationError};
use crate::model::{
    AssetSnapshot, Evaluation, FlowSnapshot, ModelData, MomentKind, Recurrence, RevalueTarget,
    Setting, SettingSnapshot, SettingType, SimulationOutput, TaxTable, Transaction,
    TransactionClass, classify,
    tokens::{self, CASH},
};
use crate::report::{ReportPredicate, ReportRecorder, estate_value};
use crate::schedule::Schedule;
use crate::simulation_state::SimulationState;
use crate::taxes::settle_due;
use crate::timeline::{MomentOptions, ViewFrequency, generate_moments};
use crate::transactions::{generated_bond_setting, process_transaction};
use crate::validate::check_data;
use crate::values::bond_target;

/// Caller-supplied options for one run
pub struct SimulationOptions {
    /// Date of the point-in-time snapshots
    pub today: Date,
    /// Overrides the model's `View frequency` setting
    pub frequency: Option<ViewFrequency>,
    pub report: Option<Box<ReportPredicate>>,
}

impl SimulationOptions {
    pub fn new(today: Date) -> Self {
        Self {
            today,
            frequency: None,
            report: None,
        }
    }

    pub fn with_frequency(mut self, frequency: ViewFrequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_report(
        mut self,
        predicate: impl Fn(&str, f64, Date, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.report = Some(Box::new(predicate));
        self
    }
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self::new(jiff::Zoned::now().date())
    }
}

// ============================================================================
// Model index
// ============================================================================

/// Facts about a model computed once per pass: transaction classes, active
/// windows of the pension transactions incomes pay into, and flow dates
#[derive(Debug, Clone, Default)]
pub struct ModelIndex {
    classes: Vec<TransactionClass>,
    windows: FxHashMap<usize, (Date, Option<Date>)>,
    pensions_by_income: FxHashMap<String, Vec<usize>>,
    flow_starts: FxHashMap<String, Date>,
    flow_ends: FxHashMap<String, Date>,
}

impl ModelIndex {
    pub fn build(model: &ModelData) -> Result<Self> {
        let resolver = DateResolver::new(model);
        let mut index = ModelIndex {
            classes: model
                .transactions
                .iter()
                .map(classify)
                .collect::<std::result::Result<_, _>>()?,
            ..Default::default()
        };

        for (i, t) in model.transactions.iter().enumerate() {
            if !index.classes[i].consumed_by_income() {
                continue;
            }
            let from = resolver
                .resolve(&t.date)
                .map_err(SimulationError::date(format!("date of transaction {}", t.name)))?;
            let until = resolver
                .resolve_optional(&t.stop_date)
                .map_err(SimulationError::date(format!("stop date of transaction {}", t.name)))?;
            index.windows.insert(i, (from, until));
            for income in model.expand_list(&t.from) {
                index.pensions_by_income.entry(income).or_default().push(i);
            }
        }

        let flows = model
            .incomes
            .iter()
            .map(|i| (&i.name, &i.start, &i.end))
            .chain(model.expenses.iter().map(|e| (&e.name, &e.start, &e.end)));
        for (name, start, end) in flows {
            let start = resolver
                .resolve(start)
                .map_err(SimulationError::date(format!("start of {name}")))?;
            index.flow_starts.insert(name.clone(), start);
            if let Some(end) = resolver
                .resolve_optional(end)
                .map_err(SimulationError::date(format!("end of {name}")))?
            {
                index.flow_ends.insert(name.clone(), end);
            }
        }
        Ok(index)
    }

    pub fn class(&self, transaction: usize) -> TransactionClass {
        self.classes
            .get(transaction)
            .copied()
            .unwrap_or(TransactionClass::Plain)
    }

    /// True when `date` lies in the transaction's [DATE, STOP_DATE) window
    pub fn is_active(&self, transaction: usize, date: Date) -> bool {
        self.windows
            .get(&transaction)
            .is_some_and(|&(from, until)| date >= from && until.is_none_or(|until| date < until))
    }

    /// Pension transactions paid out of `income`
    pub fn pensions_drawn_from(&self, income: &str) -> &[usize] {
        self.pensions_by_income
            .get(income)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn flow_start(&self, name: &str) -> Option<Date> {
        self.flow_starts.get(name).copied()
    }

    pub fn flow_end(&self, name: &str) -> Option<Date> {
        self.flow_ends.get(name).copied()
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Validate and simulate a model.
///
/// An invalid model is not an error: the output carries a single error report
/// row and no evaluations. An `Err` means the engine met a model the validator
/// should have rejected.
pub fn run_simulation(
    model: &ModelData,
    options: &SimulationOptions,
) -> Result<SimulationOutput> {
    if let Err(check) = check_data(model) {
        tracing::warn!(model = %model.name, error = %check, "model failed validation");
        return Ok(SimulationOutput::rejected(options.today, &check.to_string()));
    }

    let range = view_range(model)?;
    let frequency = options.frequency.unwrap_or_else(|| {
        model
            .setting_value(tokens::VIEW_FREQUENCY)
            .and_then(|f| f.parse().ok())
            .unwrap_or_default()
    });
    let table = TaxTable::uk();

    let generated = bond_prepass(model, range, frequency, &table)?;
    let model = if generated.is_empty() {
        Cow::Borrowed(model)
    } else {
        let mut extended = model.clone();
        extended.settings.extend(generated);
        Cow::Owned(extended)
    };

    tracing::info!(
        model = %model.name,
        start = %range.0,
        end = %range.1,
        ?frequency,
        "starting simulation"
    );
    let pass = simulate(
        &model,
        range,
        frequency,
        PassMode::Full {
            today: options.today,
        },
        &table,
        options.report.as_deref(),
    )?;

    let mut output = pass.snapshots.unwrap_or_default();
    let estate = estate_value(&pass.evaluations);
    if let Some(recorder) = pass.recorder {
        output.report_data = recorder.finish(estate);
    }
    output.evaluations = pass.evaluations;
    tracing::info!(
        evaluations = output.evaluations.len(),
        report_rows = output.report_data.len(),
        "simulation complete"
    );
    Ok(output)
}

fn view_range(model: &ModelData) -> Result<(Date, Date)> {
    let resolver = DateResolver::new(model);
    let bound = |setting: &str| -> Result<Date> {
        let expr = model
            .setting_value(setting)
            .ok_or_else(|| SimulationError::MissingSetting(setting.to_string()))?;
        resolver.resolve(expr).map_err(SimulationError::date(setting))
    };
    Ok((bound(tokens::ROI_START)?, bound(tokens::ROI_END)?))
}

// ============================================================================
// Shared pass
// ============================================================================

/// What a pass is run for
#[derive(Debug, Clone, Copy)]
pub enum PassMode<'o> {
    /// Sample target settings at bond maturities
    BondPrePass { probes: &'o [(String, Date)] },
    /// The user-visible run, snapshotting at `today`
    Full { today: Date },
}

/// Results of one pass over a model
pub struct PassOutcome<'a> {
    pub evaluations: Vec<Evaluation>,
    pub recorder: Option<ReportRecorder<'a>>,
    /// Filled when the `Today` moment was reached
    pub snapshots: Option<SimulationOutput>,
    /// Generated setting name and sampled value for each bond probe
    pub probed: Vec<(String, f64)>,
}

/// Generate, order and process every moment of `model` over `range`
pub fn simulate<'a>(
    model: &'a ModelData,
    range: (Date, Date),
    frequency: ViewFrequency,
    mode: PassMode<'_>,
    table: &'a TaxTable,
    report: Option<&'a ReportPredicate>,
) -> Result<PassOutcome<'a>> {
    let index = ModelIndex::build(model)?;
    let moment_options = match mode {
        PassMode::BondPrePass { probes } => MomentOptions {
            frequency,
            today: None,
            probes,
        },
        PassMode::Full { today } => MomentOptions {
            frequency,
            today: Some(today),
            probes: &[],
        },
    };
    let mut schedule = Schedule::new(generate_moments(model, range, &moment_options)?);
    tracing::debug!(moments = schedule.len(), ?mode, "moments scheduled");

    let mut state = SimulationState::new(model, table, report.map(ReportRecorder::new));
    let mut snapshots = None;
    let mut probed = Vec::new();

    while let Some(moment) = schedule.pop() {
        settle_due(&mut state, moment.date);
        match moment.kind {
            MomentKind::AssetStart | MomentKind::Asset | MomentKind::AssetTracking => {
                process_asset(&mut state, &moment)?
            }
            kind if kind.is_income() => process_income(&mut state, &index, &moment)?,
            kind if kind.is_expense() => process_expense(&mut state, &index, &moment)?,
            MomentKind::Transaction => process_transaction(&mut state, &index, &moment)?,
            MomentKind::Inflation => {
                let cpi = state.value(tokens::CPI).unwrap_or(0.0);
                state.store.compound_cpi(cpi);
            }
            MomentKind::InflationAnnual => state.store.snapshot_annual_cpi(),
            MomentKind::Today => snapshots = Some(take_snapshots(&state, &index, moment.date)),
            MomentKind::BondProbe => {
                if let Some(value) = state.value(&moment.name) {
                    probed.push((generated_bond_setting(&moment.name, moment.date), value));
                }
            }
            _ => {}
        }
    }

    let (evaluations, recorder) = state.into_parts();
    Ok(PassOutcome {
        evaluations,
        recorder,
        snapshots,
        probed,
    })
}

/// Point-in-time values at the `Today` moment
fn take_snapshots(state: &SimulationState<'_>, index: &ModelIndex, today: Date) -> SimulationOutput {
    let model = state.model;
    let mut output = SimulationOutput::default();

    for asset in &model.assets {
        let Some(value) = state.value(&asset.name) else {
            continue;
        };
        let snapshot = AssetSnapshot {
            value,
            quantity: state.store.quantity(&asset.name),
            category: asset.category.clone(),
        };
        let target = if asset.is_a_debt {
            &mut output.todays_debt_values
        } else {
            &mut output.todays_asset_values
        };
        target.insert(asset.name.clone(), snapshot);
    }

    let flow = |name: &str, category: &str| FlowSnapshot {
        value: state.value(name).unwrap_or(0.0),
        category: category.to_string(),
        has_started: index.flow_start(name).is_some_and(|start| start <= today),
        has_ended: index.flow_end(name).is_some_and(|end| end <= today),
    };
    for income in &model.incomes {
        output
            .todays_income_values
            .insert(income.name.clone(), flow(&income.name, &income.category));
    }
    for expense in &model.expenses {
        output
            .todays_expense_values
            .insert(expense.name.clone(), flow(&expense.name, &expense.category));
    }

    for setting in &model.settings {
        let value = match state.value(&setting.name) {
            Some(number) => number.to_string(),
            None => state
                .store
                .stored(&setting.name)
                .map_or_else(|| setting.value.clone(), |s| s.as_text()),
        };
        output
            .todays_setting_values
            .insert(setting.name.clone(), SettingSnapshot { value });
    }
    output
}

// ============================================================================
// Bond pre-pass
// ============================================================================

/// Run the reduced model needed to price bond maturities and return the
/// generated maturity settings. Empty when the model invests in no bonds.
fn bond_prepass(
    model: &ModelData,
    range: (Date, Date),
    frequency: ViewFrequency,
    table: &TaxTable,
) -> Result<Vec<Setting>> {
    let probes = bond_probes(model, range)?;
    if probes.is_empty() {
        return Ok(Vec::new());
    }
    let Some(last_maturity) = probes.iter().map(|(_, date)| *date).max() else {
        return Ok(Vec::new());
    };
    let extended = (range.0, range.1.max(last_maturity.saturating_add(1.day())));

    let slice = bond_slice(model, &probes);
    tracing::info!(
        bonds = probes.len(),
        until = %extended.1,
        "running bond pre-pass"
    );
    let pass = simulate(
        &slice,
        extended,
        frequency,
        PassMode::BondPrePass { probes: &probes },
        table,
        None,
    )?;

    Ok(pass
        .probed
        .into_iter()
        .map(|(name, value)| {
            tracing::debug!(setting = %name, value, "generated bond maturity value");
            Setting {
                name,
                value: value.to_string(),
                setting_type: SettingType::Constant,
                ..Default::default()
            }
        })
        .collect())
}

/// (target setting, maturity date) of every bond investment in range
fn bond_probes(model: &ModelData, range: (Date, Date)) -> Result<Vec<(String, Date)>> {
    let resolver = DateResolver::new(model);
    let mut probes = Vec::new();
    for t in &model.transactions {
        let TransactionClass::BondInvest { years } = classify(t)? else {
            continue;
        };
        if !t.from_words().any(|w| w == CASH) {
            continue;
        }
        let Some(target) = bond_target(&t.from_value) else {
            continue;
        };
        for invested in investment_dates(&resolver, t, range)? {
            let maturity = invested
                .checked_add(i64::from(years).years())
                .map_err(|_| SimulationError::Date {
                    context: format!("maturity of {}", t.name),
                    source: DateError::OutOfRange(invested.to_string()),
                })?;
            let probe = (target.to_string(), maturity);
            if !probes.contains(&probe) {
                probes.push(probe);
            }
        }
    }
    Ok(probes)
}

fn investment_dates(
    resolver: &DateResolver,
    t: &Transaction,
    range: (Date, Date),
) -> Result<Vec<Date>> {
    let date = resolver
        .resolve(&t.date)
        .map_err(SimulationError::date(format!("date of transaction {}", t.name)))?;
    if t.recurrence.trim().is_empty() {
        return Ok(if date < range.1 { vec![date] } else { Vec::new() });
    }
    let recurrence: Recurrence = t.recurrence.parse()?;
    let stop = resolver
        .resolve_optional(&t.stop_date)
        .map_err(SimulationError::date(format!("stop date of transaction {}", t.name)))?
        .map_or(range.1, |stop| stop.min(range.1));
    Ok(recurrence.dates_until(date, stop))
}

/// Cash, the settings and triggers, the bond investments (so their targets
/// stay CPI-linked) and the setting revaluations that move bond targets
fn bond_slice(model: &ModelData, probes: &[(String, Date)]) -> ModelData {
    let targets: Vec<&str> = probes.iter().map(|(target, _)| target.as_str()).collect();
    let transactions = model
        .transactions
        .iter()
        .filter(|t| match classify(t) {
            Ok(TransactionClass::BondInvest { .. }) => true,
            Ok(TransactionClass::Revalue(RevalueTarget::Setting)) => model
                .expand_list(&t.to)
                .iter()
                .any(|to| targets.contains(&to.as_str())),
            _ => false,
        })
        .cloned()
        .collect();

    ModelData {
        name: format!("{} (bond pre-pass)", model.name),
        triggers: model.triggers.clone(),
        settings: model.settings.clone(),
        assets: model.asset(CASH).cloned().into_iter().collect(),
        incomes: Vec::new(),
        expenses: Vec::new(),
        transactions,
    }
}
