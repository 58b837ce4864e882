//! Tests for tax accrual and settlement over whole runs
//!
//! These tests verify:
//! - National Insurance is estimated monthly and trued up in April
//! - Income below the allowance produces no tax writes at all
//! - Flexible income is only taxed at the year end
//! - Revaluing an income-tax-tagged asset is income, not a capital gain
//! - Drawdown and pay in the same year are taxed together
//! - Bands past the last table year follow CPI

use super::*;

/// Test that NI estimates plus the April balance equal the year's liability
#[test]
fn test_national_insurance_settlement() {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2019"));
    model.incomes.push(income(
        "Job",
        "2500",
        "10 Apr 2019",
        "JoeIncomeTax/JoeNI",
    ));

    let output = run(&model);
    let april = date(2020, 4, 6);

    let ni = output.value_at("Joe NI", april).unwrap_or_default();
    assert!((ni - 2_564.16).abs() < 0.011, "NI on 30_000, got {ni}");
    let income_tax = output.value_at("Joe income tax", april).unwrap_or_default();
    assert_close(income_tax, 3_500.0, "income tax on 30_000");

    for (subject, liability) in [("Joe NI", ni), ("Joe income tax", income_tax)] {
        let paid: f64 = output
            .evaluations_from(tokens::CASH, subject)
            .filter(|e| e.date <= april)
            .map(|e| e.old_value.unwrap_or_default() - e.value)
            .sum();
        assert_close(paid, liability, subject);
    }
}

/// Test that a year with nothing to pay writes no tax and leaves cash alone
#[test]
fn test_zero_liability_year_is_silent() {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2019"));
    model
        .incomes
        .push(income("PartTime", "500", "1 Jan 2019", "JoeIncomeTax"));

    let output = run(&model);
    assert_eq!(output.evaluations_for("Joe income tax").count(), 0);
    assert!(
        output
            .evaluations_for(tokens::CASH)
            .all(|e| e.source == "PartTime" || e.source == tokens::CASH || e.source == "growth"),
        "only pay, seeding and growth may touch cash"
    );
}

/// Test that drawdown from a crystallized pension is taxed once, in April
#[test]
fn test_flexible_income_taxed_at_year_end() {
    // starts after 6 April 2019 so no allowance sweep runs before the drawdown
    let mut model = empty_model("1 May 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 May 2019"));
    let mut pot = asset("CrystallizedPensionJoe", "30000", "1 May 2019");
    pot.liability = "JoeIncomeTax".to_string();
    model.assets.push(pot);
    let mut drawdown = transaction(
        "Drawdown",
        "CrystallizedPensionJoe",
        "20000",
        tokens::CASH,
        "1 Jun 2019",
    );
    drawdown.from_absolute = true;
    model.transactions.push(drawdown);

    let output = run(&model);
    let debits: Vec<_> = output
        .evaluations_from(tokens::CASH, "Joe income tax")
        .collect();
    assert_eq!(debits.len(), 1, "no monthly estimates on flexible income");
    assert_eq!(debits[0].date, date(2020, 4, 6));
    // 20_000 less the 12_500 allowance at 20%
    assert_close(
        debits[0].old_value.unwrap_or_default() - debits[0].value,
        1_500.0,
        "tax on drawdown",
    );
}

/// Test that a revaluation of an income-tax-tagged asset is taxed as income
#[test]
fn test_income_tagged_revaluation_taxed_as_income() {
    let mut model = empty_model("1 May 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 May 2019"));
    let mut fund = asset("Fund", "10000", "1 May 2019");
    fund.liability = "JoeIncomeTax".to_string();
    model.assets.push(fund);
    let mut revalue = transaction("RevalueFund", "", "", "Fund", "1 Jun 2019");
    revalue.to_absolute = true;
    revalue.to_value = "30000".to_string();
    revalue.transaction_type = tokens::TYPE_REVALUE_ASSET.to_string();
    model.transactions.push(revalue);

    let output = run(&model);
    assert_eq!(output.evaluations_for("Joe CGT").count(), 0);
    // 20_000 gain less the 12_500 allowance at 20%
    let debits = changes(&output, tokens::CASH, "Joe income tax");
    assert_eq!(debits.len(), 1);
    assert_close(debits[0].0 - debits[0].1, 1_500.0, "tax on the gain");
    assert_close(
        output
            .value_at("Joe income tax", date(2020, 4, 6))
            .unwrap_or_default(),
        1_500.0,
        "year liability",
    );
}

/// Test that drawdown lands on top of a year's pay when settled
#[test]
fn test_drawdown_taxed_with_fixed_income() {
    let mut model = empty_model("1 May 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 May 2019"));
    model
        .incomes
        .push(income("Job", "2000", "1 May 2019", "JoeIncomeTax"));
    let mut pot = asset("CrystallizedPensionJoe", "30000", "1 May 2019");
    pot.liability = "JoeIncomeTax".to_string();
    model.assets.push(pot);
    let mut drawdown = transaction(
        "Drawdown",
        "CrystallizedPensionJoe",
        "10000",
        tokens::CASH,
        "1 Jun 2019",
    );
    drawdown.from_absolute = true;
    model.transactions.push(drawdown);

    let output = run(&model);
    let april = date(2020, 4, 6);
    // 24_000 pay plus 10_000 drawdown, less 12_500, at 20%
    let liability = output.value_at("Joe income tax", april).unwrap_or_default();
    assert_close(liability, 4_300.0, "income tax on 34_000");

    let debits: Vec<_> = output
        .evaluations_from(tokens::CASH, "Joe income tax")
        .filter(|e| e.date <= april)
        .collect();
    assert_eq!(debits.len(), 13, "twelve estimates and the balance");
    // estimates cover the pay only
    let estimate = debits[0].old_value.unwrap_or_default() - debits[0].value;
    assert_close(estimate, 191.66, "monthly estimate on 2_000");
    let paid: f64 = debits
        .iter()
        .map(|e| e.old_value.unwrap_or_default() - e.value)
        .sum();
    assert_close(paid, liability, "paid in total");
    assert_eq!(
        output.value_at("CrystallizedPensionJoe", april),
        Some(20_000.0),
        "no allowance left to sweep"
    );
}

/// Income tax for the years closing in April 2025 and April 2026
fn tax_either_side_of_table(cpi: &str) -> (f64, f64) {
    let mut model = empty_model("1 Jan 2024", "1 Jan 2027", cpi);
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2024"));
    model
        .incomes
        .push(income("Job", "2000", "1 Jan 2024", "JoeIncomeTax"));

    let output = run(&model);
    let tax = |when: Date| output.value_at("Joe income tax", when).unwrap_or_default();
    (tax(date(2025, 4, 6)), tax(date(2026, 4, 6)))
}

/// Test that bands past the table hold still without inflation and rise
/// with it
#[test]
fn test_bands_past_table_follow_cpi() {
    let (last_flat, later_flat) = tax_either_side_of_table("0");
    assert!(last_flat > 0.0);
    assert_close(later_flat, last_flat, "no inflation, same bands");

    let (last, later) = tax_either_side_of_table("5");
    assert_close(last, last_flat, "table years ignore CPI");
    assert!(
        later < last - 100.0,
        "allowance raised by CPI should cut the tax: {last} then {later}"
    );
}
