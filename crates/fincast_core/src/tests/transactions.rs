//! Tests for transaction processing
//!
//! These tests verify:
//! - Proportional and absolute transfers between holdings
//! - Transfers dated on an asset's start day see the seeded value
//! - Every TO word, categories expanded, receives its own transfer
//! - Whole-unit sales and purchases of quantised holdings
//! - Sales of CGT-tagged holdings realise the gain on the basis sold
//! - Conditional transfers fire only while the target is negative
//! - Pension contributions are taken from the income they draw on
//! - Crystallized pensions are drawn within the personal allowance

use super::*;

fn household() -> ModelData {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2019"));
    model.assets.push(asset("Savings", "1000", "1 Jan 2019"));
    model.assets.push(asset("Stocks", "0", "1 Jan 2019"));
    model
}

/// Test that a proportional transfer moves the same amount out and in
#[test]
fn test_proportional_transfer() {
    let mut model = household();
    model.transactions.push(transaction(
        "Invest",
        "Savings",
        "0.25",
        "Stocks",
        "1 Feb 2019",
    ));

    let output = run(&model);
    let out = changes(&output, "Savings", "Invest");
    let into = changes(&output, "Stocks", "Invest");
    assert_eq!(out.len(), 1);
    assert_eq!(into.len(), 1);
    assert_close(out[0].0 - out[0].1, 250.0, "taken from savings");
    assert_close(into[0].1 - into[0].0, 250.0, "credited to stocks");
}

/// Test that an absolute transfer larger than the holding is clamped
#[test]
fn test_absolute_transfer_clamped_to_holding() {
    let mut model = household();
    let mut spend = transaction("Spend", "Savings", "1500", tokens::CASH, "1 Feb 2019");
    spend.from_absolute = true;
    model.transactions.push(spend);

    let output = run(&model);
    assert_eq!(output.value_at("Savings", date(2019, 2, 1)), Some(0.0));
    assert_close(
        output.value_at(tokens::CASH, date(2019, 2, 1)).unwrap_or_default(),
        1_000.0,
        "cash receives what was available",
    );
}

/// Test that recurring transfers stop at their stop date
#[test]
fn test_recurring_transfer_stops() {
    let mut model = household();
    let mut drip = transaction("Drip", "Savings", "100", tokens::CASH, "1 Feb 2019");
    drip.from_absolute = true;
    drip.recurrence = "1m".to_string();
    drip.stop_date = "1 May 2019".to_string();
    model.transactions.push(drip);

    let output = run(&model);
    assert_eq!(changes(&output, tokens::CASH, "Drip").len(), 3);
    assert_close(
        output.final_value("Savings").unwrap_or_default(),
        700.0,
        "savings after three drips",
    );
}

/// Test that a transfer into an asset on its start day is not overwritten
/// by the seed
#[test]
fn test_transfer_into_asset_on_start_day() {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "1000", "1 Jan 2019"));
    model.assets.push(asset("Stocks", "0", "1 Jan 2019"));
    model.transactions.push(transaction(
        "Invest",
        tokens::CASH,
        "0.5",
        "Stocks",
        "1 Jan 2019",
    ));

    let output = run(&model);
    let cash = output.final_value(tokens::CASH).unwrap_or_default();
    let stocks = output.final_value("Stocks").unwrap_or_default();
    assert_close(cash, 500.0, "cash after investing half");
    assert_close(stocks, 500.0, "stocks keep the credit");
    assert_close(cash + stocks, 1_000.0, "nothing lost");
}

/// Test that a sale from an asset on its start day fires against the seed
#[test]
fn test_transfer_out_of_asset_on_start_day() {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2019"));
    model.assets.push(asset("Savings", "1000", "1 Mar 2019"));
    let mut withdraw = transaction("Withdraw", "Savings", "400", tokens::CASH, "1 Mar 2019");
    withdraw.from_absolute = true;
    model.transactions.push(withdraw);

    let output = run(&model);
    assert_eq!(changes(&output, "Savings", "Withdraw").len(), 1);
    assert_close(
        output.final_value(tokens::CASH).unwrap_or_default(),
        400.0,
        "cash receives the withdrawal",
    );
    assert_close(
        output.final_value("Savings").unwrap_or_default(),
        600.0,
        "savings after the withdrawal",
    );
}

/// Test that each TO word receives its own transfer from FROM
#[test]
fn test_transfer_to_each_target() {
    let mut model = household();
    model.assets.push(asset("Bonds", "0", "1 Jan 2019"));
    model.transactions.push(transaction(
        "Spread",
        "Savings",
        "0.25",
        "Stocks/Bonds",
        "1 Feb 2019",
    ));

    let output = run(&model);
    assert_eq!(changes(&output, "Savings", "Spread").len(), 2);
    let stocks = output.final_value("Stocks").unwrap_or_default();
    let bonds = output.final_value("Bonds").unwrap_or_default();
    let savings = output.final_value("Savings").unwrap_or_default();
    assert_close(stocks, 250.0, "quarter of 1000 to stocks");
    assert_close(bonds, 187.5, "quarter of the remaining 750 to bonds");
    assert_close(savings + stocks + bonds, 1_000.0, "conserved");
}

/// Test that a category named as TO expands to its members
#[test]
fn test_transfer_to_category() {
    let mut model = household();
    let mut growth = asset("Growth", "0", "1 Jan 2019");
    growth.category = "Investments".to_string();
    let mut gilts = asset("Gilts", "0", "1 Jan 2019");
    gilts.category = "Investments".to_string();
    model.assets.push(growth);
    model.assets.push(gilts);
    let mut invest = transaction("Invest", "Savings", "100", "Investments", "1 Feb 2019");
    invest.from_absolute = true;
    model.transactions.push(invest);

    let output = run(&model);
    assert_close(output.final_value("Growth").unwrap_or_default(), 100.0, "first member");
    assert_close(output.final_value("Gilts").unwrap_or_default(), 100.0, "second member");
    assert_close(
        output.final_value("Savings").unwrap_or_default(),
        800.0,
        "one withdrawal per member",
    );
}

/// Test that sales of a quantised holding sell whole units only
#[test]
fn test_quantised_sale_rounds_units_down() {
    let mut model = household();
    let mut shares = asset("Shares", "5", "1 Jan 2019");
    shares.quantity = "10".to_string();
    model.assets.push(shares);
    let mut sell = transaction("SellShares", "Shares", "12", tokens::CASH, "1 Feb 2019");
    sell.from_absolute = true;
    model.transactions.push(sell);

    let output = run(&model);
    assert_eq!(output.value_at("Shares", date(2019, 1, 1)), Some(50.0));
    assert_eq!(output.final_value("quantityShares"), Some(8.0));
    assert_close(
        output.final_value("Shares").unwrap_or_default(),
        40.0,
        "eight units at 5",
    );
    assert_close(
        output.final_value(tokens::CASH).unwrap_or_default(),
        10.0,
        "two units sold",
    );
}

/// Test that purchases of a quantised holding buy whole units
#[test]
fn test_quantised_purchase_buys_whole_units() {
    let mut model = household();
    let mut shares = asset("Shares", "30", "1 Jan 2019");
    shares.quantity = "0".to_string();
    model.assets.push(shares);
    let mut buy = transaction("BuyShares", "Savings", "100", "Shares", "1 Feb 2019");
    buy.from_absolute = true;
    model.transactions.push(buy);

    let output = run(&model);
    assert_eq!(output.final_value("quantityShares"), Some(3.0));
    assert_close(
        output.final_value("Savings").unwrap_or_default(),
        910.0,
        "only the cost of three units leaves savings",
    );
}

/// Test that a quantised holding without a unit price cannot be sold
#[test]
fn test_unpriced_quantised_sale_skipped() {
    let mut model = household();
    let mut shares = asset("Shares", "0", "1 Jan 2019");
    shares.quantity = "10".to_string();
    model.assets.push(shares);
    let mut sell = transaction("SellShares", "Shares", "20", tokens::CASH, "1 Feb 2019");
    sell.from_absolute = true;
    model.transactions.push(sell);

    let output = run(&model);
    assert!(output.evaluations.iter().all(|e| e.source != "SellShares"));
    assert_eq!(output.final_value("quantityShares"), Some(10.0));
    assert_eq!(output.final_value(tokens::CASH), Some(0.0));
}

/// Test that switching between two quantised holdings sells only the units
/// paying for the whole units bought
#[test]
fn test_quantised_switch_conserves_value() {
    let mut model = household();
    let mut shares = asset("Shares", "10", "1 Jan 2019");
    shares.quantity = "10".to_string();
    let mut funds = asset("Funds", "30", "1 Jan 2019");
    funds.quantity = "0".to_string();
    model.assets.push(shares);
    model.assets.push(funds);
    model
        .transactions
        .push(transaction("Switch", "Shares", "0.5", "Funds", "1 Feb 2019"));

    let output = run(&model);
    assert_eq!(output.final_value("quantityFunds"), Some(1.0));
    assert_eq!(output.final_value("quantityShares"), Some(7.0));
    let shares = output.final_value("Shares").unwrap_or_default();
    let funds = output.final_value("Funds").unwrap_or_default();
    assert_close(shares, 70.0, "three units sold");
    assert_close(funds, 30.0, "one unit bought");
    assert_close(shares + funds, 100.0, "holdings conserved");
}

/// Test that selling a CGT-tagged holding realises the gain over its
/// purchase price and the tax is settled in April
#[test]
fn test_sale_realises_capital_gain() {
    let mut model = empty_model("1 May 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 May 2019"));
    let mut stocks = asset("Stocks", "40000", "1 May 2019");
    stocks.liability = "JoeCGT".to_string();
    stocks.purchase_price = "20000".to_string();
    model.assets.push(stocks);
    model
        .transactions
        .push(transaction("SellStocks", "Stocks", "1", tokens::CASH, "1 Jun 2019"));

    let output = run(&model);
    let april = date(2020, 4, 6);
    // 20_000 gain less the 12_000 exemption at the 10% basic rate
    assert_close(
        output.value_at("Joe CGT", april).unwrap_or_default(),
        800.0,
        "CGT on the sale",
    );
    let paid: f64 = output
        .evaluations_from(tokens::CASH, "Joe CGT")
        .map(|e| e.old_value.unwrap_or_default() - e.value)
        .sum();
    assert_close(paid, 800.0, "paid from cash");
    assert_eq!(output.evaluations_for("Joe income tax").count(), 0);
}

/// Test that selling half a holding realises the gain on half the basis only
#[test]
fn test_partial_sale_reduces_basis_proportionally() {
    let mut model = empty_model("1 May 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 May 2019"));
    let mut stocks = asset("Stocks", "60000", "1 May 2019");
    stocks.liability = "JoeCGT".to_string();
    stocks.purchase_price = "20000".to_string();
    model.assets.push(stocks);
    model
        .transactions
        .push(transaction("SellHalf", "Stocks", "0.5", tokens::CASH, "1 Jun 2019"));

    let output = run(&model);
    // 30_000 sold on a 10_000 basis: 20_000 gain, 8_000 taxable at 10%
    assert_close(
        output.value_at("Joe CGT", date(2020, 4, 6)).unwrap_or_default(),
        800.0,
        "CGT on half the holding",
    );
}

fn with_liquidation(cash: &str) -> ModelData {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, cash, "1 Jan 2019"));
    model.assets.push(asset("Stocks", "1000", "1 Jan 2019"));
    let mut liquidate = transaction(
        "ConditionalSellStocks",
        "Stocks",
        "1",
        tokens::CASH,
        "1 Feb 2019",
    );
    liquidate.transaction_type = tokens::TYPE_LIQUIDATE_ASSET.to_string();
    model.transactions.push(liquidate);
    model
}

/// Test that a conditional transfer does nothing while its target is not negative
#[test]
fn test_conditional_not_fired_when_target_non_negative() {
    for cash in ["0", "250"] {
        let output = run(&with_liquidation(cash));
        assert!(
            output
                .evaluations
                .iter()
                .all(|e| e.source != "ConditionalSellStocks"),
            "nothing should move with cash at {cash}"
        );
    }
}

/// Test that a conditional transfer covers exactly the shortfall
#[test]
fn test_conditional_covers_shortfall() {
    let output = run(&with_liquidation("-300"));
    assert_close(
        output.value_at("Stocks", date(2019, 2, 1)).unwrap_or_default(),
        700.0,
        "stocks sold to cover cash",
    );
    assert_close(
        output.value_at(tokens::CASH, date(2019, 2, 1)).unwrap_or_default(),
        0.0,
        "cash restored to zero",
    );
}

/// Test that a grain setting rounds conditional sales up
#[test]
fn test_conditional_rounds_to_grain() {
    let mut model = with_liquidation("-310");
    model.settings.push(setting(tokens::GRAIN, "100"));
    let output = run(&model);
    assert_close(
        output.value_at(tokens::CASH, date(2019, 2, 1)).unwrap_or_default(),
        90.0,
        "sale rounded up to 400",
    );
}

/// Test that a pension contribution is paid from the income it draws on
#[test]
fn test_pension_contribution_from_income() {
    let mut model = empty_model("1 Jan 2019", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2019"));
    model.assets.push(asset("WorkplacePot", "0", "1 Jan 2019"));
    model
        .incomes
        .push(income("Salary", "3000", "1 Feb 2019", "JoeIncomeTax"));
    let mut contribution = transaction(
        "PensionWorkplace",
        "Salary",
        "0.05",
        "WorkplacePot",
        "1 Feb 2019",
    );
    contribution.transaction_type = tokens::TYPE_AUTO.to_string();
    model.transactions.push(contribution);

    let output = run(&model);
    let first_pay = changes(&output, tokens::CASH, "Salary");
    assert_close(first_pay[0].1 - first_pay[0].0, 2_850.0, "net pay");
    let pot = changes(&output, "WorkplacePot", "PensionWorkplace");
    assert_eq!(pot.len(), first_pay.len());
    assert_close(pot[0].1 - pot[0].0, 150.0, "contribution");
}

/// Test that a crystallized pension is drawn up to the unused allowance at
/// the year end, tax free
#[test]
fn test_crystallized_pension_swept_within_allowance() {
    let mut model = empty_model("1 Jan 2020", "1 Jan 2021", "0");
    model.assets.push(asset(tokens::CASH, "0", "1 Jan 2020"));
    let mut pot = asset("CrystallizedPensionJoe", "20000", "1 Jan 2020");
    pot.liability = "JoeIncomeTax".to_string();
    model.assets.push(pot);

    let output = run(&model);
    let drawn = changes(&output, tokens::CASH, "CrystallizedPensionJoe");
    assert_eq!(drawn.len(), 1);
    assert_close(drawn[0].1 - drawn[0].0, 12_500.0, "allowance drawn");
    assert_close(
        output.final_value("CrystallizedPensionJoe").unwrap_or_default(),
        7_500.0,
        "pension left",
    );
    assert_eq!(output.evaluations_for("Joe income tax").count(), 0);
}
