//! Per-user edit budget tests.
//!
//! Tests cover: identity, the exact budget boundary, per-user independence,
//! configurable budgets, and early exit on the first user over budget.

use budget_core::{
    config::ValidatorConfig,
    quantile::{QuantileTable, SignBucket},
    transaction::TransactionRecord,
    validate,
    verdict::{Verdict, ViolationKind},
    BudgetValidator,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn txn(user_id: i64, minute: i64, amount: f64) -> TransactionRecord {
    TransactionRecord {
        user_id,
        mcc_code: 5411,
        currency_rk: 48,
        transaction_amt: amount,
        transaction_dttm: base_time() + Duration::minutes(minute),
    }
}

fn quantiles() -> QuantileTable {
    QuantileTable::default()
        .with_range(SignBucket::Positive, 5411, 1.0, 100.0)
        .with_range(SignBucket::Negative, 5411, -250.0, -1.0)
}

/// `rows` spending records per user, -10.0 each.
fn source_table(users: &[i64], rows: i64) -> Vec<TransactionRecord> {
    users
        .iter()
        .flat_map(|&u| (0..rows).map(move |m| txn(u, m, -10.0)))
        .collect()
}

/// Copy of `source` with the first `n` rows of `user_id` changed to -20.0.
fn edit_first(source: &[TransactionRecord], user_id: i64, n: usize) -> Vec<TransactionRecord> {
    let mut edited = 0;
    source
        .iter()
        .map(|r| {
            let mut r = r.clone();
            if r.user_id == user_id && edited < n {
                r.transaction_amt = -20.0;
                edited += 1;
            }
            r
        })
        .collect()
}

#[test]
fn dataset_compared_with_itself_respects_budget() {
    let _ = env_logger::builder().is_test(true).try_init();
    let source = source_table(&[1, 2, 3], 15);

    assert!(validate(source.clone(), source.clone(), &quantiles()).unwrap());

    let verdict = BudgetValidator::default()
        .check(source.clone(), source, &quantiles())
        .unwrap();
    assert_eq!(
        verdict,
        Verdict::Respected {
            rows_compared: 45,
            edited_rows: 0,
            users_edited: 0,
        }
    );
}

#[test]
fn exactly_budget_edits_pass_and_one_more_fails() {
    let source = source_table(&[1], 12);

    let at_budget = edit_first(&source, 1, 10);
    assert!(validate(source.clone(), at_budget, &quantiles()).unwrap());

    let over_budget = edit_first(&source, 1, 11);
    let verdict = BudgetValidator::default()
        .check(source, over_budget, &quantiles())
        .unwrap();
    let violation = verdict.violation().expect("11 edits must violate");
    assert_eq!(violation.user_id, 1);
    assert_eq!(violation.row, 10);
    assert_eq!(
        violation.kind,
        ViolationKind::BudgetExceeded {
            edits: 11,
            budget: 10
        }
    );
}

#[test]
fn budgets_are_tracked_per_user() {
    let source = source_table(&[1, 2, 3], 12);

    // Ten edits each for three users: 30 edits total, none over budget.
    let mut attack = edit_first(&source, 1, 10);
    attack = edit_first(&attack, 2, 10);
    attack = edit_first(&attack, 3, 10);

    let verdict = BudgetValidator::default()
        .check(source, attack, &quantiles())
        .unwrap();
    assert_eq!(
        verdict,
        Verdict::Respected {
            rows_compared: 36,
            edited_rows: 30,
            users_edited: 3,
        }
    );
}

#[test]
fn budget_is_configurable() {
    let source = source_table(&[1], 5);
    let attack = edit_first(&source, 1, 3);

    let strict = BudgetValidator::new(ValidatorConfig::default().with_budget(2));
    assert!(!strict.validate(source.clone(), attack.clone(), &quantiles()).unwrap());

    let exact = BudgetValidator::new(ValidatorConfig::default().with_budget(3));
    assert!(exact.validate(source.clone(), attack.clone(), &quantiles()).unwrap());

    let zero = BudgetValidator::new(ValidatorConfig::default().with_budget(0));
    assert!(zero.validate(source.clone(), source.clone(), &quantiles()).unwrap());
    assert!(!zero.validate(source, attack, &quantiles()).unwrap());
}

/// The scan stops at the first user over budget. A sign flip that sorts
/// later is never reached, so the reported violation is the budget one.
#[test]
fn first_violation_ends_the_scan() {
    let source = source_table(&[1, 2], 12);
    let mut attack = edit_first(&source, 1, 11);
    let last = attack.len() - 1;
    attack[last].transaction_amt = 10.0;

    let verdict = BudgetValidator::default()
        .check(source, attack, &quantiles())
        .unwrap();
    let violation = verdict.violation().unwrap();
    assert_eq!(violation.user_id, 1);
    assert!(matches!(violation.kind, ViolationKind::BudgetExceeded { .. }));
}

/// Edits are charged to the source row's user even when the attacker
/// rewrites `user_id` itself.
#[test]
fn rewritten_user_id_is_charged_to_the_source_user() {
    let source = vec![txn(5, 0, -10.0)];
    let mut attack = source.clone();
    attack[0].user_id = 6;

    let zero = BudgetValidator::new(ValidatorConfig::default().with_budget(0));
    let verdict = zero.check(source, attack, &quantiles()).unwrap();
    assert_eq!(verdict.violation().unwrap().user_id, 5);
}
