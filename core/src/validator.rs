//! Budget validator: the single pass that decides whether an attack table
//! stays within budget of its source table.
//!
//! Per aligned row pair (source `a`, attack `b`):
//!   1. Identical pairs are skipped.
//!   2. The edit is charged to `a.user_id`; going over budget rejects.
//!   3. A sign change between `a` and `b` rejects.
//!   4. `b`'s amount must lie inside the reference range for `b`'s category
//!      and sign. The source side is never range-checked.
//!
//! The first rejection ends the scan.

use crate::{
    config::{UnknownCategoryPolicy, ValidatorConfig},
    error::{BudgetError, BudgetResult},
    quantile::{QuantileTable, SignBucket},
    transaction::{TransactionRecord, TransactionTable},
    types::UserId,
    verdict::{Verdict, Violation, ViolationKind},
};
use std::{collections::HashMap, path::Path};

/// Edits charged per user so far. Unseen users have zero edits.
#[derive(Debug, Default)]
struct EditCounter {
    counts: HashMap<UserId, u32>,
    total: usize,
}

impl EditCounter {
    /// Charge one edit to `user_id` and return that user's new count.
    fn charge(&mut self, user_id: UserId) -> u32 {
        let count = self.counts.get(&user_id).copied().unwrap_or(0) + 1;
        self.counts.insert(user_id, count);
        self.total += 1;
        count
    }

    fn users(&self) -> usize {
        self.counts.len()
    }
}

pub struct BudgetValidator {
    config: ValidatorConfig,
}

impl Default for BudgetValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

impl BudgetValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// `true` iff the attack respects the budget. Malformed or misaligned
    /// input is an `Err`, never `Ok(false)`.
    pub fn validate(
        &self,
        source: impl Into<TransactionTable>,
        attack: impl Into<TransactionTable>,
        quantiles: &QuantileTable,
    ) -> BudgetResult<bool> {
        self.check(source, attack, quantiles)
            .map(|verdict| verdict.is_respected())
    }

    /// Like `validate`, but reports which violation ended the scan.
    pub fn check(
        &self,
        source: impl Into<TransactionTable>,
        attack: impl Into<TransactionTable>,
        quantiles: &QuantileTable,
    ) -> BudgetResult<Verdict> {
        let source = source.into();
        let attack = attack.into();
        ensure_same_shape(source.len(), attack.len())?;

        let source = source.sorted_for_alignment();
        let attack = attack.sorted_for_alignment();
        log::debug!("Aligned {} row pairs", source.len());

        self.check_aligned(&source, &attack, quantiles)
    }

    /// Scan two tables that are already sorted by `(user_id, transaction_dttm)`.
    pub fn check_aligned(
        &self,
        source: &[TransactionRecord],
        attack: &[TransactionRecord],
        quantiles: &QuantileTable,
    ) -> BudgetResult<Verdict> {
        ensure_same_shape(source.len(), attack.len())?;

        let mut edits = EditCounter::default();
        for (row, (a, b)) in source.iter().zip(attack).enumerate() {
            if !a.differs_from(b, &self.config.tolerance) {
                continue;
            }
            if let Some(kind) = self.judge_edit(a, b, &mut edits, quantiles)? {
                let violation = Violation {
                    user_id: a.user_id,
                    row,
                    kind,
                };
                log::warn!("Budget violated: {violation}");
                return Ok(Verdict::Violated(violation));
            }
        }

        let verdict = Verdict::Respected {
            rows_compared: source.len(),
            edited_rows: edits.total,
            users_edited: edits.users(),
        };
        log::info!("{verdict}");
        Ok(verdict)
    }

    fn judge_edit(
        &self,
        a: &TransactionRecord,
        b: &TransactionRecord,
        edits: &mut EditCounter,
        quantiles: &QuantileTable,
    ) -> BudgetResult<Option<ViolationKind>> {
        let count = edits.charge(a.user_id);
        if count > self.config.budget {
            return Ok(Some(ViolationKind::BudgetExceeded {
                edits: count,
                budget: self.config.budget,
            }));
        }

        if !a.same_sign(b) {
            return Ok(Some(ViolationKind::SignFlip {
                source_amt: a.transaction_amt,
                attack_amt: b.transaction_amt,
            }));
        }

        let bucket = SignBucket::of(b.transaction_amt);
        match quantiles.range(bucket, b.mcc_code) {
            Some(range) if range.contains(b.transaction_amt, &self.config.tolerance) => Ok(None),
            Some(range) => Ok(Some(ViolationKind::OutOfRange {
                mcc_code: b.mcc_code,
                bucket,
                amount: b.transaction_amt,
                min: range.min,
                max: range.max,
            })),
            None => match self.config.unknown_category {
                UnknownCategoryPolicy::Reject => Ok(Some(ViolationKind::UnknownCategory {
                    mcc_code: b.mcc_code,
                    bucket,
                    amount: b.transaction_amt,
                })),
                UnknownCategoryPolicy::Fail => Err(BudgetError::UnknownCategory {
                    mcc_code: b.mcc_code,
                    bucket: bucket.as_str(),
                }),
            },
        }
    }
}

fn ensure_same_shape(source_rows: usize, attack_rows: usize) -> BudgetResult<()> {
    if source_rows != attack_rows {
        return Err(BudgetError::ShapeMismatch {
            source_rows,
            attack_rows,
        });
    }
    Ok(())
}

/// Validate with the default configuration (budget of 10 edits per user).
pub fn validate(
    source: impl Into<TransactionTable>,
    attack: impl Into<TransactionTable>,
    quantiles: &QuantileTable,
) -> BudgetResult<bool> {
    BudgetValidator::default().validate(source, attack, quantiles)
}

/// Load all three artifacts from disk and run the full check.
pub fn check_files(
    config: &ValidatorConfig,
    source_path: impl AsRef<Path>,
    attack_path: impl AsRef<Path>,
    quantile_path: impl AsRef<Path>,
) -> BudgetResult<Verdict> {
    let quantiles = QuantileTable::load(quantile_path)?;
    let source = TransactionTable::load(source_path)?;
    let attack = TransactionTable::load(attack_path)?;
    BudgetValidator::new(config.clone()).check(source, attack, &quantiles)
}
