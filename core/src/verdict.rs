//! Outcome of a validation pass.
//!
//! A rejected attack is an ordinary result, not an error. The first
//! violation found ends the scan and is the one reported.

use crate::{
    quantile::SignBucket,
    types::{MccCode, RowIndex, UserId},
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Respected {
        rows_compared: usize,
        edited_rows: usize,
        users_edited: usize,
    },
    Violated(Violation),
}

impl Verdict {
    pub fn is_respected(&self) -> bool {
        matches!(self, Verdict::Respected { .. })
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Respected { .. } => None,
            Verdict::Violated(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// User the offending row pair was counted against (source side).
    pub user_id: UserId,
    /// Position in the sorted tables.
    pub row: RowIndex,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    BudgetExceeded {
        edits: u32,
        budget: u32,
    },
    SignFlip {
        source_amt: f64,
        attack_amt: f64,
    },
    OutOfRange {
        mcc_code: MccCode,
        bucket: SignBucket,
        amount: f64,
        min: f64,
        max: f64,
    },
    UnknownCategory {
        mcc_code: MccCode,
        bucket: SignBucket,
        amount: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} (row {}): ", self.user_id, self.row)?;
        match &self.kind {
            ViolationKind::BudgetExceeded { edits, budget } => {
                write!(f, "{edits} edited rows exceed budget of {budget}")
            }
            ViolationKind::SignFlip {
                source_amt,
                attack_amt,
            } => write!(f, "amount sign changed from {source_amt} to {attack_amt}"),
            ViolationKind::OutOfRange {
                mcc_code,
                bucket,
                amount,
                min,
                max,
            } => write!(
                f,
                "amount {amount} outside {} range [{min}, {max}] for mcc {mcc_code}",
                bucket.as_str()
            ),
            ViolationKind::UnknownCategory {
                mcc_code,
                bucket,
                amount,
            } => write!(
                f,
                "amount {amount} has no {} range for mcc {mcc_code}",
                bucket.as_str()
            ),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Respected {
                rows_compared,
                edited_rows,
                users_edited,
            } => write!(
                f,
                "budget respected: {edited_rows} of {rows_compared} rows edited across {users_edited} users"
            ),
            Verdict::Violated(v) => write!(f, "budget violated: {v}"),
        }
    }
}
