//! Shared primitive types used across the validator.

/// Identifier that groups transactions by account holder.
pub type UserId = i64;

/// Merchant category code. Key into the quantile reference table.
pub type MccCode = i64;

/// Currency identifier.
pub type CurrencyRk = i64;

/// Position of a row pair in the aligned (sorted) tables, 0-based.
pub type RowIndex = usize;

/// Edits allowed per user before the attack is rejected.
pub const DEFAULT_BUDGET: u32 = 10;
