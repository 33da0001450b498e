//! Transaction records and the CSV tables they are loaded from.
//!
//! Source and attack tables share one schema. Each must carry a header row
//! with at least `user_id`, `mcc_code`, `currency_rk`, `transaction_amt` and
//! `transaction_dttm`; other columns are ignored and column order is free.
//!
//! Alignment rule: both tables are stable-sorted by
//! `(user_id, transaction_dttm)` and then compared position by position.
//! There is no row id.

use crate::{
    config::Tolerance,
    error::{BudgetError, BudgetResult},
    types::{CurrencyRk, MccCode, UserId},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Read, path::Path};

const REQUIRED_COLUMNS: &[&str] = &[
    "user_id",
    "mcc_code",
    "currency_rk",
    "transaction_amt",
    "transaction_dttm",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub user_id: UserId,
    pub mcc_code: MccCode,
    pub currency_rk: CurrencyRk,
    pub transaction_amt: f64,
    pub transaction_dttm: NaiveDateTime,
}

impl TransactionRecord {
    /// True unless every field matches, amounts compared within `tolerance`.
    /// `self` is the source row, `other` the attack row.
    pub fn differs_from(&self, other: &TransactionRecord, tolerance: &Tolerance) -> bool {
        !(self.user_id == other.user_id
            && self.mcc_code == other.mcc_code
            && self.currency_rk == other.currency_rk
            && tolerance.is_close(self.transaction_amt, other.transaction_amt)
            && self.transaction_dttm == other.transaction_dttm)
    }

    /// `None` when the amount is NaN.
    pub fn sign(&self) -> Option<AmountSign> {
        AmountSign::of(self.transaction_amt)
    }

    /// Both signs defined and equal. Zero only matches zero.
    pub fn same_sign(&self, other: &TransactionRecord) -> bool {
        matches!((self.sign(), other.sign()), (Some(a), Some(b)) if a == b)
    }

    fn alignment_key(&self) -> (UserId, NaiveDateTime) {
        (self.user_id, self.transaction_dttm)
    }
}

/// Three-valued sign of an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSign {
    Negative,
    Zero,
    Positive,
}

impl AmountSign {
    pub fn of(amount: f64) -> Option<Self> {
        if amount < 0.0 {
            Some(AmountSign::Negative)
        } else if amount > 0.0 {
            Some(AmountSign::Positive)
        } else if amount == 0.0 {
            Some(AmountSign::Zero)
        } else {
            None
        }
    }
}

// Raw CSV row. Everything arrives as text so that parse failures can name
// the row and column instead of surfacing a generic deserializer message.
#[derive(Debug, Deserialize)]
struct RawRecord {
    user_id: String,
    mcc_code: String,
    currency_rk: String,
    transaction_amt: String,
    transaction_dttm: String,
}

impl RawRecord {
    fn parse(self, row: usize) -> BudgetResult<TransactionRecord> {
        let transaction_amt: f64 = parse_field(&self.transaction_amt, "transaction_amt", row)?;
        if !transaction_amt.is_finite() {
            return Err(BudgetError::MalformedRecord {
                row,
                reason: format!("transaction_amt is not finite: '{}'", self.transaction_amt),
            });
        }
        Ok(TransactionRecord {
            user_id: parse_field(&self.user_id, "user_id", row)?,
            mcc_code: parse_field(&self.mcc_code, "mcc_code", row)?,
            currency_rk: parse_field(&self.currency_rk, "currency_rk", row)?,
            transaction_amt,
            transaction_dttm: parse_timestamp(&self.transaction_dttm).ok_or_else(|| {
                BudgetError::Timestamp {
                    row,
                    value: self.transaction_dttm.clone(),
                }
            })?,
        })
    }
}

fn parse_field<T>(value: &str, column: &str, row: usize) -> BudgetResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| BudgetError::MalformedRecord {
            row,
            reason: format!("{column} = '{value}': {e}"),
        })
}

/// Parse a timestamp in any of the accepted layouts. Offsets are
/// normalized to UTC; a bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// An in-memory transaction table, in file order until sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionTable {
    records: Vec<TransactionRecord>,
}

impl TransactionTable {
    pub fn new(records: Vec<TransactionRecord>) -> Self {
        Self { records }
    }

    pub fn load(path: impl AsRef<Path>) -> BudgetResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| BudgetError::io(path, e))?;
        let table = Self::from_reader(file)?;
        log::debug!("Loaded {} transactions from {}", table.len(), path.display());
        Ok(table)
    }

    /// Data rows are numbered from 1; row 0 is the header.
    pub fn from_reader<R: Read>(reader: R) -> BudgetResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?;
        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|col| !headers.iter().any(|h| h == **col))
        {
            return Err(BudgetError::MalformedRecord {
                row: 0,
                reason: format!("missing column '{missing}'"),
            });
        }

        let mut records = Vec::new();
        for (i, raw) in csv_reader.deserialize::<RawRecord>().enumerate() {
            let row = i + 1;
            let raw = raw.map_err(|e| BudgetError::MalformedRecord {
                row,
                reason: e.to_string(),
            })?;
            records.push(raw.parse(row)?);
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Stable sort by `(user_id, transaction_dttm)`. Ties keep file order.
    pub fn sorted_for_alignment(mut self) -> Vec<TransactionRecord> {
        self.records.sort_by_key(TransactionRecord::alignment_key);
        self.records
    }
}

impl From<Vec<TransactionRecord>> for TransactionTable {
    fn from(records: Vec<TransactionRecord>) -> Self {
        Self::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_time(NaiveTime::parse_from_str(time, "%H:%M:%S%.f").unwrap())
    }

    #[test]
    fn timestamp_layouts() {
        assert_eq!(
            parse_timestamp("2022-03-01 12:30:05"),
            Some(at("2022-03-01", "12:30:05"))
        );
        assert_eq!(
            parse_timestamp("2022-03-01T12:30:05.250"),
            Some(at("2022-03-01", "12:30:05.250"))
        );
        assert_eq!(
            parse_timestamp("2022-03-01 12:30"),
            Some(at("2022-03-01", "12:30:00"))
        );
        assert_eq!(
            parse_timestamp("2022-03-01"),
            Some(at("2022-03-01", "00:00:00"))
        );
        assert_eq!(
            parse_timestamp("2022-03-01T12:30:05+03:00"),
            Some(at("2022-03-01", "09:30:05"))
        );
        assert_eq!(parse_timestamp("01/03/2022"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn sign_is_three_valued() {
        assert_eq!(AmountSign::of(-3.5), Some(AmountSign::Negative));
        assert_eq!(AmountSign::of(0.0), Some(AmountSign::Zero));
        assert_eq!(AmountSign::of(-0.0), Some(AmountSign::Zero));
        assert_eq!(AmountSign::of(2.0), Some(AmountSign::Positive));
        assert_eq!(AmountSign::of(f64::NAN), None);
    }

    #[test]
    fn raw_rows_report_their_position() {
        let csv = "user_id,mcc_code,currency_rk,transaction_amt,transaction_dttm\n\
                   1,5411,48,-10.0,2022-01-01 10:00:00\n\
                   2,5411,48,abc,2022-01-01 10:00:00\n";
        match TransactionTable::from_reader(csv.as_bytes()) {
            Err(BudgetError::MalformedRecord { row, reason }) => {
                assert_eq!(row, 2);
                assert!(reason.contains("transaction_amt"), "reason: {reason}");
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_reported_against_the_header() {
        let csv = "user_id,mcc_code,transaction_amt,transaction_dttm\n\
                   1,5411,-10.0,2022-01-01 10:00:00\n";
        match TransactionTable::from_reader(csv.as_bytes()) {
            Err(BudgetError::MalformedRecord { row, reason }) => {
                assert_eq!(row, 0);
                assert!(reason.contains("currency_rk"), "reason: {reason}");
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn extra_columns_and_column_order_are_ignored() {
        let csv = "transaction_dttm,extra,transaction_amt,currency_rk,mcc_code,user_id\n\
                   2022-01-01 10:00:00,x,-10.5,48,5411,7\n";
        let table = TransactionTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        let rec = &table.records()[0];
        assert_eq!(rec.user_id, 7);
        assert_eq!(rec.mcc_code, 5411);
        assert_eq!(rec.currency_rk, 48);
        assert_eq!(rec.transaction_amt, -10.5);
    }

    #[test]
    fn non_finite_amounts_are_malformed() {
        let csv = "user_id,mcc_code,currency_rk,transaction_amt,transaction_dttm\n\
                   1,5411,48,NaN,2022-01-01 10:00:00\n";
        assert!(matches!(
            TransactionTable::from_reader(csv.as_bytes()),
            Err(BudgetError::MalformedRecord { row: 1, .. })
        ));
    }
}
