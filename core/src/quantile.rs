//! Quantile reference table: per-sign, per-category amount ranges.
//!
//! The file is precomputed elsewhere and only read here:
//!
//! ```json
//! {
//!   "positive": { "max": { "5411": 100.0 }, "min": { "5411": 0.5 } },
//!   "negative": { "max": { "5411": -0.5 }, "min": { "5411": -900.0 } }
//! }
//! ```
//!
//! Category keys are strings on disk and integers in memory.

use crate::{
    config::Tolerance,
    error::{BudgetError, BudgetResult},
    types::MccCode,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

/// Which half of the table an amount is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignBucket {
    Negative,
    Positive,
}

impl SignBucket {
    /// Strictly negative amounts use the negative bucket; zero is positive.
    pub fn of(amount: f64) -> Self {
        if amount < 0.0 {
            SignBucket::Negative
        } else {
            SignBucket::Positive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignBucket::Negative => "negative",
            SignBucket::Positive => "positive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryRange {
    pub min: f64,
    pub max: f64,
}

impl CategoryRange {
    /// Inclusive on both ends. An amount within `tolerance` of a bound is
    /// treated as sitting on it; the slack is `atol + rtol * |bound|`, so it
    /// widens with the size of the bound.
    pub fn contains(&self, amount: f64, tolerance: &Tolerance) -> bool {
        let above_max = amount > self.max && !tolerance.is_close(amount, self.max);
        let below_min = amount < self.min && !tolerance.is_close(amount, self.min);
        !(above_max || below_min)
    }
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    max: HashMap<String, f64>,
    min: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawQuantiles {
    positive: RawBucket,
    negative: RawBucket,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantileTable {
    positive: BTreeMap<MccCode, CategoryRange>,
    negative: BTreeMap<MccCode, CategoryRange>,
}

impl QuantileTable {
    pub fn load(path: impl AsRef<Path>) -> BudgetResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| BudgetError::io(path, e))?;
        let table = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "Loaded quantile table from {}: {} positive, {} negative categories",
            path.display(),
            table.positive.len(),
            table.negative.len()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> BudgetResult<Self> {
        let raw: RawQuantiles = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    pub fn from_json_str(json: &str) -> BudgetResult<Self> {
        let raw: RawQuantiles = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawQuantiles) -> BudgetResult<Self> {
        Ok(Self {
            positive: normalize_bucket(raw.positive, SignBucket::Positive)?,
            negative: normalize_bucket(raw.negative, SignBucket::Negative)?,
        })
    }

    /// Insert or replace one range. Mostly for building tables in code.
    pub fn with_range(
        mut self,
        bucket: SignBucket,
        mcc_code: MccCode,
        min: f64,
        max: f64,
    ) -> Self {
        self.bucket_mut(bucket).insert(mcc_code, CategoryRange { min, max });
        self
    }

    pub fn bucket_for(amount: f64) -> SignBucket {
        SignBucket::of(amount)
    }

    pub fn range(&self, bucket: SignBucket, mcc_code: MccCode) -> Option<CategoryRange> {
        self.bucket(bucket).get(&mcc_code).copied()
    }

    pub fn categories(&self, bucket: SignBucket) -> impl Iterator<Item = MccCode> + '_ {
        self.bucket(bucket).keys().copied()
    }

    fn bucket(&self, bucket: SignBucket) -> &BTreeMap<MccCode, CategoryRange> {
        match bucket {
            SignBucket::Negative => &self.negative,
            SignBucket::Positive => &self.positive,
        }
    }

    fn bucket_mut(&mut self, bucket: SignBucket) -> &mut BTreeMap<MccCode, CategoryRange> {
        match bucket {
            SignBucket::Negative => &mut self.negative,
            SignBucket::Positive => &mut self.positive,
        }
    }
}

fn normalize_bucket(
    raw: RawBucket,
    bucket: SignBucket,
) -> BudgetResult<BTreeMap<MccCode, CategoryRange>> {
    let name = bucket.as_str();
    let max = normalize_keys(raw.max, name, "max")?;
    let mut min = normalize_keys(raw.min, name, "min")?;

    let mut ranges = BTreeMap::new();
    for (mcc_code, upper) in max {
        let lower = min.remove(&mcc_code).ok_or_else(|| {
            BudgetError::MalformedQuantiles(format!(
                "{name}: mcc {mcc_code} has a max but no min"
            ))
        })?;
        if lower > upper {
            return Err(BudgetError::MalformedQuantiles(format!(
                "{name}: mcc {mcc_code} has min {lower} above max {upper}"
            )));
        }
        ranges.insert(mcc_code, CategoryRange { min: lower, max: upper });
    }
    if let Some(mcc_code) = min.keys().next() {
        return Err(BudgetError::MalformedQuantiles(format!(
            "{name}: mcc {mcc_code} has a min but no max"
        )));
    }
    Ok(ranges)
}

fn normalize_keys(
    raw: HashMap<String, f64>,
    bucket: &str,
    side: &str,
) -> BudgetResult<BTreeMap<MccCode, f64>> {
    raw.into_iter()
        .map(|(key, value)| {
            let mcc_code: MccCode = key.trim().parse().map_err(|_| {
                BudgetError::MalformedQuantiles(format!(
                    "{bucket}.{side}: key '{key}' is not an integer mcc code"
                ))
            })?;
            if !value.is_finite() {
                return Err(BudgetError::MalformedQuantiles(format!(
                    "{bucket}.{side}: mcc {mcc_code} has non-finite bound {value}"
                )));
            }
            Ok((mcc_code, value))
        })
        .collect()
}
