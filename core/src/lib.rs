//! Perturbation budget validation for transaction datasets.
//!
//! Compares an attack table against its source table and decides whether
//! every user's edits stay within budget, keep their sign, and land inside
//! the reference range for their merchant category.

pub mod config;
pub mod error;
pub mod quantile;
pub mod transaction;
pub mod types;
pub mod validator;
pub mod verdict;

pub use validator::{validate, BudgetValidator};
