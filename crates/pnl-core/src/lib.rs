//! Core data model for the restaurant P&L report.
//!
//! Month keys, monthly records and per-category patches, range summaries,
//! the error type, configuration, decimal money helpers, formatting and
//! industry benchmark insights.

pub mod benchmarks;
pub mod calculations;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{PnlError, Result};
