//! Data layer for the restaurant P&L report.
//!
//! Reads vendor exports and JSON datasets, normalizes them into monthly
//! patches, keeps the month-keyed store and aggregates month ranges.

pub mod aggregator;
pub mod normalizer;
pub mod reader;
pub mod store;

pub use pnl_core as core;
