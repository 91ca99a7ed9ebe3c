//! Database layer for flowstats
//!
//! This module provides the storage layer using SQLite with:
//! - Prefix-aware schema migrations for GravityFlow-shaped tables
//! - Repository operations for entries, activity rows and step feeds
//! - Grouped aggregation queries used by the report dimensions

pub mod activity;
pub mod repo;
pub mod schema;

pub use activity::{AssigneeTotals, MonthTotals, PendingCount, StepTotals};
pub use repo::{Database, GRAVITYFLOW_ADDON_SLUG};
