//! # flowstats-core
//!
//! Core library for flowstats - workflow completion statistics for
//! GravityFlow sites.
//!
//! This library provides:
//! - Period resolution from report selectors to UTC intervals
//! - Grouped aggregations over the GravityFlow activity log
//! - A report service that validates requests and ties the two together
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! A report request flows through three stages:
//! - **[`PeriodResolver`]:** selector (`today`, `last_week`, `last_N_months`,
//!   `custom`, `all`) to a half-open `[start, end)` interval
//! - **[`StatsAggregator`]:** one [`stats::Aggregation`] per [`Dimension`],
//!   reading only `active` entries of the requested form
//! - **[`ReportService`]:** request validation and the [`Report`] result
//!
//! ## Example
//!
//! ```rust,no_run
//! use flowstats_core::{Config, Database, FeedStepDirectory, ReportService};
//!
//! let config = Config::load().expect("failed to load config");
//! let prefix = config.database.table_prefix().expect("invalid prefix");
//!
//! let db = Database::open(&config.database.resolved_path()).expect("failed to open database");
//! let steps = FeedStepDirectory::new(&db, prefix.clone());
//! let service = ReportService::new(&db, prefix, &steps, config.report.resolver().unwrap())
//!     .with_locale(config.report.locale);
//!
//! let report = service.get_report(12, "month", "last_3_months", None, None).unwrap();
//! println!("{} rows", report.rows.len());
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use format::Locale;
pub use period::{DateInterval, PeriodResolver, PeriodSelector};
pub use report::{Envelope, Report, ReportService};
pub use stats::{Dimension, ReportRows, StatsAggregator};
pub use steps::{FeedStepDirectory, StaticStepDirectory, StepDirectory};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod period;
pub mod report;
pub mod stats;
pub mod steps;
pub mod types;
