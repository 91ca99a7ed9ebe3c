//! Workflow statistics
//!
//! Grouped metrics over the activity log, one strategy per report
//! [`Dimension`]:
//!
//! | Dimension | Groups by | Counts |
//! |-----------|-----------|--------|
//! | `assignee` | assignee id + type | completed, approved/rejected, avg hours |
//! | `step` | configured step | completed, avg hours |
//! | `month` | calendar month | completed workflows, avg hours |
//! | `pending_by_step` | configured step | entries still waiting on an assignee |
//!
//! Each strategy implements [`Aggregation`]; [`StatsAggregator`] dispatches on
//! the dimension and wraps the rows in the matching [`ReportRows`] variant.

pub mod dimensions;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::format::Locale;
use crate::period::DateInterval;
use crate::steps::StepDirectory;
use crate::types::{AssigneeType, TablePrefix};

pub use dimensions::{ByAssignee, ByMonth, ByStep, PendingByStep};

/// Grouping axis of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Assignee,
    Step,
    Month,
    PendingByStep,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Assignee,
        Dimension::Step,
        Dimension::Month,
        Dimension::PendingByStep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Assignee => "assignee",
            Dimension::Step => "step",
            Dimension::Month => "month",
            Dimension::PendingByStep => "pending_by_step",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            // The plugin's report form used Spanish type names
            "assignee" | "encargado" => Ok(Dimension::Assignee),
            "step" | "paso" => Ok(Dimension::Step),
            "month" => Ok(Dimension::Month),
            "pending_by_step" | "pending" => Ok(Dimension::PendingByStep),
            other => Err(Error::InvalidDimension(other.to_string())),
        }
    }
}

// ============================================
// Report rows
// ============================================

/// Totals for one user or role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeRow {
    pub assignee_id: String,
    pub assignee_type: AssigneeType,
    pub display_name: String,
    pub total_completed: i64,
    /// Approved plus rejected decisions
    pub total_approved: i64,
    pub avg_duration_hours: f64,
}

/// Totals for one configured step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRow {
    pub step_id: i64,
    pub display_name: String,
    pub step_type: String,
    pub total_completed: i64,
    pub avg_duration_hours: f64,
}

/// Totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthRow {
    /// `YYYY-MM`
    pub month_key: String,
    /// Localized "Month Year"
    pub display_name: String,
    pub total_completed: i64,
    pub avg_duration_hours: f64,
}

/// Open assignments for one configured step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingStepRow {
    pub step_id: i64,
    pub display_name: String,
    pub step_type: String,
    pub total_pending: i64,
}

/// Rows of one report, tagged with their dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dimension", content = "rows", rename_all = "snake_case")]
pub enum ReportRows {
    Assignee(Vec<AssigneeRow>),
    Step(Vec<StepRow>),
    Month(Vec<MonthRow>),
    PendingByStep(Vec<PendingStepRow>),
}

impl ReportRows {
    pub fn dimension(&self) -> Dimension {
        match self {
            ReportRows::Assignee(_) => Dimension::Assignee,
            ReportRows::Step(_) => Dimension::Step,
            ReportRows::Month(_) => Dimension::Month,
            ReportRows::PendingByStep(_) => Dimension::PendingByStep,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportRows::Assignee(rows) => rows.len(),
            ReportRows::Step(rows) => rows.len(),
            ReportRows::Month(rows) => rows.len(),
            ReportRows::PendingByStep(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================
// Aggregation strategies
// ============================================

/// What an aggregation may read.
pub struct AggregationContext<'a> {
    /// Read-only database access
    pub db: &'a Database,
    /// Tables of the site being reported on
    pub prefix: &'a TablePrefix,
    /// Source of the workflow's configured steps
    pub steps: &'a dyn StepDirectory,
    /// Language for labels
    pub locale: Locale,
    /// Site clock, for calendar buckets
    pub utc_offset: FixedOffset,
}

/// One report dimension's grouping strategy.
pub trait Aggregation {
    /// Row type produced by this strategy
    type Row;

    /// Dimension this strategy computes
    fn dimension(&self) -> Dimension;

    /// Compute the rows for `form_id` over `interval`.
    ///
    /// Either every row is returned or an error is; never a partial list.
    fn aggregate(
        &self,
        ctx: &AggregationContext<'_>,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<Self::Row>>;
}

/// Runs the aggregation matching a [`Dimension`].
pub struct StatsAggregator<'a> {
    ctx: AggregationContext<'a>,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(ctx: AggregationContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compute `dimension` rows for `form_id` over `interval`.
    pub fn aggregate(
        &self,
        dimension: Dimension,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<ReportRows> {
        let span = tracing::info_span!("aggregate", %dimension, form_id);
        let _enter = span.enter();

        let result = match dimension {
            Dimension::Assignee => self
                .run(&ByAssignee, form_id, interval)
                .map(ReportRows::Assignee),
            Dimension::Step => self.run(&ByStep, form_id, interval).map(ReportRows::Step),
            Dimension::Month => self.run(&ByMonth, form_id, interval).map(ReportRows::Month),
            Dimension::PendingByStep => self
                .run(&PendingByStep, form_id, interval)
                .map(ReportRows::PendingByStep),
        };

        match &result {
            Ok(rows) => tracing::info!(rows = rows.len(), "Aggregation complete"),
            Err(e) => tracing::error!(error = %e, "Aggregation failed"),
        }

        result
    }

    fn run<A: Aggregation>(
        &self,
        strategy: &A,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<A::Row>> {
        strategy.aggregate(&self.ctx, form_id, interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension() {
        assert_eq!("assignee".parse::<Dimension>().unwrap(), Dimension::Assignee);
        assert_eq!("paso".parse::<Dimension>().unwrap(), Dimension::Step);
        assert_eq!(
            "pending_by_step".parse::<Dimension>().unwrap(),
            Dimension::PendingByStep
        );
        assert!(matches!(
            "weekday".parse::<Dimension>(),
            Err(Error::InvalidDimension(_))
        ));
        for dimension in Dimension::ALL {
            assert_eq!(dimension.as_str().parse::<Dimension>().unwrap(), dimension);
        }
    }

    #[test]
    fn test_rows_serialize_with_dimension_tag() {
        let rows = ReportRows::Month(vec![MonthRow {
            month_key: "2024-04".to_string(),
            display_name: "April 2024".to_string(),
            total_completed: 1,
            avg_duration_hours: 0.5,
        }]);
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json["dimension"], "month");
        assert_eq!(json["rows"][0]["month_key"], "2024-04");
        assert_eq!(rows.dimension(), Dimension::Month);
        assert!(!rows.is_empty());
    }
}
