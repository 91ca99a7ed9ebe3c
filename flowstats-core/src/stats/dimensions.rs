//! The four report strategies.

use std::collections::HashMap;

use super::{
    Aggregation, AggregationContext, AssigneeRow, Dimension, MonthRow, PendingStepRow, StepRow,
};
use crate::db::AssigneeTotals;
use crate::error::{Error, Result};
use crate::format::round_to;
use crate::period::DateInterval;
use crate::types::{AssigneeType, WorkflowStep};

/// Average hours as shown in reports: one decimal, zero when unknown.
fn display_hours(avg: Option<f64>) -> f64 {
    round_to(avg.unwrap_or(0.0), 1)
}

/// Configured steps for the form, or `NoStepsConfigured`.
///
/// A store failure while reading the step list is reported against
/// `dimension` like any other aggregation query failure.
fn configured_steps(
    ctx: &AggregationContext<'_>,
    form_id: i64,
    dimension: Dimension,
) -> Result<Vec<WorkflowStep>> {
    let steps = ctx.steps.steps(form_id).map_err(|e| match e {
        Error::Database(source) => Error::aggregation(dimension, source),
        other => other,
    })?;
    if steps.is_empty() {
        tracing::warn!(form_id, "No workflow steps configured");
        return Err(Error::NoStepsConfigured(form_id));
    }
    tracing::debug!(form_id, steps = steps.len(), "Loaded workflow steps");
    Ok(steps)
}

/// Completed and approved tasks per user or role.
pub struct ByAssignee;

impl ByAssignee {
    /// Label shown for an assignee.
    ///
    /// Roles are shown as the upper-cased role name; users by their current
    /// display name, then the name the log captured, then their id.
    pub fn label(totals: &AssigneeTotals, assignee_type: AssigneeType) -> String {
        match assignee_type {
            AssigneeType::Role => totals.assignee_id.to_uppercase(),
            AssigneeType::User => totals
                .user_display_name
                .iter()
                .chain(totals.logged_display_name.iter())
                .find(|name| !name.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| format!("User #{}", totals.assignee_id)),
        }
    }
}

impl Aggregation for ByAssignee {
    type Row = AssigneeRow;

    fn dimension(&self) -> Dimension {
        Dimension::Assignee
    }

    fn aggregate(
        &self,
        ctx: &AggregationContext<'_>,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<AssigneeRow>> {
        let totals = ctx
            .db
            .query_assignee_totals(ctx.prefix, form_id, interval)
            .map_err(|e| Error::aggregation(self.dimension(), e))?;

        let mut rows: Vec<AssigneeRow> = totals
            .into_iter()
            .filter_map(|t| {
                let assignee_type = match t.assignee_type.parse::<AssigneeType>() {
                    Ok(kind) => kind,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping assignee group");
                        return None;
                    }
                };
                Some(AssigneeRow {
                    display_name: Self::label(&t, assignee_type),
                    assignee_type,
                    total_completed: t.total_completed,
                    total_approved: t.total_approved,
                    avg_duration_hours: display_hours(t.avg_duration_hours),
                    assignee_id: t.assignee_id,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.assignee_id.cmp(&b.assignee_id))
                .then_with(|| a.assignee_type.as_str().cmp(b.assignee_type.as_str()))
        });

        Ok(rows)
    }
}

/// Completed tasks per configured step.
pub struct ByStep;

impl Aggregation for ByStep {
    type Row = StepRow;

    fn dimension(&self) -> Dimension {
        Dimension::Step
    }

    fn aggregate(
        &self,
        ctx: &AggregationContext<'_>,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<StepRow>> {
        let steps = configured_steps(ctx, form_id, self.dimension())?;
        let totals: HashMap<i64, _> = ctx
            .db
            .query_step_totals(ctx.prefix, form_id, interval)
            .map_err(|e| Error::aggregation(self.dimension(), e))?
            .into_iter()
            .map(|t| (t.step_id, t))
            .collect();

        let rows = steps
            .into_iter()
            .map(|step| {
                let matched = totals.get(&step.id);
                StepRow {
                    step_id: step.id,
                    display_name: step.name,
                    step_type: step.step_type,
                    total_completed: matched.map_or(0, |t| t.total_completed),
                    avg_duration_hours: display_hours(
                        matched.and_then(|t| t.avg_duration_hours),
                    ),
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Completed workflows per calendar month, newest first.
pub struct ByMonth;

impl Aggregation for ByMonth {
    type Row = MonthRow;

    fn dimension(&self) -> Dimension {
        Dimension::Month
    }

    fn aggregate(
        &self,
        ctx: &AggregationContext<'_>,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<MonthRow>> {
        let totals = ctx
            .db
            .query_month_totals(
                ctx.prefix,
                form_id,
                interval,
                ctx.utc_offset.local_minus_utc() / 60,
            )
            .map_err(|e| Error::aggregation(self.dimension(), e))?;

        Ok(totals
            .into_iter()
            .map(|t| MonthRow {
                display_name: ctx.locale.month_label(&t.month_key),
                month_key: t.month_key,
                total_completed: t.total_completed,
                avg_duration_hours: display_hours(t.avg_duration_hours),
            })
            .collect())
    }
}

/// Entries still waiting on an assignee, per configured step.
pub struct PendingByStep;

impl Aggregation for PendingByStep {
    type Row = PendingStepRow;

    fn dimension(&self) -> Dimension {
        Dimension::PendingByStep
    }

    fn aggregate(
        &self,
        ctx: &AggregationContext<'_>,
        form_id: i64,
        interval: &DateInterval,
    ) -> Result<Vec<PendingStepRow>> {
        let steps = configured_steps(ctx, form_id, self.dimension())?;
        let counts: HashMap<i64, i64> = ctx
            .db
            .query_pending_counts(ctx.prefix, form_id, interval)
            .map_err(|e| Error::aggregation(self.dimension(), e))?
            .into_iter()
            .map(|c| (c.step_id, c.total_pending))
            .collect();

        Ok(steps
            .into_iter()
            .map(|step| PendingStepRow {
                total_pending: counts.get(&step.id).copied().unwrap_or(0),
                step_id: step.id,
                display_name: step.name,
                step_type: step.step_type,
            })
            .collect())
    }
}
