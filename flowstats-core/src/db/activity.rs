//! Aggregation queries over the activity log
//!
//! Every query joins the entry table so only `active` entries count, binds
//! the form id and interval bounds as parameters, and interpolates nothing but
//! the site's table names. Averages are rounded to two decimals in SQL.
//!
//! These methods return raw `rusqlite` results; mapping failures to the
//! report error taxonomy is the aggregator's job.

use rusqlite::params;

use super::Database;
use crate::period::DateInterval;
use crate::types::TablePrefix;

/// Terminal log values, as stored.
const TERMINAL_VALUES: &str = "('complete', 'approved', 'rejected')";

/// Per-assignee totals for one form.
#[derive(Debug, Clone, PartialEq)]
pub struct AssigneeTotals {
    pub assignee_id: String,
    /// Stored assignee type (`user_id` or `role`)
    pub assignee_type: String,
    /// `users.display_name` for user assignees that still exist
    pub user_display_name: Option<String>,
    /// Name captured in the log when the event was written
    pub logged_display_name: Option<String>,
    pub total_completed: i64,
    pub total_approved: i64,
    pub avg_duration_hours: Option<f64>,
}

/// Completed-step totals for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTotals {
    pub step_id: i64,
    pub total_completed: i64,
    pub avg_duration_hours: Option<f64>,
}

/// Completed-workflow totals for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthTotals {
    /// `YYYY-MM`
    pub month_key: String,
    pub total_completed: i64,
    pub avg_duration_hours: Option<f64>,
}

/// Open pending assignments for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCount {
    pub step_id: i64,
    pub total_pending: i64,
}

impl Database {
    /// Terminal assignee events grouped by `(assignee_id, assignee_type)`.
    pub fn query_assignee_totals(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
        interval: &DateInterval,
    ) -> rusqlite::Result<Vec<AssigneeTotals>> {
        let conn = self.connection();
        let (start, end) = interval.sql_bounds();

        let sql = format!(
            r#"
            SELECT
                al.assignee_id,
                al.assignee_type,
                MAX(u.display_name),
                MAX(al.display_name),
                SUM(CASE WHEN al.log_value = 'complete' THEN 1 ELSE 0 END),
                SUM(CASE WHEN al.log_value IN ('approved', 'rejected') THEN 1 ELSE 0 END),
                ROUND(AVG(al.duration) / 3600.0, 2)
            FROM {log} al
            JOIN {entries} e ON e.id = al.lead_id AND e.form_id = al.form_id
            LEFT JOIN {users} u
                ON al.assignee_type = 'user_id' AND u.ID = CAST(al.assignee_id AS INTEGER)
            WHERE al.form_id = ?1
              AND e.status = 'active'
              AND al.log_value IN {terminal}
              AND al.assignee_type IN ('user_id', 'role')
              AND al.assignee_id IS NOT NULL
              AND (?2 IS NULL OR al.date_created >= ?2)
              AND (?3 IS NULL OR al.date_created < ?3)
            GROUP BY al.assignee_id, al.assignee_type
            "#,
            log = prefix.activity_log(),
            entries = prefix.entries(),
            users = prefix.users(),
            terminal = TERMINAL_VALUES,
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![form_id, start, end], |row| {
                Ok(AssigneeTotals {
                    assignee_id: row.get(0)?,
                    assignee_type: row.get(1)?,
                    user_display_name: row.get(2)?,
                    logged_display_name: row.get(3)?,
                    total_completed: row.get(4)?,
                    total_approved: row.get(5)?,
                    avg_duration_hours: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Step-ended terminal events grouped by step id.
    pub fn query_step_totals(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
        interval: &DateInterval,
    ) -> rusqlite::Result<Vec<StepTotals>> {
        let conn = self.connection();
        let (start, end) = interval.sql_bounds();

        let sql = format!(
            r#"
            SELECT
                al.feed_id,
                COUNT(*),
                ROUND(AVG(al.duration) / 3600.0, 2)
            FROM {log} al
            JOIN {entries} e ON e.id = al.lead_id AND e.form_id = al.form_id
            WHERE al.form_id = ?1
              AND e.status = 'active'
              AND al.log_object = 'step'
              AND al.log_event = 'ended'
              AND al.log_value IN {terminal}
              AND al.feed_id IS NOT NULL
              AND (?2 IS NULL OR al.date_created >= ?2)
              AND (?3 IS NULL OR al.date_created < ?3)
            GROUP BY al.feed_id
            "#,
            log = prefix.activity_log(),
            entries = prefix.entries(),
            terminal = TERMINAL_VALUES,
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![form_id, start, end], |row| {
                Ok(StepTotals {
                    step_id: row.get(0)?,
                    total_completed: row.get(1)?,
                    avg_duration_hours: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Workflow-ended terminal events grouped by calendar month, newest first.
    ///
    /// Months are the site's calendar months: `date_created` is shifted by
    /// `utc_offset_minutes` before bucketing.
    pub fn query_month_totals(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
        interval: &DateInterval,
        utc_offset_minutes: i32,
    ) -> rusqlite::Result<Vec<MonthTotals>> {
        let conn = self.connection();
        let (start, end) = interval.sql_bounds();
        let shift = format!("{:+} minutes", utc_offset_minutes);

        let sql = format!(
            r#"
            SELECT
                strftime('%Y-%m', al.date_created, ?4) AS month_key,
                COUNT(*),
                ROUND(AVG(al.duration) / 3600.0, 2)
            FROM {log} al
            JOIN {entries} e ON e.id = al.lead_id AND e.form_id = al.form_id
            WHERE al.form_id = ?1
              AND e.status = 'active'
              AND al.log_object = 'workflow'
              AND al.log_event = 'ended'
              AND al.log_value IN {terminal}
              AND (?2 IS NULL OR al.date_created >= ?2)
              AND (?3 IS NULL OR al.date_created < ?3)
            GROUP BY month_key
            ORDER BY month_key DESC
            "#,
            log = prefix.activity_log(),
            entries = prefix.entries(),
            terminal = TERMINAL_VALUES,
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![form_id, start, end, shift], |row| {
                Ok(MonthTotals {
                    month_key: row.get(0)?,
                    total_completed: row.get(1)?,
                    avg_duration_hours: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    /// Entries still waiting on an assignee, per step.
    ///
    /// An entry counts for a step when its most recent pending mark for that
    /// step falls in the interval and no later row for the same entry is a
    /// step approval, an assignee completion/approval, or a workflow end or
    /// send-to-step. "Later" orders by `date_created`, then row id.
    pub fn query_pending_counts(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
        interval: &DateInterval,
    ) -> rusqlite::Result<Vec<PendingCount>> {
        let conn = self.connection();
        let (start, end) = interval.sql_bounds();

        let sql = format!(
            r#"
            SELECT p.feed_id, COUNT(DISTINCT p.lead_id)
            FROM {log} p
            JOIN {entries} e ON e.id = p.lead_id AND e.form_id = p.form_id
            WHERE p.form_id = ?1
              AND e.status = 'active'
              AND p.log_object = 'assignee'
              AND p.log_event = 'status'
              AND p.log_value = 'pending'
              AND p.feed_id IS NOT NULL
              AND (?2 IS NULL OR p.date_created >= ?2)
              AND (?3 IS NULL OR p.date_created < ?3)
              AND NOT EXISTS (
                  SELECT 1 FROM {log} newer
                  WHERE newer.lead_id = p.lead_id
                    AND newer.feed_id = p.feed_id
                    AND newer.log_object = 'assignee'
                    AND newer.log_event = 'status'
                    AND newer.log_value = 'pending'
                    AND (newer.date_created > p.date_created
                         OR (newer.date_created = p.date_created AND newer.id > p.id))
              )
              AND NOT EXISTS (
                  SELECT 1 FROM {log} t
                  WHERE t.lead_id = p.lead_id
                    AND (t.date_created > p.date_created
                         OR (t.date_created = p.date_created AND t.id > p.id))
                    AND (
                        (t.log_object = 'step' AND t.log_event = 'ended'
                            AND t.log_value = 'approved')
                        OR (t.log_object = 'assignee' AND t.log_event = 'status'
                            AND t.log_value IN ('complete', 'approved'))
                        OR (t.log_object = 'workflow' AND t.log_event IN ('ended', 'sent_to_step'))
                    )
              )
            GROUP BY p.feed_id
            "#,
            log = prefix.activity_log(),
            entries = prefix.entries(),
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![form_id, start, end], |row| {
                Ok(PendingCount {
                    step_id: row.get(0)?,
                    total_pending: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}
