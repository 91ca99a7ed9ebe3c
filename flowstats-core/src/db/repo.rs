//! Database repository layer
//!
//! Connection handling plus insert and lookup operations for the mirrored
//! GravityFlow tables. Every method takes the [`TablePrefix`] of the site it
//! operates on; the prefix is the only value ever interpolated into SQL.

use crate::error::{Error, Result};
use crate::types::*;
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// Add-on slug GravityFlow registers its step feeds under.
pub const GRAVITYFLOW_ADDON_SLUG: &str = "gravityflow";

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create or upgrade the tables for a site
    pub fn migrate(&self, prefix: &TablePrefix) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn, prefix)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Users
    // ============================================

    /// Insert or update a WordPress user
    pub fn upsert_user(
        &self,
        prefix: &TablePrefix,
        id: i64,
        user_login: &str,
        display_name: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                r#"
                INSERT INTO {users} (ID, user_login, display_name)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(ID) DO UPDATE SET
                    user_login = excluded.user_login,
                    display_name = excluded.display_name
                "#,
                users = prefix.users()
            ),
            params![id, user_login, display_name],
        )?;
        Ok(())
    }

    // ============================================
    // Entries
    // ============================================

    /// Insert or update a form entry
    pub fn upsert_entry(&self, prefix: &TablePrefix, entry: &Entry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                r#"
                INSERT INTO {entries} (id, form_id, status)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    form_id = excluded.form_id,
                    status = excluded.status
                "#,
                entries = prefix.entries()
            ),
            params![entry.id, entry.form_id, entry.status.as_str()],
        )?;
        Ok(())
    }

    /// Get an entry by ID
    pub fn get_entry(&self, prefix: &TablePrefix, id: i64) -> Result<Option<Entry>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT id, form_id, status FROM {} WHERE id = ?",
                prefix.entries()
            ),
            [id],
            |row| {
                let status: String = row.get(2)?;
                Ok(Entry {
                    id: row.get(0)?,
                    form_id: row.get(1)?,
                    status: EntryStatus::from(status.as_str()),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // ============================================
    // Activity log
    // ============================================

    /// Append an activity log row, returning its id
    pub fn insert_activity_event(
        &self,
        prefix: &TablePrefix,
        event: &ActivityEvent,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        Self::insert_event_with(&conn, prefix, event)?;
        Ok(conn.last_insert_rowid())
    }

    /// Append multiple activity log rows in a transaction
    pub fn insert_activity_events(
        &self,
        prefix: &TablePrefix,
        events: &[ActivityEvent],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for event in events {
            Self::insert_event_with(&tx, prefix, event)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn insert_event_with(
        conn: &Connection,
        prefix: &TablePrefix,
        event: &ActivityEvent,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                r#"
                INSERT INTO {log} (log_object, log_event, log_value, date_created, form_id, lead_id,
                                   assignee_id, assignee_type, display_name, feed_id, duration)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                log = prefix.activity_log()
            ),
            params![
                event.object.as_str(),
                event.event.as_str(),
                event.value.as_str(),
                to_db_timestamp(event.created_at),
                event.form_id,
                event.entry_id,
                event.assignee_id,
                event.assignee_type.map(|t| t.as_str()),
                event.display_name,
                event.step_id,
                event.duration_seconds,
            ],
        )
    }

    /// All activity rows for an entry, oldest first.
    ///
    /// Rows whose object/event/value fall outside the vocabulary the reports
    /// understand are skipped.
    pub fn get_entry_activity(
        &self,
        prefix: &TablePrefix,
        entry_id: i64,
    ) -> Result<Vec<ActivityEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id, lead_id, form_id, feed_id, assignee_id, assignee_type, display_name,
                   log_object, log_event, log_value, duration, date_created
            FROM {log}
            WHERE lead_id = ?
            ORDER BY date_created, id
            "#,
            log = prefix.activity_log()
        ))?;

        let rows = stmt
            .query_map([entry_id], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().flatten().collect())
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<Option<ActivityEvent>> {
        let assignee_type: Option<String> = row.get(5)?;
        let object: String = row.get(7)?;
        let event: String = row.get(8)?;
        let value: Option<String> = row.get(9)?;
        let created_at: String = row.get(11)?;

        let parsed = (|| {
            Some(ActivityEvent {
                id: row.get(0).ok()?,
                entry_id: row.get(1).ok()?,
                form_id: row.get(2).ok()?,
                step_id: row.get(3).ok()?,
                assignee_id: row.get(4).ok()?,
                assignee_type: assignee_type.as_deref().and_then(|t| t.parse().ok()),
                display_name: row.get(6).ok()?,
                object: object.parse().ok()?,
                event: event.parse().ok()?,
                value: value.as_deref()?.parse().ok()?,
                duration_seconds: row.get(10).ok()?,
                created_at: from_db_timestamp(&created_at)?,
            })
        })();

        Ok(parsed)
    }

    // ============================================
    // Workflow steps (add-on feeds)
    // ============================================

    /// Register a workflow step as a GravityFlow feed.
    ///
    /// The step id becomes the feed id, so activity rows can reference it.
    pub fn insert_step_feed(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
        step: &WorkflowStep,
        feed_order: i64,
        is_active: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let meta = serde_json::json!({
            "step_name": step.name,
            "step_type": step.step_type,
        });
        conn.execute(
            &format!(
                r#"
                INSERT INTO {feeds} (id, form_id, is_active, feed_order, meta, addon_slug)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    form_id = excluded.form_id,
                    is_active = excluded.is_active,
                    feed_order = excluded.feed_order,
                    meta = excluded.meta
                "#,
                feeds = prefix.feeds()
            ),
            params![
                step.id,
                form_id,
                is_active,
                feed_order,
                meta.to_string(),
                GRAVITYFLOW_ADDON_SLUG
            ],
        )?;
        Ok(())
    }

    /// Active workflow steps for a form, in configured order.
    pub fn list_workflow_steps(
        &self,
        prefix: &TablePrefix,
        form_id: i64,
    ) -> Result<Vec<WorkflowStep>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id,
                   json_extract(meta, '$.step_name'),
                   COALESCE(json_extract(meta, '$.step_type'), '')
            FROM {feeds}
            WHERE form_id = ?1
              AND addon_slug = ?2
              AND is_active = 1
            ORDER BY feed_order, id
            "#,
            feeds = prefix.feeds()
        ))?;

        let steps = stmt
            .query_map(params![form_id, GRAVITYFLOW_ADDON_SLUG], |row| {
                let id: i64 = row.get(0)?;
                let name: Option<String> = row.get(1)?;
                Ok(WorkflowStep {
                    id,
                    name: name.unwrap_or_else(|| format!("Step {}", id)),
                    step_type: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(steps)
    }
}
