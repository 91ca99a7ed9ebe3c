//! Database schema and migrations
//!
//! The reporting queries read GravityFlow's tables as they exist in a
//! WordPress database. This module creates the same table shapes in SQLite so
//! a site's data can be mirrored locally (and so tests have something to read).
//!
//! Table names depend on the site prefix, so migrations are templates and the
//! applied version is tracked per site prefix in `flowstats_migrations`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::types::TablePrefix;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
///
/// `{site}` expands to the site prefix and `{base}` to the network prefix.
const MIGRATIONS: &[&str] = &[
    // Version 1: GravityFlow activity log, Gravity Forms entries, users
    r#"
    CREATE TABLE IF NOT EXISTS {base}users (
        ID               INTEGER PRIMARY KEY,
        user_login       TEXT NOT NULL DEFAULT '',
        display_name     TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS {site}gf_entry (
        id               INTEGER PRIMARY KEY,
        form_id          INTEGER NOT NULL,
        date_created     DATETIME,
        created_by       INTEGER,
        status           TEXT NOT NULL DEFAULT 'active'
    );

    CREATE TABLE IF NOT EXISTS {site}gravityflow_activity_log (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        log_object       TEXT NOT NULL,      -- 'workflow', 'step', 'assignee'
        log_event        TEXT NOT NULL,      -- 'ended', 'status', 'sent_to_step'
        log_value        TEXT,               -- 'complete', 'approved', 'rejected', 'pending'
        date_created     DATETIME NOT NULL,  -- UTC, 'YYYY-MM-DD HH:MM:SS'
        form_id          INTEGER NOT NULL,
        lead_id          INTEGER NOT NULL,   -- entry id
        assignee_id      TEXT,
        assignee_type    TEXT,               -- 'user_id', 'role', ...
        display_name     TEXT,
        feed_id          INTEGER,            -- step id
        duration         INTEGER             -- seconds
    );

    CREATE INDEX IF NOT EXISTS {site}idx_activity_form_object
        ON {site}gravityflow_activity_log(form_id, log_object, log_event);
    CREATE INDEX IF NOT EXISTS {site}idx_activity_lead
        ON {site}gravityflow_activity_log(lead_id, date_created);
    CREATE INDEX IF NOT EXISTS {site}idx_entry_form_status
        ON {site}gf_entry(form_id, status);
    "#,
    // Version 2: add-on feeds (GravityFlow stores each workflow step as a feed)
    r#"
    CREATE TABLE IF NOT EXISTS {site}gf_addon_feed (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        form_id          INTEGER NOT NULL,
        is_active        INTEGER NOT NULL DEFAULT 1,
        feed_order       INTEGER NOT NULL DEFAULT 0,
        meta             JSON,
        addon_slug       TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS {site}idx_feed_form_slug
        ON {site}gf_addon_feed(form_id, addon_slug);
    "#,
];

fn expand(template: &str, prefix: &TablePrefix) -> String {
    template
        .replace("{site}", prefix.site())
        .replace("{base}", prefix.base())
}

fn ensure_migrations_table(conn: &Connection) -> crate::error::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS flowstats_migrations (
            prefix   TEXT PRIMARY KEY,
            version  INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Run all pending migrations for one site prefix
pub fn run_migrations(conn: &Connection, prefix: &TablePrefix) -> crate::error::Result<()> {
    ensure_migrations_table(conn)?;
    let current_version = get_schema_version(conn, prefix)?;

    tracing::info!(
        prefix = prefix.site(),
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, prefix = prefix.site(), "Running migration");
            conn.execute_batch(&expand(migration, prefix))?;
            conn.execute(
                r#"
                INSERT INTO flowstats_migrations (prefix, version) VALUES (?1, ?2)
                ON CONFLICT(prefix) DO UPDATE SET version = excluded.version
                "#,
                params![prefix.site(), version],
            )?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the schema version applied for a site prefix (0 if none)
pub fn get_schema_version(conn: &Connection, prefix: &TablePrefix) -> crate::error::Result<i32> {
    ensure_migrations_table(conn)?;
    let version: Option<i32> = conn
        .query_row(
            "SELECT version FROM flowstats_migrations WHERE prefix = ?",
            [prefix.site()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}
