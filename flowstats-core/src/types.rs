//! Core domain types for flowstats
//!
//! These types mirror the rows GravityFlow writes to its activity log and the
//! Gravity Forms entry table. They are read-only from the reporting side; the
//! insert helpers on [`Database`](crate::Database) exist so mirrors and test
//! fixtures can be loaded.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Form** | A Gravity Forms form; each form carries one workflow |
//! | **Step** | One stage of a workflow, stored as a feed row (feed id = step id) |
//! | **Entry** | One submitted form instance, i.e. one run of the workflow |
//! | **Assignee** | A user or role responsible for acting on a step |
//! | **Activity log** | Append-only stream of workflow/step/assignee transitions |

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp format used by the `date_created` columns (MySQL `DATETIME`, UTC).
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp the way the activity log stores it.
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Parse an activity log timestamp.
pub fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, DB_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

// ============================================
// Table prefix
// ============================================

/// Resolved table-name prefix for one WordPress site.
///
/// On multisite installs every site has its own set of plugin tables
/// (`wp_2_gf_entry`, ...) while the users table is shared and always lives
/// under the network's base prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablePrefix {
    base: String,
    site: String,
}

impl TablePrefix {
    /// Prefix for a single-site install (or the main site of a network).
    pub fn new(base: &str) -> Result<Self> {
        validate_prefix(base)?;
        Ok(Self {
            base: base.to_string(),
            site: base.to_string(),
        })
    }

    /// Prefix for `blog_id` on a multisite network.
    ///
    /// Blog 1 is the main site and uses the base prefix unchanged.
    pub fn for_site(base: &str, blog_id: u64) -> Result<Self> {
        validate_prefix(base)?;
        if blog_id == 0 {
            return Err(Error::Config("blog id must be at least 1".to_string()));
        }
        let site = if blog_id == 1 {
            base.to_string()
        } else {
            format!("{}{}_", base, blog_id)
        };
        Ok(Self {
            base: base.to_string(),
            site,
        })
    }

    /// Prefix of the network-wide tables.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Prefix of this site's tables.
    pub fn site(&self) -> &str {
        &self.site
    }

    /// `{site}gravityflow_activity_log`
    pub fn activity_log(&self) -> String {
        format!("{}gravityflow_activity_log", self.site)
    }

    /// `{site}gf_entry`
    pub fn entries(&self) -> String {
        format!("{}gf_entry", self.site)
    }

    /// `{site}gf_addon_feed`
    pub fn feeds(&self) -> String {
        format!("{}gf_addon_feed", self.site)
    }

    /// `{base}users`
    pub fn users(&self) -> String {
        format!("{}users", self.base)
    }
}

impl Default for TablePrefix {
    fn default() -> Self {
        Self {
            base: "wp_".to_string(),
            site: "wp_".to_string(),
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTablePrefix(prefix.to_string()))
    }
}

// ============================================
// Activity log vocabulary
// ============================================

/// What an activity log row is about (`log_object`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogObject {
    Workflow,
    Step,
    Assignee,
}

impl LogObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogObject::Workflow => "workflow",
            LogObject::Step => "step",
            LogObject::Assignee => "assignee",
        }
    }
}

impl std::str::FromStr for LogObject {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(LogObject::Workflow),
            "step" => Ok(LogObject::Step),
            "assignee" => Ok(LogObject::Assignee),
            _ => Err(format!("unknown log object: {}", s)),
        }
    }
}

/// The transition recorded by an activity log row (`log_event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    Ended,
    Status,
    SentToStep,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::Ended => "ended",
            LogEvent::Status => "status",
            LogEvent::SentToStep => "sent_to_step",
        }
    }
}

impl std::str::FromStr for LogEvent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ended" => Ok(LogEvent::Ended),
            "status" => Ok(LogEvent::Status),
            "sent_to_step" => Ok(LogEvent::SentToStep),
            _ => Err(format!("unknown log event: {}", s)),
        }
    }
}

/// Outcome carried by an activity log row (`log_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogValue {
    Complete,
    Approved,
    Rejected,
    Pending,
}

impl LogValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogValue::Complete => "complete",
            LogValue::Approved => "approved",
            LogValue::Rejected => "rejected",
            LogValue::Pending => "pending",
        }
    }

    /// Values that close out a task.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LogValue::Pending)
    }
}

impl std::str::FromStr for LogValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "complete" => Ok(LogValue::Complete),
            "approved" => Ok(LogValue::Approved),
            "rejected" => Ok(LogValue::Rejected),
            "pending" => Ok(LogValue::Pending),
            _ => Err(format!("unknown log value: {}", s)),
        }
    }
}

/// Kind of assignee a task was given to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssigneeType {
    User,
    Role,
}

impl AssigneeType {
    /// Returns the identifier GravityFlow stores in `assignee_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            AssigneeType::User => "user_id",
            AssigneeType::Role => "role",
        }
    }
}

impl std::str::FromStr for AssigneeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user_id" | "user" => Ok(AssigneeType::User),
            "role" => Ok(AssigneeType::Role),
            _ => Err(format!("unknown assignee type: {}", s)),
        }
    }
}

// ============================================
// Entries and events
// ============================================

/// Gravity Forms entry status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Spam,
    Trash,
    Other(String),
}

impl EntryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Spam => "spam",
            EntryStatus::Trash => "trash",
            EntryStatus::Other(s) => s,
        }
    }
}

impl From<&str> for EntryStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => EntryStatus::Active,
            "spam" => EntryStatus::Spam,
            "trash" => EntryStatus::Trash,
            other => EntryStatus::Other(other.to_string()),
        }
    }
}

/// One submitted form instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub form_id: i64,
    pub status: EntryStatus,
}

/// One activity log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Row id; assigned by the store on insert
    pub id: i64,
    /// Entry (workflow instance) this event belongs to
    pub entry_id: i64,
    pub form_id: i64,
    /// Step (feed) id, only set for step and assignee events
    pub step_id: Option<i64>,
    pub assignee_id: Option<String>,
    pub assignee_type: Option<AssigneeType>,
    /// Display name GravityFlow captured when the event was logged
    pub display_name: Option<String>,
    pub object: LogObject,
    pub event: LogEvent,
    pub value: LogValue,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEvent {
    /// A workflow-level `ended` event.
    pub fn workflow_ended(
        entry_id: i64,
        form_id: i64,
        value: LogValue,
        duration_seconds: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            entry_id,
            form_id,
            step_id: None,
            assignee_id: None,
            assignee_type: None,
            display_name: None,
            object: LogObject::Workflow,
            event: LogEvent::Ended,
            value,
            duration_seconds,
            created_at,
        }
    }

    /// A step-level `ended` event.
    pub fn step_ended(
        entry_id: i64,
        form_id: i64,
        step_id: i64,
        value: LogValue,
        duration_seconds: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            step_id: Some(step_id),
            object: LogObject::Step,
            ..Self::workflow_ended(entry_id, form_id, value, duration_seconds, created_at)
        }
    }

    /// An assignee `status` event.
    pub fn assignee_status(
        entry_id: i64,
        form_id: i64,
        step_id: i64,
        assignee_type: AssigneeType,
        assignee_id: &str,
        value: LogValue,
        duration_seconds: Option<i64>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            entry_id,
            form_id,
            step_id: Some(step_id),
            assignee_id: Some(assignee_id.to_string()),
            assignee_type: Some(assignee_type),
            display_name: None,
            object: LogObject::Assignee,
            event: LogEvent::Status,
            value,
            duration_seconds,
            created_at,
        }
    }
}

/// One configured workflow step, as reported by a step directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub name: String,
    /// GravityFlow step type (`approval`, `user_input`, `notification`, ...)
    pub step_type: String,
}

impl WorkflowStep {
    pub fn new(id: i64, name: &str, step_type: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            step_type: step_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_site_prefix_for_multisite() {
        let main = TablePrefix::for_site("wp_", 1).unwrap();
        assert_eq!(main.activity_log(), "wp_gravityflow_activity_log");

        let child = TablePrefix::for_site("wp_", 3).unwrap();
        assert_eq!(child.activity_log(), "wp_3_gravityflow_activity_log");
        assert_eq!(child.entries(), "wp_3_gf_entry");
        assert_eq!(child.users(), "wp_users");
    }

    #[test]
    fn test_prefix_rejects_identifier_breaking_input() {
        assert!(matches!(
            TablePrefix::new("wp_; DROP TABLE x"),
            Err(Error::InvalidTablePrefix(_))
        ));
        assert!(TablePrefix::new("").is_err());
        assert!(TablePrefix::for_site("wp_", 0).is_err());
    }

    #[test]
    fn test_assignee_type_storage_names() {
        assert_eq!(AssigneeType::User.as_str(), "user_id");
        assert_eq!("user_id".parse::<AssigneeType>(), Ok(AssigneeType::User));
        assert_eq!("role".parse::<AssigneeType>(), Ok(AssigneeType::Role));
        assert!("email".parse::<AssigneeType>().is_err());
    }

    #[test]
    fn test_db_timestamp_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let s = to_db_timestamp(ts);
        assert_eq!(s, "2024-03-05 14:07:09");
        assert_eq!(from_db_timestamp(&s), Some(ts));
        assert_eq!(from_db_timestamp("2024-03-05T14:07:09Z"), None);
    }

    #[test]
    fn test_terminal_values() {
        assert!(LogValue::Complete.is_terminal());
        assert!(LogValue::Rejected.is_terminal());
        assert!(!LogValue::Pending.is_terminal());
        assert_eq!(EntryStatus::from("trash"), EntryStatus::Trash);
        assert_eq!(
            EntryStatus::from("archived"),
            EntryStatus::Other("archived".to_string())
        );
    }
}
