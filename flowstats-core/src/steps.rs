//! Workflow step directories
//!
//! Step and pending-by-step reports enumerate every configured step of a
//! workflow, not only the steps that show up in the activity log. Where the
//! step list comes from is up to the caller: [`FeedStepDirectory`] reads
//! GravityFlow's feed rows, [`StaticStepDirectory`] serves a fixed list.

use std::collections::HashMap;

use crate::db::Database;
use crate::error::Result;
use crate::types::{TablePrefix, WorkflowStep};

/// Looks up the configured steps of a form's workflow.
pub trait StepDirectory {
    /// Steps for `form_id`, in workflow order. An empty list means the form
    /// has no workflow configured.
    fn steps(&self, form_id: i64) -> Result<Vec<WorkflowStep>>;
}

/// Reads active GravityFlow feeds from the site's add-on feed table.
pub struct FeedStepDirectory<'a> {
    db: &'a Database,
    prefix: TablePrefix,
}

impl<'a> FeedStepDirectory<'a> {
    pub fn new(db: &'a Database, prefix: TablePrefix) -> Self {
        Self { db, prefix }
    }
}

impl StepDirectory for FeedStepDirectory<'_> {
    fn steps(&self, form_id: i64) -> Result<Vec<WorkflowStep>> {
        self.db.list_workflow_steps(&self.prefix, form_id)
    }
}

/// In-memory step lists keyed by form id.
#[derive(Debug, Clone, Default)]
pub struct StaticStepDirectory {
    forms: HashMap<i64, Vec<WorkflowStep>>,
}

impl StaticStepDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the steps of one form.
    pub fn with_form(mut self, form_id: i64, steps: Vec<WorkflowStep>) -> Self {
        self.forms.insert(form_id, steps);
        self
    }
}

impl StepDirectory for StaticStepDirectory {
    fn steps(&self, form_id: i64) -> Result<Vec<WorkflowStep>> {
        Ok(self.forms.get(&form_id).cloned().unwrap_or_default())
    }
}
