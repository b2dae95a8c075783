//! Evaluator contract and the built-in rule evaluator.
//!
//! An [`Evaluator`] takes the values of every field and the rule-set of every
//! field and reports the violated rules, grouped by field and rule kind. A
//! field can be given an empty rule-set to make its value visible to
//! cross-field rules without validating it.

mod checks;
mod datetime;
mod evaluator;
mod message;
mod report;
mod tasks;

pub use datetime::*;
pub use evaluator::*;
pub use message::prettify;
pub use report::*;
pub use tasks::*;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::constraint::RuleSet;
use crate::error::EvaluateError;

/// Field values by field name; `None` is an absent or blank value.
pub type Values = IndexMap<String, Option<String>>;

/// Rule-sets by field name.
pub type RuleMap = IndexMap<String, RuleSet>;

/// Why an asynchronous evaluation did not succeed.
#[derive(Debug, Clone)]
pub enum Rejection {
    /// At least one rule was violated.
    Invalid(GroupedErrors),
    /// A newer run for the same field superseded this one.
    Cancelled,
    /// The evaluator could not run the rules.
    Failed(EvaluateError),
}

impl From<EvaluateError> for Rejection {
    fn from(err: EvaluateError) -> Self {
        Rejection::Failed(err)
    }
}

/// Shape of the errors returned by [`validate`](crate::validate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorFormat {
    /// Field, then rule kind, then message.
    #[default]
    Grouped,
    /// Field, then ordered messages.
    Flat,
}

/// Options of a single evaluator call.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Output shape, used by the top-level `validate` helper.
    pub format: ErrorFormat,
    /// Prefix messages with the prettified field name.
    pub full_messages: bool,
    /// Skip asynchronous rules even in `validate_async`.
    pub sync_only: bool,
    /// Cancellation handles of the calling group.
    pub tasks: Option<TaskRegistry>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            format: ErrorFormat::Grouped,
            full_messages: true,
            sync_only: false,
            tasks: None,
        }
    }
}

impl EvaluateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: ErrorFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_full_messages(mut self, full_messages: bool) -> Self {
        self.full_messages = full_messages;
        self
    }

    pub fn with_sync_only(mut self, sync_only: bool) -> Self {
        self.sync_only = sync_only;
        self
    }

    pub fn with_tasks(mut self, tasks: TaskRegistry) -> Self {
        self.tasks = Some(tasks);
        self
    }
}

/// Runs rule-sets against values.
///
/// Implementations must be cheap to share between tasks; the group holds one
/// behind an `Arc`.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates every synchronous rule.
    ///
    /// Asynchronous rules are ignored.
    fn validate(
        &self,
        values: &Values,
        rules: &RuleMap,
        options: &EvaluateOptions,
    ) -> Result<GroupedErrors, EvaluateError>;

    /// Evaluates every rule, including asynchronous ones unless
    /// `options.sync_only` is set.
    ///
    /// Resolves to `Ok(())` when nothing was violated.
    async fn validate_async(
        &self,
        values: &Values,
        rules: &RuleMap,
        options: &EvaluateOptions,
    ) -> Result<(), Rejection>;
}
