//! Form descriptions read from JSON.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use formset_lib::constraint::RuleSet;
use formset_lib::error::EvaluateError;
use formset_lib::group::Controls;
use formset_lib::{Constrain, FormGroup, GroupConfig};

/// A form: its fields and the value updates to apply in order.
///
/// ```json
/// {
///   "fields": {
///     "username": { "value": "john", "rules": { "presence": {} } },
///     "password": { "rules": { "presence": {}, "length": { "minimum": 6 } } }
///   },
///   "updates": [{ "password": "secret" }, { "username": "  " }]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct FormDescription {
    pub fields: IndexMap<String, FieldDescription>,
    #[serde(default)]
    pub updates: Vec<IndexMap<String, Option<String>>>,
}

#[derive(Debug, Deserialize)]
pub struct FieldDescription {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub rules: RuleSet,
}

impl FormDescription {
    /// Converts the fields to constraint descriptors.
    pub fn constraints(&self) -> Vec<(String, Constrain)> {
        self.fields
            .iter()
            .map(|(name, field)| {
                let mut constraint = Constrain::new().raw_rules(field.rules.clone());
                if let Some(value) = &field.value {
                    constraint = constraint.with_value(value.clone());
                }
                (name.clone(), constraint)
            })
            .collect()
    }

    /// Builds a group from the fields and applies each update in turn.
    ///
    /// Returns the state after construction and after every update, each
    /// taken once the group's asynchronous runs have settled.
    pub async fn run(&self, config: GroupConfig) -> Result<Vec<StepReport>, EvaluateError> {
        let group = FormGroup::new(self.constraints(), config)?;
        group.settled().await;
        let mut steps = vec![StepReport::new("initial", group.valid(), &group.controls())];

        for (index, update) in self.updates.iter().enumerate() {
            group.update_values(update.iter().map(|(name, value)| (name, value.as_deref())))?;
            group.settled().await;
            log::debug!("Applied update {} ({} fields)", index + 1, update.len());
            steps.push(StepReport::new(
                format!("update {}", index + 1),
                group.valid(),
                &group.controls(),
            ));
        }
        Ok(steps)
    }
}

/// State of one field as printed.
#[derive(Debug, Serialize)]
pub struct FieldReport {
    pub value: Option<String>,
    pub valid: bool,
    pub touched: bool,
    pub loading: bool,
    pub errors: Vec<String>,
}

/// State of the whole form after one step.
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: String,
    pub valid: bool,
    pub fields: IndexMap<String, FieldReport>,
}

impl StepReport {
    pub fn new(step: impl Into<String>, valid: bool, controls: &Controls) -> Self {
        let fields = controls
            .iter()
            .map(|(name, control)| {
                let report = FieldReport {
                    value: control.value().map(str::to_string),
                    valid: control.valid(),
                    touched: control.touched(),
                    loading: control.loading(),
                    errors: control.errors().to_vec(),
                };
                (name.clone(), report)
            })
            .collect();
        Self {
            step: step.into(),
            valid,
            fields,
        }
    }
}
