//! Mutable state of a group and the merge of evaluation results.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::bind::{AttributeReader, InputSource, ListenerId};
use crate::constraint::{RuleKind, RuleSet};
use crate::control::FormControl;
use crate::evaluate::{GroupedErrors, RuleMap, Values};

/// Field states by name, in insertion order.
pub type Controls = IndexMap<String, FormControl>;

/// Render callback: `(aggregate validity, field states)`.
pub type RenderFn = dyn Fn(bool, &Controls) + Send + Sync;

/// The source a group is currently bound to.
pub(crate) struct Bound {
    pub source: Arc<dyn InputSource>,
    pub listeners: Vec<ListenerId>,
    pub reader: Arc<dyn AttributeReader>,
}

#[derive(Default)]
pub(crate) struct GroupState {
    pub controls: Controls,
    pub rules: RuleMap,
    pub async_fields: IndexSet<String>,
    pub values: Values,
    /// Bumped on every reactive edit.
    pub generation: u64,
    /// Value each field's latest asynchronous run was started with.
    pub last_async_value: HashMap<String, Option<String>>,
    pub errors: GroupedErrors,
    pub valid: bool,
    pub render: Option<Arc<RenderFn>>,
    pub bound: Option<Bound>,
}

impl GroupState {
    /// Registers a field, replacing any previous field of the same name.
    pub fn insert_control(&mut self, control: FormControl) {
        let name = control.name().to_string();
        self.remove_control(&name);

        let rules = control.rules().clone();
        if rules.has_async() {
            self.async_fields.insert(name.clone());
        }
        self.values
            .insert(name.clone(), control.value().map(str::to_string));
        self.rules.insert(name.clone(), rules);
        self.controls.insert(name, control);
    }

    /// Drops every piece of bookkeeping for `name`.
    pub fn remove_control(&mut self, name: &str) -> bool {
        let existed = self.controls.shift_remove(name).is_some();
        self.rules.shift_remove(name);
        self.values.shift_remove(name);
        self.async_fields.shift_remove(name);
        self.last_async_value.remove(name);
        self.errors.remove_field(name);
        existed
    }

    /// Sets a field's value, returning the normalised value.
    pub fn set_value(&mut self, name: &str, value: Option<&str>) -> Option<Option<String>> {
        let control = self.controls.get_mut(name)?;
        control.set_value(value);
        let value = control.value().map(str::to_string);
        self.values.insert(name.to_string(), value.clone());
        Some(value)
    }

    /// Returns `true` if `name` currently holds `value`.
    pub fn value_is(&self, name: &str, value: &Option<String>) -> bool {
        self.values.get(name) == Some(value)
    }

    /// Rule-sets without asynchronous rules, except for `keep`.
    pub fn rules_without_async(&self, keep: Option<&str>) -> RuleMap {
        self.rules
            .iter()
            .map(|(field, rules)| {
                let rules = if Some(field.as_str()) == keep {
                    rules.clone()
                } else {
                    rules.without(RuleKind::CustomAsync)
                };
                (field.clone(), rules)
            })
            .collect()
    }

    /// Rule-sets evaluating only `target`'s asynchronous rule; every other
    /// field gets an empty set so its value stays visible.
    pub fn rules_for_async(&self, target: &str) -> RuleMap {
        self.rules
            .iter()
            .map(|(field, rules)| {
                let rules = if field == target {
                    rules.only(RuleKind::CustomAsync)
                } else {
                    RuleSet::new()
                };
                (field.clone(), rules)
            })
            .collect()
    }

    /// Replaces the accumulated errors with the result of a run.
    ///
    /// Asynchronous messages of fields other than `edited` are carried over
    /// from the current state, since the run did not evaluate those rules.
    /// Each field's messages follow its rule-set's order.
    pub fn merge_run(&mut self, found: &GroupedErrors, edited: Option<&str>) {
        let mut merged = GroupedErrors::new();
        for (field, rules) in &self.rules {
            let carry_async = Some(field.as_str()) != edited;
            for kind in rules.kinds() {
                let message = if kind == RuleKind::CustomAsync && carry_async {
                    self.errors.get(field, kind)
                } else {
                    found.get(field, kind)
                };
                if let Some(message) = message {
                    merged.insert(field.clone(), kind, message);
                }
            }
            if let Some(extra) = found.field(field) {
                for (kind, message) in extra {
                    if !rules.contains(*kind) {
                        merged.insert(field.clone(), *kind, message.clone());
                    }
                }
            }
        }
        log::trace!("Merged run errors (edited: {:?})", edited);
        self.errors = merged;
    }

    /// Replaces only the asynchronous message of `field`.
    pub fn merge_async(&mut self, field: &str, message: Option<String>) {
        let mut found = self.errors.clone();
        found.put(field, RuleKind::CustomAsync, message);
        self.merge_run(&found, Some(field));
    }

    /// Copies the accumulated messages into every field state.
    pub fn apply_errors(&mut self) {
        for (name, control) in self.controls.iter_mut() {
            control.set_errors(self.errors.messages(name));
        }
    }

    /// Recomputes aggregate validity from the field states.
    pub fn refresh_valid(&mut self) {
        self.valid = self.controls.values().all(FormControl::valid);
    }

    pub fn set_loading(&mut self, name: &str, loading: bool) {
        if let Some(control) = self.controls.get_mut(name) {
            control.set_loading(loading);
        }
    }
}
