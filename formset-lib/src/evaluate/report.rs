//! Evaluation results.

use indexmap::IndexMap;
use serde::Serialize;

use crate::constraint::RuleKind;

/// Messages of one field, by rule kind, in insertion order.
pub type FieldErrors = IndexMap<RuleKind, String>;

/// Messages of one field in display order, by field name.
pub type FlatErrors = IndexMap<String, Vec<String>>;

/// Violations grouped by field, then by rule kind.
///
/// Both levels keep insertion order; flattening a field yields its messages
/// in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedErrors(IndexMap<String, FieldErrors>);

impl GroupedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(IndexMap::is_empty)
    }

    /// Returns the messages of `field`, if it has any entry.
    pub fn field(&self, field: &str) -> Option<&FieldErrors> {
        self.0.get(field)
    }

    /// Returns the message of `kind` for `field`.
    pub fn get(&self, field: &str, kind: RuleKind) -> Option<&str> {
        self.0.get(field)?.get(&kind).map(String::as_str)
    }

    /// Records a message, keeping the first one seen for a field and kind.
    pub fn insert(&mut self, field: impl Into<String>, kind: RuleKind, message: impl Into<String>) {
        self.0
            .entry(field.into())
            .or_default()
            .entry(kind)
            .or_insert_with(|| message.into());
    }

    /// Sets or clears the message of `kind` for `field`.
    ///
    /// Fields left without any message are dropped.
    pub fn put(&mut self, field: &str, kind: RuleKind, message: Option<String>) {
        match message {
            Some(message) => {
                self.0
                    .entry(field.to_string())
                    .or_default()
                    .insert(kind, message);
            }
            None => {
                if let Some(errors) = self.0.get_mut(field) {
                    errors.shift_remove(&kind);
                    if errors.is_empty() {
                        self.0.shift_remove(field);
                    }
                }
            }
        }
    }

    /// Removes every message of `field`.
    pub fn remove_field(&mut self, field: &str) -> Option<FieldErrors> {
        self.0.shift_remove(field)
    }

    /// Returns the messages of `field` in display order.
    pub fn messages(&self, field: &str) -> Vec<String> {
        self.0
            .get(field)
            .map(|errors| errors.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Converts to field name → ordered messages.
    pub fn flatten(&self) -> FlatErrors {
        self.0
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(field, errors)| (field.clone(), errors.values().cloned().collect()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldErrors)> {
        self.0.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, FieldErrors)> for GroupedErrors {
    fn from_iter<T: IntoIterator<Item = (String, FieldErrors)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Evaluation output in the requested [`ErrorFormat`](super::ErrorFormat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorReport {
    Grouped(GroupedErrors),
    Flat(FlatErrors),
}

impl ErrorReport {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Grouped(errors) => errors.is_empty(),
            Self::Flat(errors) => errors.values().all(Vec::is_empty),
        }
    }
}
