//! Field state: one named input slot and its validation status.

use crate::constraint::{Constrain, RuleSet};

/// Normalises a raw input value: blank or whitespace-only text becomes `None`.
pub fn normalize_value(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// State of a single field.
///
/// `valid` is derived: it is `true` exactly when the field has no errors and
/// is not loading, and it is recomputed whenever either changes.
#[derive(Debug, Clone)]
pub struct FormControl {
    name: String,
    value: Option<String>,
    touched: bool,
    loading: bool,
    errors: Vec<String>,
    valid: bool,
    rules: Constrain,
}

impl FormControl {
    /// Creates a field from a descriptor, taking the descriptor's initial value.
    pub fn new(name: impl Into<String>, rules: Constrain) -> Self {
        let value = normalize_value(rules.value());
        Self {
            name: name.into(),
            value,
            touched: false,
            loading: false,
            errors: Vec::new(),
            valid: true,
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Current value; `None` when blank.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Sets the value, normalising blank text to `None`.
    pub fn set_value(&mut self, value: Option<&str>) -> &mut Self {
        self.value = normalize_value(value);
        self
    }

    pub fn touched(&self) -> bool {
        self.touched
    }

    pub fn set_touched(&mut self, touched: bool) -> &mut Self {
        self.touched = touched;
        self
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) -> &mut Self {
        self.loading = loading;
        self.refresh_valid();
        self
    }

    /// Error messages in display order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: Vec<String>) -> &mut Self {
        self.errors = errors;
        self.refresh_valid();
        self
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Returns the descriptor's rule-set.
    pub fn rules(&self) -> &RuleSet {
        self.rules.serialize()
    }

    /// Returns the descriptor itself.
    pub fn constraint(&self) -> &Constrain {
        &self.rules
    }

    /// Replaces the descriptor. The current value is kept.
    pub fn set_rules(&mut self, rules: Constrain) -> &mut Self {
        self.rules = rules;
        self
    }

    /// Clears errors, loading and touched. The value is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.errors.clear();
        self.loading = false;
        self.touched = false;
        self.refresh_valid();
        self
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_invalid(&self) -> bool {
        !self.valid
    }

    pub fn is_untouched(&self) -> bool {
        !self.touched
    }

    pub fn touched_and_has_error(&self) -> bool {
        self.touched && self.has_error()
    }

    pub fn untouched_and_has_error(&self) -> bool {
        !self.touched && self.has_error()
    }

    pub fn touched_and_no_error(&self) -> bool {
        self.touched && !self.has_error()
    }

    pub fn untouched_and_no_error(&self) -> bool {
        !self.touched && !self.has_error()
    }

    fn refresh_valid(&mut self) {
        self.valid = self.errors.is_empty() && !self.loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_normalize_to_none() {
        let control = FormControl::new("name", Constrain::new().with_value("   "));
        assert_eq!(control.value(), None);

        let mut control = FormControl::new("name", Constrain::new());
        control.set_value(Some("\t\n"));
        assert_eq!(control.value(), None);
        control.set_value(Some(" x "));
        assert_eq!(control.value(), Some(" x "));
    }

    #[test]
    fn test_valid_tracks_errors_and_loading() {
        let mut control = FormControl::new("name", Constrain::new());
        assert!(control.valid());

        control.set_loading(true);
        assert!(!control.valid());
        assert!(control.is_loading());

        control.set_loading(false).set_errors(vec!["bad".to_string()]);
        assert!(control.is_invalid());
        assert!(control.has_error());

        control.set_errors(Vec::new());
        assert!(control.is_valid());
    }

    #[test]
    fn test_reset_keeps_value() {
        let mut control = FormControl::new("name", Constrain::new().with_value("john"));
        control
            .set_touched(true)
            .set_loading(true)
            .set_errors(vec!["bad".to_string()]);

        control.reset();

        assert_eq!(control.value(), Some("john"));
        assert!(control.is_untouched());
        assert!(!control.is_loading());
        assert!(control.errors().is_empty());
        assert!(control.valid());
    }

    #[test]
    fn test_touched_error_predicates() {
        let mut control = FormControl::new("name", Constrain::new());
        assert!(control.untouched_and_no_error());

        control.set_errors(vec!["bad".to_string()]);
        assert!(control.untouched_and_has_error());

        control.set_touched(true);
        assert!(control.touched_and_has_error());

        control.set_errors(Vec::new());
        assert!(control.touched_and_no_error());
    }
}
