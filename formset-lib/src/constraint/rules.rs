//! Rule configurations and the accumulated rule-set

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;

use super::RuleKind;
use crate::evaluate::Values;

// =============================================================================
// Declarative rules
// =============================================================================

/// Configuration of the `presence` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRule {
    /// Accept whitespace-only text as present.
    #[serde(default)]
    pub allow_empty: bool,
    /// Override message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How the `length` rule counts a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tokenizer {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// UTF-8 bytes.
    Bytes,
    /// Whitespace separated words.
    Words,
}

impl Tokenizer {
    /// Counts the tokens of `value`.
    pub fn count(&self, value: &str) -> i64 {
        let count = match self {
            Tokenizer::Chars => value.chars().count(),
            Tokenizer::Bytes => value.len(),
            Tokenizer::Words => value.split_whitespace().count(),
        };
        count as i64
    }
}

/// Configuration of the `length` rule.
///
/// Bounds are signed so that any number the caller passes is kept as is;
/// nonsensical bounds only surface when the evaluator runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(default)]
    pub tokenizer: Tokenizer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_long: Option<String>,
    /// Replaces every condition message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration of the `numericality` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericalityRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_integer: Option<bool>,
    /// Require the canonical number notation instead of a lenient parse.
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greater_than_or_equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than_or_equal_to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub less_than: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisible_by: Option<f64>,
    #[serde(default)]
    pub odd: bool,
    #[serde(default)]
    pub even: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_valid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_integer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_greater_than: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_greater_than_or_equal_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_equal_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_less_than_or_equal_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_less_than: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_divisible_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_odd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_even: Option<String>,
    /// Replaces every condition message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration of the `format` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatRule {
    pub pattern: String,
    /// Any of `i`, `m` and `s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration shared by the `inclusion` and `exclusion` rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRule {
    #[serde(default)]
    pub within: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Closure comparing a value with the value of another field.
pub type ComparatorFn = dyn Fn(Option<&str>, Option<&str>) -> bool + Send + Sync;

/// Shared comparator used by the `equality` rule.
#[derive(Clone)]
pub struct Comparator(Arc<ComparatorFn>);

impl Comparator {
    /// Wraps a comparison closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, Option<&str>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Returns `true` when both values are considered equal.
    pub fn compare(&self, value: Option<&str>, other: Option<&str>) -> bool {
        (self.0)(value, other)
    }
}

impl std::fmt::Debug for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Comparator(..)")
    }
}

/// Configuration of the `equality` rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualityRule {
    /// Name of the field whose value must match.
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub comparator: Option<Comparator>,
}

/// Configuration of the `type` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRule {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration of the `email` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration of the `url` rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRule {
    /// Accepted schemes; `http` and `https` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemes: Option<Vec<String>>,
    /// Accept localhost and private network hosts.
    #[serde(default)]
    pub allow_local: bool,
    /// Accept `data:` URLs.
    #[serde(default)]
    pub allow_data_url: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration of the `datetime` rule.
///
/// Bounds are kept as text and parsed when the rule is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatetimeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_valid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_early: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub too_late: Option<String>,
    /// Replaces every condition message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Closure rules
// =============================================================================

/// Synchronous user rule: `(value, all values, field name) -> message`.
pub type CustomFn = dyn Fn(Option<&str>, &Values, &str) -> Option<String> + Send + Sync;

/// Asynchronous user rule resolving to an optional message.
pub type CustomAsyncFn =
    dyn Fn(Option<String>, Values, String) -> BoxFuture<'static, Option<String>> + Send + Sync;

/// A user supplied synchronous rule.
#[derive(Clone)]
pub struct CustomRule(Arc<CustomFn>);

impl CustomRule {
    /// Wraps a rule closure returning `Some(message)` on failure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&str>, &Values, &str) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Runs the rule.
    pub fn check(&self, value: Option<&str>, values: &Values, field: &str) -> Option<String> {
        (self.0)(value, values, field)
    }
}

impl std::fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomRule(..)")
    }
}

/// A user supplied asynchronous rule.
///
/// The returned future resolves to `None` when the value passes. It may be
/// dropped before completion when a newer run for the same field supersedes
/// it.
#[derive(Clone)]
pub struct CustomAsyncRule(Arc<CustomAsyncFn>);

impl CustomAsyncRule {
    /// Wraps an async rule closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<String>, Values, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        let rule = move |value: Option<String>,
                         values: Values,
                         field: String|
              -> BoxFuture<'static, Option<String>> {
            Box::pin(f(value, values, field))
        };
        Self(Arc::new(rule))
    }

    /// Starts the rule for one value.
    pub fn run(&self, value: Option<String>, values: Values, field: String) -> BoxFuture<'static, Option<String>> {
        (self.0)(value, values, field)
    }
}

impl std::fmt::Debug for CustomAsyncRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CustomAsyncRule(..)")
    }
}

// =============================================================================
// RuleSet
// =============================================================================

/// The rules of one field, at most one configuration per [`RuleKind`].
///
/// Kinds are evaluated in the order they were first configured. A set read
/// from JSON has no recorded order and falls back to canonical order.
///
/// Closure rules are not serialized.
///
/// # Example
///
/// ```
/// use formset_lib::constraint::{PresenceRule, RuleKind, RuleSet};
///
/// let mut rules = RuleSet::new();
/// rules.set_presence(PresenceRule::default());
/// assert!(rules.contains(RuleKind::Presence));
///
/// let json = serde_json::to_value(&rules).unwrap();
/// assert_eq!(json["presence"]["allowEmpty"], false);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(skip)]
    order: Vec<RuleKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    presence: Option<PresenceRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    length: Option<LengthRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numericality: Option<NumericalityRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<FormatRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inclusion: Option<MembershipRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclusion: Option<MembershipRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equality: Option<EqualityRule>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    type_rule: Option<TypeRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<EmailRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<UrlRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datetime: Option<DatetimeRule>,
    #[serde(skip)]
    custom: Option<CustomRule>,
    #[serde(skip)]
    custom_async: Option<CustomAsyncRule>,
}

macro_rules! rule_accessors {
    ($($kind:ident => $field:ident, $field_mut:ident, $set:ident: $ty:ty;)*) => {
        impl RuleSet {
            $(
                #[doc = concat!("Returns the `", stringify!($field), "` configuration, if set.")]
                pub fn $field(&self) -> Option<&$ty> {
                    self.$field.as_ref()
                }

                #[doc = concat!("Replaces the `", stringify!($field), "` configuration.")]
                pub fn $set(&mut self, rule: $ty) -> &mut Self {
                    self.mark(RuleKind::$kind);
                    self.$field = Some(rule);
                    self
                }

                pub(crate) fn $field_mut(&mut self) -> &mut $ty {
                    self.mark(RuleKind::$kind);
                    self.$field.get_or_insert_with(Default::default)
                }
            )*
        }
    };
}

rule_accessors! {
    Presence => presence, presence_mut, set_presence: PresenceRule;
    Length => length, length_mut, set_length: LengthRule;
    Numericality => numericality, numericality_mut, set_numericality: NumericalityRule;
    Format => format, format_mut, set_format: FormatRule;
    Inclusion => inclusion, inclusion_mut, set_inclusion: MembershipRule;
    Exclusion => exclusion, exclusion_mut, set_exclusion: MembershipRule;
    Equality => equality, equality_mut, set_equality: EqualityRule;
    Type => type_rule, type_rule_mut, set_type_rule: TypeRule;
    Email => email, email_mut, set_email: EmailRule;
    Url => url, url_mut, set_url: UrlRule;
    Datetime => datetime, datetime_mut, set_datetime: DatetimeRule;
}

impl RuleSet {
    /// Creates an empty rule-set.
    ///
    /// An empty set is also the stub assigned to fields whose values must be
    /// visible to cross-field rules without being validated themselves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `custom` rule, if set.
    pub fn custom(&self) -> Option<&CustomRule> {
        self.custom.as_ref()
    }

    /// Replaces the `custom` rule.
    pub fn set_custom(&mut self, rule: CustomRule) -> &mut Self {
        self.mark(RuleKind::Custom);
        self.custom = Some(rule);
        self
    }

    /// Returns the `customAsync` rule, if set.
    pub fn custom_async(&self) -> Option<&CustomAsyncRule> {
        self.custom_async.as_ref()
    }

    /// Replaces the `customAsync` rule.
    pub fn set_custom_async(&mut self, rule: CustomAsyncRule) -> &mut Self {
        self.mark(RuleKind::CustomAsync);
        self.custom_async = Some(rule);
        self
    }

    /// Returns `true` if a configuration exists for `kind`.
    pub fn contains(&self, kind: RuleKind) -> bool {
        match kind {
            RuleKind::Presence => self.presence.is_some(),
            RuleKind::Length => self.length.is_some(),
            RuleKind::Numericality => self.numericality.is_some(),
            RuleKind::Format => self.format.is_some(),
            RuleKind::Inclusion => self.inclusion.is_some(),
            RuleKind::Exclusion => self.exclusion.is_some(),
            RuleKind::Equality => self.equality.is_some(),
            RuleKind::Type => self.type_rule.is_some(),
            RuleKind::Email => self.email.is_some(),
            RuleKind::Url => self.url.is_some(),
            RuleKind::Datetime => self.datetime.is_some(),
            RuleKind::Custom => self.custom.is_some(),
            RuleKind::CustomAsync => self.custom_async.is_some(),
        }
    }

    /// Removes the configuration for `kind`, returning whether one existed.
    pub fn remove(&mut self, kind: RuleKind) -> bool {
        let existed = self.contains(kind);
        match kind {
            RuleKind::Presence => self.presence = None,
            RuleKind::Length => self.length = None,
            RuleKind::Numericality => self.numericality = None,
            RuleKind::Format => self.format = None,
            RuleKind::Inclusion => self.inclusion = None,
            RuleKind::Exclusion => self.exclusion = None,
            RuleKind::Equality => self.equality = None,
            RuleKind::Type => self.type_rule = None,
            RuleKind::Email => self.email = None,
            RuleKind::Url => self.url = None,
            RuleKind::Datetime => self.datetime = None,
            RuleKind::Custom => self.custom = None,
            RuleKind::CustomAsync => self.custom_async = None,
        }
        self.order.retain(|k| *k != kind);
        existed
    }

    /// Returns a copy of this set without `kind`.
    pub fn without(&self, kind: RuleKind) -> Self {
        let mut rules = self.clone();
        rules.remove(kind);
        rules
    }

    /// Returns a copy of this set reduced to `kind` alone.
    pub fn only(&self, kind: RuleKind) -> Self {
        let mut rules = self.clone();
        for other in RuleKind::ALL {
            if other != kind {
                rules.remove(other);
            }
        }
        rules
    }

    /// Returns the configured kinds in evaluation order.
    pub fn kinds(&self) -> Vec<RuleKind> {
        let mut kinds: Vec<RuleKind> = self
            .order
            .iter()
            .copied()
            .filter(|k| self.contains(*k))
            .collect();
        for kind in RuleKind::ALL {
            if self.contains(kind) && !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Returns the number of configured kinds.
    pub fn len(&self) -> usize {
        self.kinds().len()
    }

    /// Returns `true` if no kind is configured.
    pub fn is_empty(&self) -> bool {
        RuleKind::ALL.iter().all(|k| !self.contains(*k))
    }

    /// Returns `true` if the set declares an asynchronous rule.
    pub fn has_async(&self) -> bool {
        self.custom_async.is_some()
    }

    fn mark(&mut self, kind: RuleKind) {
        if !self.order.contains(&kind) {
            self.order.push(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_configuration_order() {
        let mut rules = RuleSet::new();
        rules.set_email(EmailRule::default());
        rules.set_presence(PresenceRule::default());
        rules.length_mut().minimum = Some(3);

        assert_eq!(
            rules.kinds(),
            vec![RuleKind::Email, RuleKind::Presence, RuleKind::Length]
        );
    }

    #[test]
    fn test_mutable_access_merges_into_existing_rule() {
        let mut rules = RuleSet::new();
        rules.length_mut().maximum = Some(10);
        rules.length_mut().minimum = Some(2);

        let length = rules.length().unwrap();
        assert_eq!(length.minimum, Some(2));
        assert_eq!(length.maximum, Some(10));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_without_and_only() {
        let mut rules = RuleSet::new();
        rules.set_presence(PresenceRule::default());
        rules.set_custom_async(CustomAsyncRule::new(|_, _, _| async { None }));

        assert!(rules.has_async());
        assert!(!rules.without(RuleKind::CustomAsync).has_async());
        assert!(rules.without(RuleKind::CustomAsync).contains(RuleKind::Presence));

        let only = rules.only(RuleKind::CustomAsync);
        assert_eq!(only.kinds(), vec![RuleKind::CustomAsync]);
    }

    #[test]
    fn test_deserialized_set_uses_canonical_order() {
        let rules: RuleSet = serde_json::from_str(
            r#"{"email": {}, "presence": {"allowEmpty": true}, "length": {"minimum": 6}}"#,
        )
        .unwrap();

        assert_eq!(
            rules.kinds(),
            vec![RuleKind::Presence, RuleKind::Length, RuleKind::Email]
        );
        assert!(rules.presence().unwrap().allow_empty);
        assert_eq!(rules.length().unwrap().minimum, Some(6));
    }

    #[test]
    fn test_serialize_skips_closures() {
        let mut rules = RuleSet::new();
        rules.set_custom(CustomRule::new(|_, _, _| None));
        rules.set_type_rule(TypeRule {
            type_name: "integer".to_string(),
            message: None,
        });

        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json, serde_json::json!({"type": {"type": "integer"}}));
    }

    #[test]
    fn test_tokenizers() {
        assert_eq!(Tokenizer::Chars.count("héllo"), 5);
        assert_eq!(Tokenizer::Bytes.count("héllo"), 6);
        assert_eq!(Tokenizer::Words.count("  two  words "), 2);
    }
}
