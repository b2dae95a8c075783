//! Fluent builder accumulating the rules of one field.

use std::future::Future;

use super::{
    Comparator, CustomAsyncRule, CustomRule, RuleKind, RuleSet, Tokenizer,
};
use crate::evaluate::Values;

/// The message field targeted by [`Constrain::message`].
///
/// Tracks the condition configured by the most recent builder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageSlot {
    Presence,
    LengthIs,
    LengthMinimum,
    LengthMaximum,
    NotValidNumber,
    NotInteger,
    NotGreaterThan,
    NotGreaterThanOrEqualTo,
    NotEqualTo,
    NotLessThanOrEqualTo,
    NotLessThan,
    NotDivisibleBy,
    NotOdd,
    NotEven,
    Format,
    Inclusion,
    Exclusion,
    Equality,
    Type,
    Email,
    Url,
    DateNotValid,
    TooEarly,
    TooLate,
    Custom,
    CustomAsync,
}

impl MessageSlot {
    fn kind(self) -> RuleKind {
        match self {
            MessageSlot::Presence => RuleKind::Presence,
            MessageSlot::LengthIs | MessageSlot::LengthMinimum | MessageSlot::LengthMaximum => {
                RuleKind::Length
            }
            MessageSlot::NotValidNumber
            | MessageSlot::NotInteger
            | MessageSlot::NotGreaterThan
            | MessageSlot::NotGreaterThanOrEqualTo
            | MessageSlot::NotEqualTo
            | MessageSlot::NotLessThanOrEqualTo
            | MessageSlot::NotLessThan
            | MessageSlot::NotDivisibleBy
            | MessageSlot::NotOdd
            | MessageSlot::NotEven => RuleKind::Numericality,
            MessageSlot::Format => RuleKind::Format,
            MessageSlot::Inclusion => RuleKind::Inclusion,
            MessageSlot::Exclusion => RuleKind::Exclusion,
            MessageSlot::Equality => RuleKind::Equality,
            MessageSlot::Type => RuleKind::Type,
            MessageSlot::Email => RuleKind::Email,
            MessageSlot::Url => RuleKind::Url,
            MessageSlot::DateNotValid | MessageSlot::TooEarly | MessageSlot::TooLate => {
                RuleKind::Datetime
            }
            MessageSlot::Custom => RuleKind::Custom,
            MessageSlot::CustomAsync => RuleKind::CustomAsync,
        }
    }
}

/// Builder collecting the rules of one field.
///
/// Calls for the same rule kind merge into one configuration: setting a
/// minimum length keeps a previously set maximum. Nothing is checked while
/// building; a negative length or a malformed pattern is only reported by the
/// evaluator.
///
/// # Example
///
/// ```
/// use formset_lib::constraint::{Constrain, RuleKind};
///
/// let password = Constrain::new()
///     .required()
///     .min_length(6)
///     .message("is too weak")
///     .max_length(64)
///     .with_value("hunter22");
///
/// let rules = password.serialize();
/// assert_eq!(rules.kinds(), vec![RuleKind::Presence, RuleKind::Length]);
/// assert_eq!(rules.length().unwrap().too_short.as_deref(), Some("is too weak"));
/// assert_eq!(rules.length().unwrap().maximum, Some(64));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Constrain {
    rules: RuleSet,
    value: Option<String>,
    slot: Option<MessageSlot>,
}

impl Constrain {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial value used when a field is created from this descriptor.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Returns the initial value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the accumulated rule-set.
    pub fn serialize(&self) -> &RuleSet {
        &self.rules
    }

    /// Consumes the descriptor, returning its rule-set.
    pub fn into_rules(self) -> RuleSet {
        self.rules
    }

    /// Replaces the entire rule-set.
    pub fn raw_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self.slot = None;
        self
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    /// Sets the message of the condition configured by the previous call.
    ///
    /// Has no effect after `custom`, `custom_async` and `raw_rules`, whose
    /// messages come from the rule itself.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        let Some(slot) = self.slot else {
            return self;
        };
        let msg = Some(msg.into());
        let rules = &mut self.rules;
        match slot {
            MessageSlot::Presence => rules.presence_mut().message = msg,
            MessageSlot::LengthIs => rules.length_mut().wrong_length = msg,
            MessageSlot::LengthMinimum => rules.length_mut().too_short = msg,
            MessageSlot::LengthMaximum => rules.length_mut().too_long = msg,
            MessageSlot::NotValidNumber => rules.numericality_mut().not_valid = msg,
            MessageSlot::NotInteger => rules.numericality_mut().not_integer = msg,
            MessageSlot::NotGreaterThan => rules.numericality_mut().not_greater_than = msg,
            MessageSlot::NotGreaterThanOrEqualTo => {
                rules.numericality_mut().not_greater_than_or_equal_to = msg
            }
            MessageSlot::NotEqualTo => rules.numericality_mut().not_equal_to = msg,
            MessageSlot::NotLessThanOrEqualTo => {
                rules.numericality_mut().not_less_than_or_equal_to = msg
            }
            MessageSlot::NotLessThan => rules.numericality_mut().not_less_than = msg,
            MessageSlot::NotDivisibleBy => rules.numericality_mut().not_divisible_by = msg,
            MessageSlot::NotOdd => rules.numericality_mut().not_odd = msg,
            MessageSlot::NotEven => rules.numericality_mut().not_even = msg,
            MessageSlot::Format => rules.format_mut().message = msg,
            MessageSlot::Inclusion => rules.inclusion_mut().message = msg,
            MessageSlot::Exclusion => rules.exclusion_mut().message = msg,
            MessageSlot::Equality => rules.equality_mut().message = msg,
            MessageSlot::Type => rules.type_rule_mut().message = msg,
            MessageSlot::Email => rules.email_mut().message = msg,
            MessageSlot::Url => rules.url_mut().message = msg,
            MessageSlot::DateNotValid => rules.datetime_mut().not_valid = msg,
            MessageSlot::TooEarly => rules.datetime_mut().too_early = msg,
            MessageSlot::TooLate => rules.datetime_mut().too_late = msg,
            MessageSlot::Custom | MessageSlot::CustomAsync => {}
        }
        self
    }

    /// Sets the rule-level message of the rule configured by the previous
    /// call, replacing every condition message of that rule.
    pub fn rule_message(mut self, msg: impl Into<String>) -> Self {
        let Some(slot) = self.slot else {
            return self;
        };
        let msg = Some(msg.into());
        let rules = &mut self.rules;
        match slot.kind() {
            RuleKind::Presence => rules.presence_mut().message = msg,
            RuleKind::Length => rules.length_mut().message = msg,
            RuleKind::Numericality => rules.numericality_mut().message = msg,
            RuleKind::Format => rules.format_mut().message = msg,
            RuleKind::Inclusion => rules.inclusion_mut().message = msg,
            RuleKind::Exclusion => rules.exclusion_mut().message = msg,
            RuleKind::Equality => rules.equality_mut().message = msg,
            RuleKind::Type => rules.type_rule_mut().message = msg,
            RuleKind::Email => rules.email_mut().message = msg,
            RuleKind::Url => rules.url_mut().message = msg,
            RuleKind::Datetime => rules.datetime_mut().message = msg,
            RuleKind::Custom | RuleKind::CustomAsync => {}
        }
        self
    }

    fn slot(mut self, slot: MessageSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    // -------------------------------------------------------------------------
    // Presence
    // -------------------------------------------------------------------------

    /// The value must be present and not blank.
    pub fn required(mut self) -> Self {
        self.rules.presence_mut().allow_empty = false;
        self.slot(MessageSlot::Presence)
    }

    /// The value must be present; whitespace-only text is accepted.
    pub fn required_allow_empty(mut self) -> Self {
        self.rules.presence_mut().allow_empty = true;
        self.slot(MessageSlot::Presence)
    }

    // -------------------------------------------------------------------------
    // Length
    // -------------------------------------------------------------------------

    /// Chooses how the length rule counts the value.
    pub fn length_config(mut self, tokenizer: Tokenizer) -> Self {
        self.rules.length_mut().tokenizer = tokenizer;
        self.slot(MessageSlot::LengthIs)
    }

    /// The value must be exactly `is` tokens long.
    pub fn length(mut self, is: i64) -> Self {
        self.rules.length_mut().is = Some(is);
        self.slot(MessageSlot::LengthIs)
    }

    /// The value must be at least `minimum` tokens long.
    pub fn min_length(mut self, minimum: i64) -> Self {
        self.rules.length_mut().minimum = Some(minimum);
        self.slot(MessageSlot::LengthMinimum)
    }

    /// The value must be at most `maximum` tokens long.
    pub fn max_length(mut self, maximum: i64) -> Self {
        self.rules.length_mut().maximum = Some(maximum);
        self.slot(MessageSlot::LengthMaximum)
    }

    // -------------------------------------------------------------------------
    // Numericality
    // -------------------------------------------------------------------------

    /// The value must be a number.
    pub fn number(mut self) -> Self {
        self.rules.numericality_mut();
        self.slot(MessageSlot::NotValidNumber)
    }

    /// The value must be a number written in canonical notation.
    pub fn strict_number(mut self) -> Self {
        self.rules.numericality_mut().strict = true;
        self.slot(MessageSlot::NotValidNumber)
    }

    /// The value must be an integer.
    pub fn integer(mut self) -> Self {
        self.rules.numericality_mut().only_integer = Some(true);
        self.slot(MessageSlot::NotInteger)
    }

    /// The value must be a number; fractions are allowed.
    pub fn double(mut self) -> Self {
        self.rules.numericality_mut().only_integer = Some(false);
        self.slot(MessageSlot::NotValidNumber)
    }

    pub fn greater_than(mut self, bound: f64) -> Self {
        self.rules.numericality_mut().greater_than = Some(bound);
        self.slot(MessageSlot::NotGreaterThan)
    }

    pub fn greater_than_or_equals(mut self, bound: f64) -> Self {
        self.rules.numericality_mut().greater_than_or_equal_to = Some(bound);
        self.slot(MessageSlot::NotGreaterThanOrEqualTo)
    }

    pub fn equals(mut self, bound: f64) -> Self {
        self.rules.numericality_mut().equal_to = Some(bound);
        self.slot(MessageSlot::NotEqualTo)
    }

    pub fn less_than_or_equals(mut self, bound: f64) -> Self {
        self.rules.numericality_mut().less_than_or_equal_to = Some(bound);
        self.slot(MessageSlot::NotLessThanOrEqualTo)
    }

    pub fn less_than(mut self, bound: f64) -> Self {
        self.rules.numericality_mut().less_than = Some(bound);
        self.slot(MessageSlot::NotLessThan)
    }

    pub fn divisible_by(mut self, divisor: f64) -> Self {
        self.rules.numericality_mut().divisible_by = Some(divisor);
        self.slot(MessageSlot::NotDivisibleBy)
    }

    pub fn odd(mut self) -> Self {
        self.rules.numericality_mut().odd = true;
        self.slot(MessageSlot::NotOdd)
    }

    pub fn even(mut self) -> Self {
        self.rules.numericality_mut().even = true;
        self.slot(MessageSlot::NotEven)
    }

    // -------------------------------------------------------------------------
    // Format, membership, equality
    // -------------------------------------------------------------------------

    /// The whole value must match `pattern`.
    pub fn matches(self, pattern: impl Into<String>) -> Self {
        self.matches_with(pattern, None::<String>)
    }

    /// Like [`Constrain::matches`] with regex flags (`i`, `m`, `s`).
    pub fn matches_with(
        mut self,
        pattern: impl Into<String>,
        flags: Option<impl Into<String>>,
    ) -> Self {
        let format = self.rules.format_mut();
        format.pattern = pattern.into();
        format.flags = flags.map(Into::into);
        self.slot(MessageSlot::Format)
    }

    /// The value must be one of `within`.
    pub fn includes<I, S>(mut self, within: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.inclusion_mut().within = within.into_iter().map(Into::into).collect();
        self.slot(MessageSlot::Inclusion)
    }

    /// The value must not be one of `within`.
    pub fn excludes<I, S>(mut self, within: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.exclusion_mut().within = within.into_iter().map(Into::into).collect();
        self.slot(MessageSlot::Exclusion)
    }

    /// The value must equal the value of `field`.
    pub fn same_as(mut self, field: impl Into<String>) -> Self {
        let equality = self.rules.equality_mut();
        equality.attribute = field.into();
        equality.comparator = None;
        self.slot(MessageSlot::Equality)
    }

    /// The value must equal the value of `field` according to `comparator`.
    pub fn same_as_by<F>(mut self, field: impl Into<String>, comparator: F) -> Self
    where
        F: Fn(Option<&str>, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let equality = self.rules.equality_mut();
        equality.attribute = field.into();
        equality.comparator = Some(Comparator::new(comparator));
        self.slot(MessageSlot::Equality)
    }

    // -------------------------------------------------------------------------
    // Type, email, url, dates
    // -------------------------------------------------------------------------

    /// The value must be of the named type.
    pub fn is_type(mut self, type_name: impl Into<String>) -> Self {
        self.rules.type_rule_mut().type_name = type_name.into();
        self.slot(MessageSlot::Type)
    }

    pub fn email(mut self) -> Self {
        self.rules.email_mut();
        self.slot(MessageSlot::Email)
    }

    pub fn url(mut self) -> Self {
        self.rules.url_mut();
        self.slot(MessageSlot::Url)
    }

    /// Restricts the accepted url schemes.
    pub fn url_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.url_mut().schemes = Some(schemes.into_iter().map(Into::into).collect());
        self.slot(MessageSlot::Url)
    }

    pub fn url_allow_local(mut self, allow: bool) -> Self {
        self.rules.url_mut().allow_local = allow;
        self.slot(MessageSlot::Url)
    }

    pub fn url_allow_data(mut self, allow: bool) -> Self {
        self.rules.url_mut().allow_data_url = allow;
        self.slot(MessageSlot::Url)
    }

    /// The value must be a date, or a date-time when `date_only` is false.
    pub fn date(mut self, date_only: bool) -> Self {
        self.rules.datetime_mut().date_only = Some(date_only);
        self.slot(MessageSlot::DateNotValid)
    }

    /// The date must be no later than `latest`.
    pub fn before_date(mut self, latest: impl Into<String>) -> Self {
        self.rules.datetime_mut().latest = Some(latest.into());
        self.slot(MessageSlot::TooLate)
    }

    /// The date must be no earlier than `earliest`.
    pub fn after_date(mut self, earliest: impl Into<String>) -> Self {
        self.rules.datetime_mut().earliest = Some(earliest.into());
        self.slot(MessageSlot::TooEarly)
    }

    // -------------------------------------------------------------------------
    // Custom rules
    // -------------------------------------------------------------------------

    /// Adds a synchronous rule returning `Some(message)` on failure.
    pub fn custom<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>, &Values, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.rules.set_custom(CustomRule::new(f));
        self.slot(MessageSlot::Custom)
    }

    /// Adds an asynchronous rule resolving to `Some(message)` on failure.
    ///
    /// The future is dropped when a newer value for the same field supersedes
    /// it.
    pub fn custom_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Option<String>, Values, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        self.rules.set_custom_async(CustomAsyncRule::new(f));
        self.slot(MessageSlot::CustomAsync)
    }
}
