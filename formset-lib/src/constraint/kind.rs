//! Rule-kind vocabulary

use serde::Deserialize;
use serde::Serialize;

/// A named category of constraint.
///
/// Each kind appears at most once in a [`RuleSet`](super::RuleSet) and is
/// the second level key of grouped errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Value must be present.
    Presence,
    /// Exact, minimum or maximum length.
    Length,
    /// Numeric value with optional comparisons.
    Numericality,
    /// Regular expression the whole value must match.
    Format,
    /// Value must be one of a list.
    Inclusion,
    /// Value must not be one of a list.
    Exclusion,
    /// Value must equal another field's value.
    Equality,
    /// Value must be of a named type.
    Type,
    /// Value must be an email address.
    Email,
    /// Value must be a URL.
    Url,
    /// Value must be a date or date-time within optional bounds.
    Datetime,
    /// User supplied synchronous rule.
    Custom,
    /// User supplied asynchronous rule.
    CustomAsync,
}

impl RuleKind {
    /// Every rule kind in canonical order.
    pub const ALL: [RuleKind; 13] = [
        RuleKind::Presence,
        RuleKind::Length,
        RuleKind::Numericality,
        RuleKind::Format,
        RuleKind::Inclusion,
        RuleKind::Exclusion,
        RuleKind::Equality,
        RuleKind::Type,
        RuleKind::Email,
        RuleKind::Url,
        RuleKind::Datetime,
        RuleKind::Custom,
        RuleKind::CustomAsync,
    ];

    /// Returns the serialized name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Presence => "presence",
            RuleKind::Length => "length",
            RuleKind::Numericality => "numericality",
            RuleKind::Format => "format",
            RuleKind::Inclusion => "inclusion",
            RuleKind::Exclusion => "exclusion",
            RuleKind::Equality => "equality",
            RuleKind::Type => "type",
            RuleKind::Email => "email",
            RuleKind::Url => "url",
            RuleKind::Datetime => "datetime",
            RuleKind::Custom => "custom",
            RuleKind::CustomAsync => "customAsync",
        }
    }

    /// Returns `true` for kinds that can only be evaluated asynchronously.
    pub fn is_async(&self) -> bool {
        matches!(self, RuleKind::CustomAsync)
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_names_match_display() {
        for kind in RuleKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn test_only_custom_async_is_async() {
        let async_kinds: Vec<_> = RuleKind::ALL.iter().filter(|k| k.is_async()).collect();
        assert_eq!(async_kinds, vec![&RuleKind::CustomAsync]);
    }
}
