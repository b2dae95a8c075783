//! One check per declarative rule kind.
//!
//! Each check returns the raw message of the first violated condition, before
//! the field name prefix is applied. Every check except presence skips an
//! absent value.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{LazyLock, Mutex, PoisonError};

use email_address::EmailAddress;
use regex::Regex;
use regex::RegexBuilder;

use super::Values;
use super::datetime::{format_datetime, is_date_only, parse_datetime};
use super::message::*;
use super::evaluator::TypeCheck;
use crate::constraint::{
    DatetimeRule, EmailRule, EqualityRule, FormatRule, LengthRule, MembershipRule,
    NumericalityRule, PresenceRule, TypeRule, UrlRule,
};
use crate::error::EvaluateError;

static STRICT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(0|[1-9]\d*)(\.\d+)?$").expect("valid number pattern"));

static STRICT_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(0|[1-9]\d*)$").expect("valid integer pattern"));

/// What a check sees of the field under evaluation.
pub(crate) struct Subject<'a> {
    pub field: &'a str,
    pub value: Option<&'a str>,
    pub values: &'a Values,
}

type CheckResult = Result<Option<String>, EvaluateError>;

/// Picks the rule-level message, then the condition message, then the default.
fn pick(rule: &Option<String>, condition: &Option<String>, default: &str) -> String {
    rule.as_deref()
        .or(condition.as_deref())
        .unwrap_or(default)
        .to_string()
}

fn count_message(rule: &Option<String>, condition: &Option<String>, default: &str, count: f64) -> String {
    substitute(&pick(rule, condition, default), &[("count", format_number(count).as_str())])
}

pub(crate) fn presence(subject: &Subject<'_>, rule: &PresenceRule) -> CheckResult {
    let missing = match subject.value {
        None => true,
        Some(v) => !rule.allow_empty && v.trim().is_empty(),
    };
    Ok(missing.then(|| pick(&rule.message, &None, CANT_BE_BLANK)))
}

pub(crate) fn length(subject: &Subject<'_>, rule: &LengthRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let count = rule.tokenizer.count(value);

    if let Some(is) = rule.is
        && count != is
    {
        return Ok(Some(count_message(&rule.message, &rule.wrong_length, WRONG_LENGTH, is as f64)));
    }
    if let Some(minimum) = rule.minimum
        && count < minimum
    {
        return Ok(Some(count_message(&rule.message, &rule.too_short, TOO_SHORT, minimum as f64)));
    }
    if let Some(maximum) = rule.maximum
        && count > maximum
    {
        return Ok(Some(count_message(&rule.message, &rule.too_long, TOO_LONG, maximum as f64)));
    }
    Ok(None)
}

pub(crate) fn numericality(subject: &Subject<'_>, rule: &NumericalityRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let integer_only = rule.only_integer == Some(true);

    if rule.strict {
        let pattern = if integer_only { &STRICT_INTEGER } else { &STRICT_NUMBER };
        if !pattern.is_match(value) {
            return Ok(Some(pick(&rule.message, &rule.not_valid, NOT_VALID_NUMBER)));
        }
    }

    let number = match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => return Ok(Some(pick(&rule.message, &rule.not_valid, NOT_A_NUMBER))),
    };

    if integer_only && number.fract() != 0.0 {
        return Ok(Some(pick(&rule.message, &rule.not_integer, NOT_INTEGER)));
    }

    let comparisons: [(Option<f64>, fn(f64, f64) -> bool, &Option<String>, &str); 6] = [
        (rule.greater_than, |n, b| n > b, &rule.not_greater_than, NOT_GREATER_THAN),
        (
            rule.greater_than_or_equal_to,
            |n, b| n >= b,
            &rule.not_greater_than_or_equal_to,
            NOT_GREATER_THAN_OR_EQUAL_TO,
        ),
        (rule.equal_to, |n, b| n == b, &rule.not_equal_to, NOT_EQUAL_TO),
        (
            rule.less_than_or_equal_to,
            |n, b| n <= b,
            &rule.not_less_than_or_equal_to,
            NOT_LESS_THAN_OR_EQUAL_TO,
        ),
        (rule.less_than, |n, b| n < b, &rule.not_less_than, NOT_LESS_THAN),
        (rule.divisible_by, |n, b| n % b == 0.0, &rule.not_divisible_by, NOT_DIVISIBLE_BY),
    ];
    for (bound, holds, condition, default) in comparisons {
        if let Some(bound) = bound
            && !holds(number, bound)
        {
            return Ok(Some(count_message(&rule.message, condition, default, bound)));
        }
    }

    if rule.odd && (number % 2.0).abs() != 1.0 {
        return Ok(Some(pick(&rule.message, &rule.not_odd, NOT_ODD)));
    }
    if rule.even && number % 2.0 != 0.0 {
        return Ok(Some(pick(&rule.message, &rule.not_even, NOT_EVEN)));
    }
    Ok(None)
}

/// Compiled `format` patterns, keyed by pattern and flags.
#[derive(Default)]
pub(crate) struct PatternCache {
    compiled: Mutex<HashMap<(String, String), Regex>>,
}

impl PatternCache {
    /// Returns the anchored regex for `pattern`, compiling it on first use.
    /// Patterns that fail to compile are not cached.
    pub fn get(&self, pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
        let key = (pattern.to_string(), flags.to_string());
        if let Some(regex) = self.compiled().get(&key) {
            return Ok(regex.clone());
        }

        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()?;
        log::trace!("Compiled format pattern {:?} (flags {:?})", pattern, flags);
        self.compiled().insert(key, regex.clone());
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled().len()
    }

    fn compiled(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Regex>> {
        self.compiled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn format(subject: &Subject<'_>, rule: &FormatRule, patterns: &PatternCache) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let flags = rule.flags.as_deref().unwrap_or("");
    let pattern = patterns
        .get(&rule.pattern, flags)
        .map_err(|e| EvaluateError::InvalidPattern {
            field: subject.field.to_string(),
            message: e.to_string(),
        })?;

    Ok((!pattern.is_match(value)).then(|| pick(&rule.message, &None, INVALID_FORMAT)))
}

pub(crate) fn inclusion(subject: &Subject<'_>, rule: &MembershipRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let listed = rule.within.iter().any(|w| w == value);
    Ok((!listed).then(|| pick(&rule.message, &None, NOT_INCLUDED)))
}

pub(crate) fn exclusion(subject: &Subject<'_>, rule: &MembershipRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let listed = rule.within.iter().any(|w| w == value);
    Ok(listed.then(|| pick(&rule.message, &None, RESTRICTED)))
}

pub(crate) fn equality(subject: &Subject<'_>, rule: &EqualityRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let other = subject
        .values
        .get(&rule.attribute)
        .and_then(|v| v.as_deref());
    let same = match &rule.comparator {
        Some(comparator) => comparator.compare(Some(value), other),
        None => other == Some(value),
    };
    if same {
        return Ok(None);
    }
    let attribute = prettify(&rule.attribute);
    Ok(Some(substitute(
        &pick(&rule.message, &None, NOT_SAME_AS),
        &[("attribute", attribute.as_str())],
    )))
}

pub(crate) fn type_of(
    subject: &Subject<'_>,
    rule: &TypeRule,
    custom_types: &HashMap<String, TypeCheck>,
) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let matches = match rule.type_name.as_str() {
        "string" => true,
        "number" => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
        "integer" => value.trim().parse::<i64>().is_ok(),
        "boolean" => matches!(value, "true" | "false"),
        "date" => parse_datetime(value).is_some(),
        other => match custom_types.get(other) {
            Some(check) => check(value),
            None => {
                return Err(EvaluateError::UnknownType {
                    field: subject.field.to_string(),
                    type_name: other.to_string(),
                });
            }
        },
    };
    if matches {
        return Ok(None);
    }
    Ok(Some(substitute(
        &pick(&rule.message, &None, WRONG_TYPE),
        &[("type", rule.type_name.as_str())],
    )))
}

pub(crate) fn email(subject: &Subject<'_>, rule: &EmailRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    Ok((!EmailAddress::is_valid(value)).then(|| pick(&rule.message, &None, INVALID_EMAIL)))
}

fn is_local_host(host: &url::Host<&str>) -> bool {
    match host {
        url::Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost") || !domain.contains('.')
        }
        url::Host::Ipv4(ip) => is_local_ip(IpAddr::V4(*ip)),
        url::Host::Ipv6(ip) => is_local_ip(IpAddr::V6(*ip)),
    }
}

fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
        }
        IpAddr::V6(ip) => ip.is_loopback() || ip.is_unspecified(),
    }
}

pub(crate) fn url(subject: &Subject<'_>, rule: &UrlRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let invalid = || Ok(Some(pick(&rule.message, &None, INVALID_URL)));

    let Ok(parsed) = url::Url::parse(value) else {
        return invalid();
    };

    if parsed.scheme() == "data" {
        return if rule.allow_data_url { Ok(None) } else { invalid() };
    }

    let scheme_allowed = match &rule.schemes {
        Some(schemes) => schemes.iter().any(|s| s.eq_ignore_ascii_case(parsed.scheme())),
        None => matches!(parsed.scheme(), "http" | "https"),
    };
    if !scheme_allowed {
        return invalid();
    }

    match parsed.host() {
        None => invalid(),
        Some(host) if !rule.allow_local && is_local_host(&host) => invalid(),
        Some(_) => Ok(None),
    }
}

fn parse_bound(subject: &Subject<'_>, bound: &str) -> Result<chrono::DateTime<chrono::Utc>, EvaluateError> {
    parse_datetime(bound).ok_or_else(|| EvaluateError::InvalidDateBound {
        field: subject.field.to_string(),
        bound: bound.to_string(),
    })
}

pub(crate) fn datetime(subject: &Subject<'_>, rule: &DatetimeRule) -> CheckResult {
    let Some(value) = subject.value else {
        return Ok(None);
    };
    let date_only = rule.date_only == Some(true);
    let earliest = rule
        .earliest
        .as_deref()
        .map(|b| parse_bound(subject, b))
        .transpose()?;
    let latest = rule
        .latest
        .as_deref()
        .map(|b| parse_bound(subject, b))
        .transpose()?;

    let parsed = match parse_datetime(value) {
        Some(dt) if !date_only || is_date_only(&dt) => dt,
        _ => return Ok(Some(pick(&rule.message, &rule.not_valid, INVALID_DATE))),
    };

    if let Some(earliest) = earliest
        && parsed < earliest
    {
        let date = format_datetime(&earliest, date_only);
        return Ok(Some(substitute(
            &pick(&rule.message, &rule.too_early, TOO_EARLY),
            &[("date", date.as_str())],
        )));
    }
    if let Some(latest) = latest
        && parsed > latest
    {
        let date = format_datetime(&latest, date_only);
        return Ok(Some(substitute(
            &pick(&rule.message, &rule.too_late, TOO_LATE),
            &[("date", date.as_str())],
        )));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject<'a>(value: Option<&'a str>, values: &'a Values) -> Subject<'a> {
        Subject {
            field: "field",
            value,
            values,
        }
    }

    #[test]
    fn test_presence() {
        let values = Values::new();
        let rule = PresenceRule::default();
        assert!(presence(&subject(None, &values), &rule).unwrap().is_some());
        assert!(presence(&subject(Some("  "), &values), &rule).unwrap().is_some());
        assert!(presence(&subject(Some("x"), &values), &rule).unwrap().is_none());

        let allow = PresenceRule {
            allow_empty: true,
            message: None,
        };
        assert!(presence(&subject(Some("  "), &values), &allow).unwrap().is_none());
    }

    #[test]
    fn test_length_reports_first_violation() {
        let values = Values::new();
        let rule = LengthRule {
            minimum: Some(6),
            maximum: Some(8),
            ..Default::default()
        };
        assert_eq!(
            length(&subject(Some("abc"), &values), &rule).unwrap().as_deref(),
            Some("is too short (minimum is 6 characters)")
        );
        assert_eq!(
            length(&subject(Some("abcdefghi"), &values), &rule).unwrap().as_deref(),
            Some("is too long (maximum is 8 characters)")
        );
        assert!(length(&subject(None, &values), &rule).unwrap().is_none());
    }

    #[test]
    fn test_negative_length_bound_is_accepted() {
        let values = Values::new();
        let rule = LengthRule {
            minimum: Some(-1),
            ..Default::default()
        };
        assert!(length(&subject(Some("a"), &values), &rule).unwrap().is_none());
    }

    #[test]
    fn test_numericality() {
        let values = Values::new();
        let rule = NumericalityRule {
            only_integer: Some(true),
            greater_than: Some(2.0),
            ..Default::default()
        };
        assert_eq!(
            numericality(&subject(Some("abc"), &values), &rule).unwrap().as_deref(),
            Some("is not a number")
        );
        assert_eq!(
            numericality(&subject(Some("2.5"), &values), &rule).unwrap().as_deref(),
            Some("must be an integer")
        );
        assert_eq!(
            numericality(&subject(Some("2"), &values), &rule).unwrap().as_deref(),
            Some("must be greater than 2")
        );
        assert!(numericality(&subject(Some("3"), &values), &rule).unwrap().is_none());
    }

    #[test]
    fn test_strict_numericality_and_parity() {
        let values = Values::new();
        let strict = NumericalityRule {
            strict: true,
            ..Default::default()
        };
        assert_eq!(
            numericality(&subject(Some("01"), &values), &strict).unwrap().as_deref(),
            Some("must be a valid number")
        );
        assert!(numericality(&subject(Some("-1.5"), &values), &strict).unwrap().is_none());

        let odd = NumericalityRule {
            odd: true,
            ..Default::default()
        };
        assert!(numericality(&subject(Some("-3"), &values), &odd).unwrap().is_none());
        assert_eq!(
            numericality(&subject(Some("4"), &values), &odd).unwrap().as_deref(),
            Some("must be odd")
        );
    }

    #[test]
    fn test_format_is_anchored_and_reports_bad_patterns() {
        let values = Values::new();
        let patterns = PatternCache::default();
        let rule = FormatRule {
            pattern: "[a-z]+".to_string(),
            flags: Some("i".to_string()),
            message: None,
        };
        assert!(format(&subject(Some("ABC"), &values), &rule, &patterns).unwrap().is_none());
        assert!(format(&subject(Some("abc1"), &values), &rule, &patterns).unwrap().is_some());

        let broken = FormatRule {
            pattern: "(".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            format(&subject(Some("x"), &values), &broken, &patterns),
            Err(EvaluateError::InvalidPattern { .. })
        ));
        // One compiled entry serves both evaluations; the broken one is not kept.
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn test_equality_uses_other_field() {
        let mut values = Values::new();
        values.insert("password".to_string(), Some("secret".to_string()));
        let rule = EqualityRule {
            attribute: "password".to_string(),
            ..Default::default()
        };

        assert!(equality(&subject(Some("secret"), &values), &rule).unwrap().is_none());
        assert_eq!(
            equality(&subject(Some("other"), &values), &rule).unwrap().as_deref(),
            Some("is not same as password")
        );
    }

    #[test]
    fn test_type_unknown_is_an_error() {
        let values = Values::new();
        let types = HashMap::new();
        let rule = TypeRule {
            type_name: "uuid".to_string(),
            message: None,
        };
        assert!(matches!(
            type_of(&subject(Some("x"), &values), &rule, &types),
            Err(EvaluateError::UnknownType { .. })
        ));

        let integer = TypeRule {
            type_name: "integer".to_string(),
            message: None,
        };
        assert_eq!(
            type_of(&subject(Some("1.5"), &values), &integer, &types)
                .unwrap()
                .as_deref(),
            Some("must be of type integer")
        );
    }

    #[test]
    fn test_url_rules() {
        let values = Values::new();
        let rule = UrlRule::default();
        let check = |v: &str, rule: &UrlRule| url(&subject(Some(v), &values), rule).unwrap();

        assert!(check("https://example.com/path", &rule).is_none());
        assert!(check("ftp://example.com", &rule).is_some());
        assert!(check("http://localhost:8080", &rule).is_some());
        assert!(check("http://192.168.1.1", &rule).is_some());
        assert!(check("data:text/plain,hi", &rule).is_some());

        let relaxed = UrlRule {
            allow_local: true,
            allow_data_url: true,
            schemes: Some(vec!["ftp".to_string()]),
            message: None,
        };
        assert!(check("ftp://localhost", &relaxed).is_none());
        assert!(check("data:text/plain,hi", &relaxed).is_none());
    }

    #[test]
    fn test_datetime_bounds() {
        let values = Values::new();
        let rule = DatetimeRule {
            date_only: Some(true),
            earliest: Some("2020-01-01".to_string()),
            latest: Some("2020-12-31".to_string()),
            ..Default::default()
        };
        let check = |v: &str| datetime(&subject(Some(v), &values), &rule).unwrap();

        assert!(check("2020-06-15").is_none());
        assert_eq!(check("2019-06-15").as_deref(), Some("must be no earlier than 2020-01-01"));
        assert_eq!(check("2021-01-01").as_deref(), Some("must be no later than 2020-12-31"));
        assert_eq!(check("2020-06-15 10:00").as_deref(), Some("must be a valid date"));
        assert_eq!(check("garbage!").as_deref(), Some("must be a valid date"));
    }

    #[test]
    fn test_datetime_bad_bound_is_an_error() {
        let values = Values::new();
        let rule = DatetimeRule {
            earliest: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            datetime(&subject(Some("2020-06-15"), &values), &rule),
            Err(EvaluateError::InvalidDateBound { .. })
        ));
    }
}
