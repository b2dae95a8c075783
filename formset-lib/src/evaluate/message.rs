//! Default messages and message formatting.

pub(crate) const CANT_BE_BLANK: &str = "can't be blank";
pub(crate) const WRONG_LENGTH: &str = "is the wrong length (should be %{count} characters)";
pub(crate) const TOO_SHORT: &str = "is too short (minimum is %{count} characters)";
pub(crate) const TOO_LONG: &str = "is too long (maximum is %{count} characters)";
pub(crate) const NOT_A_NUMBER: &str = "is not a number";
pub(crate) const NOT_VALID_NUMBER: &str = "must be a valid number";
pub(crate) const NOT_INTEGER: &str = "must be an integer";
pub(crate) const NOT_GREATER_THAN: &str = "must be greater than %{count}";
pub(crate) const NOT_GREATER_THAN_OR_EQUAL_TO: &str = "must be greater than or equal to %{count}";
pub(crate) const NOT_EQUAL_TO: &str = "must be equal to %{count}";
pub(crate) const NOT_LESS_THAN_OR_EQUAL_TO: &str = "must be less than or equal to %{count}";
pub(crate) const NOT_LESS_THAN: &str = "must be less than %{count}";
pub(crate) const NOT_DIVISIBLE_BY: &str = "must be divisible by %{count}";
pub(crate) const NOT_ODD: &str = "must be odd";
pub(crate) const NOT_EVEN: &str = "must be even";
pub(crate) const INVALID_FORMAT: &str = "is invalid";
pub(crate) const NOT_INCLUDED: &str = "^%{value} is not included in the list";
pub(crate) const RESTRICTED: &str = "^%{value} is restricted";
pub(crate) const NOT_SAME_AS: &str = "is not same as %{attribute}";
pub(crate) const WRONG_TYPE: &str = "must be of type %{type}";
pub(crate) const INVALID_EMAIL: &str = "is not a valid email";
pub(crate) const INVALID_URL: &str = "is not a valid url";
pub(crate) const INVALID_DATE: &str = "must be a valid date";
pub(crate) const TOO_EARLY: &str = "must be no earlier than %{date}";
pub(crate) const TOO_LATE: &str = "must be no later than %{date}";

/// Replaces each `%{key}` placeholder with its value.
///
/// Unknown placeholders are left untouched.
pub(crate) fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("%{{{}}}", key), value);
    }
    out
}

/// Turns a field name into words: `firstName` and `first_name` both become
/// `first name`.
///
/// ```
/// use formset_lib::evaluate::prettify;
///
/// assert_eq!(prettify("firstName"), "first name");
/// assert_eq!(prettify("zip-code"), "zip code");
/// ```
pub fn prettify(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        match c {
            '_' | '-' | '.' => out.push(' '),
            c if c.is_uppercase() => {
                if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                    out.push(' ');
                }
                out.extend(c.to_lowercase());
            }
            c => out.push(c),
        }
        prev = Some(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Produces the final message shown for `field`.
///
/// A message starting with `^` is shown as is, without the caret. Otherwise
/// the capitalised field name is prepended when `full_messages` is set.
pub(crate) fn finalize(field: &str, message: &str, value: Option<&str>, full_messages: bool) -> String {
    let message = substitute(message, &[("value", value.unwrap_or(""))]);
    if let Some(stripped) = message.strip_prefix('^') {
        return stripped.to_string();
    }
    if full_messages {
        format!("{} {}", capitalize(&prettify(field)), message)
    } else {
        message
    }
}

/// Formats a number the way it is shown in messages: integral values drop
/// the fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
