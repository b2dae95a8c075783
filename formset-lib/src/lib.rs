//! Declarative form validation
//!
//! Describe each field's rules with a [`Constrain`] builder, collect the
//! fields in a [`FormGroup`], and read per-field errors, loading and touched
//! state plus the group's aggregate validity. Asynchronous rules run on
//! tokio; a newer value for a field cancels the field's outstanding run.
//!
//! ```
//! use formset_lib::{constrain, group};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let form = group([
//!     ("email", constrain().required().email().with_value("not-an-email")),
//! ])
//! .unwrap();
//!
//! assert!(form.invalid());
//! assert_eq!(
//!     form.get("email").unwrap().errors(),
//!     ["Email is not a valid email"]
//! );
//! # }
//! ```

pub mod bind;
pub mod constraint;
pub mod control;
pub mod error;
pub mod evaluate;
pub mod group;

pub use constraint::Constrain;
pub use control::FormControl;
pub use error::{BindError, EvaluateError};
pub use group::{FormGroup, GroupConfig};

use evaluate::{
    ErrorFormat, ErrorReport, EvaluateOptions, Evaluator, RuleEvaluator, RuleMap, Values,
};

/// Starts a new, empty constraint descriptor.
pub fn constrain() -> Constrain {
    Constrain::new()
}

/// Creates a group with the default configuration.
pub fn group<I, K>(controls: I) -> Result<FormGroup, EvaluateError>
where
    I: IntoIterator<Item = (K, Constrain)>,
    K: Into<String>,
{
    FormGroup::new(controls, GroupConfig::default())
}

/// Creates a group with `config`.
pub fn group_with<I, K>(
    controls: I,
    config: GroupConfig,
) -> Result<FormGroup, EvaluateError>
where
    I: IntoIterator<Item = (K, Constrain)>,
    K: Into<String>,
{
    FormGroup::new(controls, config)
}

/// Evaluates the synchronous rules of `rules` against `values` with the
/// built-in evaluator, in the format requested by `options`.
pub fn validate(
    values: &Values,
    rules: &RuleMap,
    options: &EvaluateOptions,
) -> Result<ErrorReport, EvaluateError> {
    let errors = RuleEvaluator::new().validate(values, rules, options)?;
    Ok(match options.format {
        ErrorFormat::Grouped => ErrorReport::Grouped(errors),
        ErrorFormat::Flat => ErrorReport::Flat(errors.flatten()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flat_format() {
        let mut values = Values::new();
        values.insert("name".to_string(), Some("admin".to_string()));
        let mut rules = RuleMap::new();
        rules.insert(
            "name".to_string(),
            constrain().excludes(["admin"]).min_length(8).into_rules(),
        );

        let options = EvaluateOptions::default().with_format(ErrorFormat::Flat);
        let report = validate(&values, &rules, &options).unwrap();

        let ErrorReport::Flat(flat) = report else {
            panic!("expected flat report");
        };
        assert_eq!(
            flat["name"],
            vec![
                "admin is restricted".to_string(),
                "Name is too short (minimum is 8 characters)".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_grouped_format_is_empty_when_valid() {
        let mut values = Values::new();
        values.insert("name".to_string(), Some("john".to_string()));
        let mut rules = RuleMap::new();
        rules.insert("name".to_string(), constrain().required().into_rules());

        let report = validate(&values, &rules, &EvaluateOptions::default()).unwrap();
        assert!(report.is_empty());
    }
}
