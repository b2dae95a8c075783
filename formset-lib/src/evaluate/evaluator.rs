//! The built-in rule evaluator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::checks::{self, PatternCache, Subject};
use super::message::finalize;
use super::{EvaluateOptions, Evaluator, GroupedErrors, Rejection, RuleMap, Values};
use crate::constraint::{RuleKind, RuleSet};
use crate::error::EvaluateError;

/// Predicate backing a custom `type` name.
pub type TypeCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Evaluator for every rule kind the constraint builder produces.
///
/// # Example
///
/// ```
/// use formset_lib::constraint::Constrain;
/// use formset_lib::evaluate::{EvaluateOptions, Evaluator, RuleEvaluator, RuleMap, Values};
///
/// let mut evaluator = RuleEvaluator::new();
/// evaluator.add_custom_type("hex", |v| v.chars().all(|c| c.is_ascii_hexdigit()));
///
/// let mut values = Values::new();
/// values.insert("color".to_string(), Some("ff00zz".to_string()));
/// let mut rules = RuleMap::new();
/// rules.insert("color".to_string(), Constrain::new().is_type("hex").into_rules());
///
/// let errors = evaluator.validate(&values, &rules, &EvaluateOptions::default()).unwrap();
/// assert_eq!(errors.messages("color"), vec!["Color must be of type hex"]);
/// ```
#[derive(Clone, Default)]
pub struct RuleEvaluator {
    custom_types: HashMap<String, TypeCheck>,
    patterns: Arc<PatternCache>,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type name usable in `type` rules.
    pub fn add_custom_type<F>(&mut self, name: impl Into<String>, check: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.custom_types.insert(name.into(), Arc::new(check));
        self
    }

    /// Runs the synchronous rules of one field, recording violations.
    fn check_field(
        &self,
        field: &str,
        rules: &RuleSet,
        values: &Values,
        options: &EvaluateOptions,
        errors: &mut GroupedErrors,
    ) -> Result<(), EvaluateError> {
        let value = values.get(field).and_then(|v| v.as_deref());
        let subject = Subject {
            field,
            value,
            values,
        };

        for kind in rules.kinds() {
            let message = match kind {
                RuleKind::Presence => rules.presence().map(|r| checks::presence(&subject, r)),
                RuleKind::Length => rules.length().map(|r| checks::length(&subject, r)),
                RuleKind::Numericality => rules
                    .numericality()
                    .map(|r| checks::numericality(&subject, r)),
                RuleKind::Format => rules
                    .format()
                    .map(|r| checks::format(&subject, r, &self.patterns)),
                RuleKind::Inclusion => rules.inclusion().map(|r| checks::inclusion(&subject, r)),
                RuleKind::Exclusion => rules.exclusion().map(|r| checks::exclusion(&subject, r)),
                RuleKind::Equality => rules.equality().map(|r| checks::equality(&subject, r)),
                RuleKind::Type => rules
                    .type_rule()
                    .map(|r| checks::type_of(&subject, r, &self.custom_types)),
                RuleKind::Email => rules.email().map(|r| checks::email(&subject, r)),
                RuleKind::Url => rules.url().map(|r| checks::url(&subject, r)),
                RuleKind::Datetime => rules.datetime().map(|r| checks::datetime(&subject, r)),
                RuleKind::Custom => rules.custom().map(|r| Ok(r.check(value, values, field))),
                RuleKind::CustomAsync => None,
            };

            if let Some(message) = message.transpose()?.flatten() {
                errors.insert(
                    field,
                    kind,
                    finalize(field, &message, value, options.full_messages),
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RuleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEvaluator")
            .field("custom_types", &self.custom_types.keys().collect::<Vec<_>>())
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

#[async_trait]
impl Evaluator for RuleEvaluator {
    fn validate(
        &self,
        values: &Values,
        rules: &RuleMap,
        options: &EvaluateOptions,
    ) -> Result<GroupedErrors, EvaluateError> {
        let mut errors = GroupedErrors::new();
        for (field, set) in rules {
            self.check_field(field, set, values, options, &mut errors)?;
        }
        Ok(errors)
    }

    async fn validate_async(
        &self,
        values: &Values,
        rules: &RuleMap,
        options: &EvaluateOptions,
    ) -> Result<(), Rejection> {
        let mut errors = self.validate(values, rules, options)?;

        if !options.sync_only {
            let runs = rules.iter().filter_map(|(field, set)| {
                let rule = set.custom_async()?.clone();
                let field = field.clone();
                let value = values.get(&field).cloned().flatten();
                let handle = options.tasks.as_ref().map(|t| (t.clone(), t.begin(&field)));
                let future = rule.run(value.clone(), values.clone(), field.clone());

                Some(async move {
                    let outcome = match &handle {
                        Some((_, handle)) => {
                            tokio::select! {
                                _ = handle.token().cancelled() => None,
                                message = future => Some(message),
                            }
                        }
                        None => Some(future.await),
                    };
                    if let Some((tasks, handle)) = &handle {
                        tasks.finish(&field, handle.id());
                    }
                    (field, value, outcome)
                })
            });

            let mut cancelled = false;
            let mut added = false;
            for (field, value, outcome) in join_all(runs).await {
                match outcome {
                    None => {
                        log::debug!("Async rule for '{}' was superseded", field);
                        cancelled = true;
                    }
                    Some(Some(message)) => {
                        let message =
                            finalize(&field, &message, value.as_deref(), options.full_messages);
                        errors.insert(field, RuleKind::CustomAsync, message);
                        added = true;
                    }
                    Some(None) => {}
                }
            }

            if cancelled {
                return Err(Rejection::Cancelled);
            }
            if added {
                errors = order_by_rules(errors, rules);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Rejection::Invalid(errors))
        }
    }
}

/// Reorders each field's messages to follow its rule-set's kind order.
fn order_by_rules(errors: GroupedErrors, rules: &RuleMap) -> GroupedErrors {
    errors
        .iter()
        .map(|(field, field_errors)| {
            let mut field_errors = field_errors.clone();
            if let Some(set) = rules.get(field) {
                let kinds = set.kinds();
                let rank = |kind: &RuleKind| kinds.iter().position(|k| k == kind);
                field_errors.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
            }
            (field.clone(), field_errors)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::constraint::Constrain;
    use crate::evaluate::TaskRegistry;

    fn single(field: &str, value: Option<&str>, rules: Constrain) -> (Values, RuleMap) {
        let mut values = Values::new();
        values.insert(field.to_string(), value.map(str::to_string));
        let mut map = RuleMap::new();
        map.insert(field.to_string(), rules.into_rules());
        (values, map)
    }

    #[test]
    fn test_messages_follow_rule_order_and_prefix() {
        let (values, rules) = single(
            "userName",
            Some("ab"),
            Constrain::new().excludes(["ab"]).min_length(3),
        );
        let errors = RuleEvaluator::new()
            .validate(&values, &rules, &EvaluateOptions::default())
            .unwrap();

        assert_eq!(
            errors.messages("userName"),
            vec![
                "ab is restricted".to_string(),
                "User name is too short (minimum is 3 characters)".to_string(),
            ]
        );
    }

    #[test]
    fn test_format_patterns_compile_once() {
        let evaluator = RuleEvaluator::new();
        let rules = Constrain::new().matches("[0-9]{4}");

        for value in ["1234", "12a4", "9999"] {
            let (values, map) = single("pin", Some(value), rules.clone());
            evaluator
                .validate(&values, &map, &EvaluateOptions::default())
                .unwrap();
        }
        assert_eq!(evaluator.patterns.len(), 1);

        // Clones share the compiled patterns.
        let (values, map) = single("pin", Some("0000"), rules);
        let clone = evaluator.clone();
        clone.validate(&values, &map, &EvaluateOptions::default()).unwrap();
        assert_eq!(evaluator.patterns.len(), 1);
    }

    #[test]
    fn test_null_value_only_fails_presence_and_custom() {
        let (values, rules) = single(
            "age",
            None,
            Constrain::new()
                .required()
                .integer()
                .email()
                .custom(|value, _, _| value.is_none().then(|| "^missing".to_string())),
        );
        let errors = RuleEvaluator::new()
            .validate(&values, &rules, &EvaluateOptions::default())
            .unwrap();

        assert_eq!(errors.messages("age"), vec!["Age can't be blank", "missing"]);
    }

    #[test]
    fn test_empty_rule_set_exposes_value_only() {
        let mut values = Values::new();
        values.insert("password".to_string(), Some("secret".to_string()));
        values.insert("confirm".to_string(), Some("secret".to_string()));
        let mut rules = RuleMap::new();
        rules.insert("password".to_string(), RuleSet::new());
        rules.insert(
            "confirm".to_string(),
            Constrain::new().same_as("password").into_rules(),
        );

        let errors = RuleEvaluator::new()
            .validate(&values, &rules, &EvaluateOptions::default())
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_full_messages_disabled() {
        let (values, rules) = single("name", None, Constrain::new().required());
        let options = EvaluateOptions::default().with_full_messages(false);
        let errors = RuleEvaluator::new().validate(&values, &rules, &options).unwrap();

        assert_eq!(errors.messages("name"), vec!["can't be blank"]);
    }

    #[tokio::test]
    async fn test_validate_async_reports_async_message_in_rule_order() {
        let (values, rules) = single(
            "name",
            Some("x"),
            Constrain::new()
                .custom_async(|_, _, _| async { Some("is taken".to_string()) })
                .min_length(3),
        );
        let result = RuleEvaluator::new()
            .validate_async(&values, &rules, &EvaluateOptions::default())
            .await;

        let errors = match result {
            Err(Rejection::Invalid(errors)) => errors,
            other => panic!("expected invalid, got {other:?}"),
        };
        assert_eq!(
            errors.messages("name"),
            vec!["Name is taken", "Name is too short (minimum is 3 characters)"]
        );
    }

    #[tokio::test]
    async fn test_validate_async_sync_only_skips_async_rules() {
        let (values, rules) = single(
            "name",
            Some("x"),
            Constrain::new().custom_async(|_, _, _| async { Some("is taken".to_string()) }),
        );
        let options = EvaluateOptions::default().with_sync_only(true);
        let result = RuleEvaluator::new().validate_async(&values, &rules, &options).await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_run_is_cancelled() {
        let (values, rules) = single(
            "name",
            Some("x"),
            Constrain::new().custom_async(|_, _, _| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                None
            }),
        );
        let tasks = TaskRegistry::new();
        let options = EvaluateOptions::default().with_tasks(tasks.clone());
        let evaluator = RuleEvaluator::new();

        let first = {
            let (evaluator, values, rules, options) =
                (evaluator.clone(), values.clone(), rules.clone(), options.clone());
            tokio::spawn(async move { evaluator.validate_async(&values, &rules, &options).await })
        };
        tokio::task::yield_now().await;

        let second = evaluator.validate_async(&values, &rules, &options).await;
        let first = first.await.unwrap();

        assert!(matches!(first, Err(Rejection::Cancelled)));
        assert!(second.is_ok());
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_genuine_error_is_failed_rejection() {
        let (values, rules) = single("code", Some("x"), Constrain::new().matches("("));
        let result = RuleEvaluator::new()
            .validate_async(&values, &rules, &EvaluateOptions::default())
            .await;

        assert!(matches!(result, Err(Rejection::Failed(EvaluateError::InvalidPattern { .. }))));
    }
}
