//! Group orchestration.
//!
//! A [`FormGroup`] owns a set of fields and decides when the evaluator runs:
//!
//! - a synchronous pass over every field after fields are added or values are
//!   updated,
//! - an asynchronous sweep for fields declaring an asynchronous rule whose
//!   value changed since their last run,
//! - a reactive pass for a single field when a bound source reports an edit.
//!
//! Results of overlapping runs are merged through one merge function. A
//! result is only trusted while its field still holds the value the run was
//! started with.

mod config;
mod state;

pub use config::*;
pub use state::{Controls, RenderFn};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use self::state::{Bound, GroupState};
use crate::bind::{
    AccessorReader, AttributeReader, EventKind, InputEvent, InputSource, reader_for,
    resolve_name,
};
use crate::constraint::{Constrain, RuleKind};
use crate::control::FormControl;
use crate::error::{BindError, EvaluateError};
use crate::evaluate::{
    EvaluateOptions, Evaluator, GroupedErrors, Rejection, RuleEvaluator, RuleMap, TaskRegistry,
    Values,
};

/// A group of validated fields.
///
/// Cheap to clone; clones share the same fields. Asynchronous work is spawned
/// on the tokio runtime the group is used from.
///
/// # Example
///
/// ```
/// use formset_lib::constraint::Constrain;
/// use formset_lib::group::{FormGroup, GroupConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group = FormGroup::new(
///     [
///         ("username", Constrain::new().required().with_value("john")),
///         ("password", Constrain::new().required().min_length(6).with_value("secret")),
///     ],
///     GroupConfig::default(),
/// )
/// .unwrap();
///
/// assert!(group.valid());
///
/// group.update_values([("username", Some("  "))]).unwrap();
/// assert!(group.invalid());
/// assert_eq!(group.get("username").unwrap().errors(), ["Username can't be blank"]);
/// # }
/// ```
#[derive(Clone)]
pub struct FormGroup {
    inner: Arc<GroupInner>,
}

struct GroupInner {
    state: Mutex<GroupState>,
    evaluator: Arc<dyn Evaluator>,
    config: GroupConfig,
    tasks: TaskRegistry,
    pending: Arc<watch::Sender<usize>>,
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        self.tasks.cancel_all();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(bound) = state.bound.take() {
            for id in bound.listeners {
                bound.source.remove_listener(id);
            }
        }
    }
}

/// Counts a spawned orchestration task until dropped.
struct PendingGuard(Arc<watch::Sender<usize>>);

impl PendingGuard {
    fn new(pending: &Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|n| *n += 1);
        Self(Arc::clone(pending))
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// A pending asynchronous sweep run.
struct SweepJob {
    field: String,
    value: Option<String>,
    rules: RuleMap,
}

impl FormGroup {
    /// Creates a group with the built-in [`RuleEvaluator`].
    ///
    /// Runs the synchronous pass, then starts the asynchronous sweep.
    pub fn new<I, K>(controls: I, config: GroupConfig) -> Result<Self, EvaluateError>
    where
        I: IntoIterator<Item = (K, Constrain)>,
        K: Into<String>,
    {
        Self::with_evaluator(controls, config, Arc::new(RuleEvaluator::new()))
    }

    /// Creates a group evaluated by `evaluator`.
    pub fn with_evaluator<I, K>(
        controls: I,
        config: GroupConfig,
        evaluator: Arc<dyn Evaluator>,
    ) -> Result<Self, EvaluateError>
    where
        I: IntoIterator<Item = (K, Constrain)>,
        K: Into<String>,
    {
        let (pending, _) = watch::channel(0);
        let group = Self {
            inner: Arc::new(GroupInner {
                state: Mutex::new(GroupState {
                    valid: true,
                    ..Default::default()
                }),
                evaluator,
                config,
                tasks: TaskRegistry::new(),
                pending: Arc::new(pending),
            }),
        };
        group.add_controls(controls)?;
        Ok(group)
    }

    fn state(&self) -> MutexGuard<'_, GroupState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn options(&self, sync_only: bool) -> EvaluateOptions {
        EvaluateOptions::default()
            .with_full_messages(self.inner.config.full_messages)
            .with_sync_only(sync_only)
            .with_tasks(self.inner.tasks.clone())
    }

    /// Returns the group configuration.
    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Adds fields, replacing fields of the same name.
    ///
    /// Runs the synchronous pass over the whole group, then starts the
    /// asynchronous sweep for the added fields.
    pub fn add_controls<I, K>(&self, controls: I) -> Result<(), EvaluateError>
    where
        I: IntoIterator<Item = (K, Constrain)>,
        K: Into<String>,
    {
        let mut added = Vec::new();
        {
            let mut state = self.state();
            for (name, rules) in controls {
                let name = name.into();
                self.inner.tasks.cancel(&name);
                state.insert_control(FormControl::new(name.clone(), rules));
                added.push(name);
            }
        }
        log::debug!("Added controls {:?}", added);

        self.run_sync_validators()?;
        self.run_async_validators(Some(added.as_slice()));
        Ok(())
    }

    /// Removes fields. Unknown names are ignored.
    pub fn remove_controls<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut state = self.state();
            for name in names {
                let name = name.as_ref();
                if state.remove_control(name) {
                    self.inner.tasks.cancel(name);
                    log::debug!("Removed control '{}'", name);
                }
            }
            state.refresh_valid();
        }
        self.notify();
    }

    /// Returns a snapshot of the field `name`.
    pub fn get(&self, name: &str) -> Option<FormControl> {
        self.state().controls.get(name).cloned()
    }

    /// Returns a snapshot of every field.
    pub fn controls(&self) -> Controls {
        self.state().controls.clone()
    }

    /// Returns the field names in insertion order.
    pub fn considered(&self) -> Vec<String> {
        self.state().controls.keys().cloned().collect()
    }

    pub fn values(&self) -> Values {
        self.state().values.clone()
    }

    pub fn rules(&self) -> RuleMap {
        self.state().rules.clone()
    }

    /// Returns the accumulated errors by field and rule kind.
    pub fn grouped_errors(&self) -> GroupedErrors {
        self.state().errors.clone()
    }

    /// Returns `true` if no field has errors or is loading.
    pub fn valid(&self) -> bool {
        self.state().valid
    }

    pub fn invalid(&self) -> bool {
        !self.valid()
    }

    /// Sets the values of known fields and revalidates.
    ///
    /// Runs the synchronous pass over the whole group, then the asynchronous
    /// sweep for the updated fields.
    pub fn update_values<I, K, V>(&self, values: I) -> Result<(), EvaluateError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut updated = Vec::new();
        {
            let mut state = self.state();
            for (name, value) in values {
                let name = name.as_ref();
                if state
                    .set_value(name, value.as_ref().map(|v| v.as_ref()))
                    .is_some()
                {
                    updated.push(name.to_string());
                }
            }
        }

        self.run_sync_validators()?;
        self.run_async_validators(Some(updated.as_slice()));
        Ok(())
    }

    // =========================================================================
    // Touched state
    // =========================================================================

    pub fn touch(&self, name: &str) {
        self.set_touched(Some(name), true);
    }

    pub fn un_touch(&self, name: &str) {
        self.set_touched(Some(name), false);
    }

    pub fn touch_all(&self) {
        self.set_touched(None, true);
    }

    pub fn un_touch_all(&self) {
        self.set_touched(None, false);
    }

    fn set_touched(&self, name: Option<&str>, touched: bool) {
        {
            let mut state = self.state();
            for (control_name, control) in state.controls.iter_mut() {
                if name.is_none_or(|n| n == control_name) {
                    control.set_touched(touched);
                }
            }
        }
        self.notify();
    }

    /// Clears errors, loading and touched of every field. Values are kept and
    /// the group becomes invalid until the next validation.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            for control in state.controls.values_mut() {
                control.reset();
            }
            state.errors = GroupedErrors::new();
            state.valid = false;
        }
        self.notify();
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Installs the callback invoked after every state change.
    pub fn render<F>(&self, callback: F)
    where
        F: Fn(bool, &Controls) + Send + Sync + 'static,
    {
        self.state().render = Some(Arc::new(callback));
    }

    /// Removes the render callback.
    pub fn clear_render(&self) {
        self.state().render = None;
    }

    fn notify(&self) {
        let snapshot = {
            let state = self.state();
            state
                .render
                .clone()
                .map(|render| (render, state.valid, state.controls.clone()))
        };
        if let Some((render, valid, controls)) = snapshot {
            render(valid, &controls);
        }
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Listens for `events` on `source`, or the configured default events
    /// when `events` is empty.
    ///
    /// A previously bound source is released first. Values of the source's
    /// inputs are collected and validated shortly after binding.
    pub fn bind(&self, source: Arc<dyn InputSource>, events: &[EventKind]) -> Result<(), BindError> {
        if !source.is_container() {
            return Err(BindError::NotAContainer(source.describe()));
        }
        let runtime = Handle::try_current().map_err(|_| BindError::NoRuntime)?;
        self.unbind();

        let events = if events.is_empty() {
            self.inner.config.default_events.clone()
        } else {
            events.to_vec()
        };
        let reader = reader_for(source.attribute_style());

        let mut listeners = Vec::with_capacity(events.len());
        for kind in &events {
            let group = Arc::downgrade(&self.inner);
            let runtime = runtime.clone();
            let listener = move |event: InputEvent| {
                if let Some(inner) = Weak::upgrade(&group) {
                    FormGroup { inner }.spawn_dispatch(&runtime, event);
                }
            };
            listeners.push(source.add_listener(*kind, Arc::new(listener)));
        }
        log::debug!("Bound to {} for {:?}", source.describe(), events);

        self.state().bound = Some(Bound {
            source: Arc::clone(&source),
            listeners,
            reader: Arc::clone(&reader),
        });

        let guard = PendingGuard::new(&self.inner.pending);
        let group = self.clone();
        runtime.spawn(async move {
            let _guard = guard;
            group.defer().await;
            let collected: Vec<(String, Option<String>)> = source
                .inputs()
                .iter()
                .filter_map(|target| {
                    let name = resolve_name(reader.as_ref(), target)?;
                    Some((name, target.event_value()))
                })
                .collect();
            if let Err(err) = group.update_values(collected) {
                log::error!("Initial validation after bind failed: {}", err);
            }
        });
        Ok(())
    }

    /// Releases the bound source, if any.
    pub fn unbind(&self) {
        let bound = self.state().bound.take();
        if let Some(bound) = bound {
            for id in bound.listeners {
                bound.source.remove_listener(id);
            }
            log::debug!("Unbound from {}", bound.source.describe());
        }
    }

    // =========================================================================
    // Reactive path
    // =========================================================================

    /// Validates the field an event originates from, after the dispatch delay.
    ///
    /// Returns `None` when the event names no known field or no runtime is
    /// available. The task resolves to an error only when the evaluator
    /// cannot run the rules.
    pub fn dispatch(&self, event: InputEvent) -> Option<JoinHandle<Result<(), EvaluateError>>> {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("Dispatch requested without an async runtime");
            return None;
        };
        self.spawn_dispatch(&runtime, event)
    }

    fn spawn_dispatch(
        &self,
        runtime: &Handle,
        event: InputEvent,
    ) -> Option<JoinHandle<Result<(), EvaluateError>>> {
        let name = {
            let state = self.state();
            let reader: Arc<dyn AttributeReader> = match &state.bound {
                Some(bound) => Arc::clone(&bound.reader),
                None => Arc::new(AccessorReader),
            };
            let name = resolve_name(reader.as_ref(), &event.target)?;
            if !state.controls.contains_key(&name) {
                log::trace!("Ignoring {:?} event for unknown field '{}'", event.kind, name);
                return None;
            }
            name
        };
        let value = event.target.event_value();

        let guard = PendingGuard::new(&self.inner.pending);
        let group = self.clone();
        Some(runtime.spawn(async move {
            let _guard = guard;
            group.defer().await;
            group.validate_field(name, value).await
        }))
    }

    async fn defer(&self) {
        let delay = self.inner.config.dispatch_delay;
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }

    /// Sets a field's value and validates the group with the field's
    /// asynchronous rule included.
    async fn validate_field(&self, name: String, value: Option<String>) -> Result<(), EvaluateError> {
        let (values, rules, generation, run_value, has_async) = {
            let mut state = self.state();
            let Some(run_value) = state.set_value(&name, value.as_deref()) else {
                return Ok(());
            };
            state.generation += 1;
            log::trace!("Generation {} for '{}'", state.generation, name);

            let has_async = state.async_fields.contains(&name);
            if has_async {
                state.last_async_value.insert(name.clone(), run_value.clone());
                state.set_loading(&name, true);
                state.refresh_valid();
            }
            (
                state.values.clone(),
                state.rules_without_async(Some(&name)),
                state.generation,
                run_value,
                has_async,
            )
        };
        if has_async {
            self.notify();
        }

        let result = self
            .inner
            .evaluator
            .validate_async(&values, &rules, &self.options(false))
            .await;

        let mut cancelled = false;
        let mut failure = None;
        {
            let mut state = self.state();
            if !state.controls.contains_key(&name) {
                return Ok(());
            }
            let found = match result {
                Ok(()) => Some(GroupedErrors::new()),
                Err(Rejection::Invalid(found)) => Some(found),
                Err(Rejection::Cancelled) => {
                    log::debug!("Run for '{}' was superseded", name);
                    cancelled = true;
                    None
                }
                Err(Rejection::Failed(err)) => {
                    failure = Some(err);
                    None
                }
            };

            if let Some(found) = found {
                if state.generation == generation {
                    state.merge_run(&found, Some(&name));
                } else if state.value_is(&name, &run_value) {
                    let message = found.get(&name, RuleKind::CustomAsync).map(str::to_string);
                    state.merge_async(&name, message);
                } else {
                    log::debug!("Discarding stale result for '{}'", name);
                }
            }

            if let Some(control) = state.controls.get_mut(&name) {
                control.set_touched(true);
            }
            state.apply_errors();
            // Loading of a superseded run belongs to the run that replaced it.
            if !cancelled {
                state.set_loading(&name, false);
            }
            state.refresh_valid();
        }
        self.notify();

        match failure {
            Some(err) => {
                log::error!("Validation of '{}' failed: {}", name, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // Group passes
    // =========================================================================

    /// Evaluates every synchronous rule of the group and merges the result.
    ///
    /// Bumps the generation, so reactive runs started earlier only merge
    /// their asynchronous message.
    fn run_sync_validators(&self) -> Result<(), EvaluateError> {
        let (values, rules) = {
            let mut state = self.state();
            state.generation += 1;
            log::trace!("Generation {} for group pass", state.generation);
            (state.values.clone(), state.rules_without_async(None))
        };

        let found = self
            .inner
            .evaluator
            .validate(&values, &rules, &self.options(true))?;

        {
            let mut state = self.state();
            state.merge_run(&found, None);
            state.apply_errors();
            state.refresh_valid();
        }
        self.notify();
        Ok(())
    }

    /// Starts an asynchronous run for every field in `scope` (all fields when
    /// `None`) whose value changed since its last run.
    fn run_async_validators(&self, scope: Option<&[String]>) {
        let in_scope = |name: &String| scope.is_none_or(|names| names.contains(name));

        let has_candidates = {
            let state = self.state();
            state.async_fields.iter().any(in_scope)
        };
        if !has_candidates {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("Async validation requested without an async runtime; skipping");
            return;
        };

        let (jobs, values) = {
            let mut state = self.state();
            let candidates: Vec<String> = state
                .async_fields
                .iter()
                .filter(|n| in_scope(*n))
                .cloned()
                .collect();

            let mut jobs = Vec::new();
            for field in candidates {
                let value = state.values.get(&field).cloned().flatten();
                if state.last_async_value.get(&field) == Some(&value) {
                    continue;
                }
                state.last_async_value.insert(field.clone(), value.clone());
                state.set_loading(&field, true);
                let rules = state.rules_for_async(&field);
                jobs.push(SweepJob { field, value, rules });
            }
            state.refresh_valid();
            (jobs, state.values.clone())
        };
        if jobs.is_empty() {
            return;
        }
        self.notify();

        for job in jobs {
            log::debug!("Starting async run for '{}'", job.field);
            let guard = PendingGuard::new(&self.inner.pending);
            let group = self.clone();
            let values = values.clone();
            runtime.spawn(async move {
                let _guard = guard;
                group.finish_async(job, values).await;
            });
        }
    }

    async fn finish_async(&self, job: SweepJob, values: Values) {
        let SweepJob { field, value, rules } = job;
        let result = self
            .inner
            .evaluator
            .validate_async(&values, &rules, &self.options(false))
            .await;

        let message = match result {
            Ok(()) => None,
            Err(Rejection::Invalid(found)) => {
                found.get(&field, RuleKind::CustomAsync).map(str::to_string)
            }
            Err(Rejection::Cancelled) => {
                log::debug!("Async run for '{}' was superseded", field);
                return;
            }
            Err(Rejection::Failed(err)) => {
                log::error!("Async validation of '{}' failed: {}", field, err);
                {
                    let mut state = self.state();
                    if state.value_is(&field, &value) {
                        state.set_loading(&field, false);
                        state.refresh_valid();
                    }
                }
                self.notify();
                return;
            }
        };

        {
            let mut state = self.state();
            if !state.value_is(&field, &value) {
                log::debug!("Discarding async result for '{}': value changed", field);
                return;
            }
            state.merge_async(&field, message);
            state.apply_errors();
            state.set_loading(&field, false);
            state.refresh_valid();
        }
        self.notify();
    }

    /// Waits until every task spawned by this group has finished.
    pub async fn settled(&self) {
        let mut pending = self.inner.pending.subscribe();
        let _ = pending.wait_for(|n| *n == 0).await;
    }
}

impl std::fmt::Debug for FormGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("FormGroup")
            .field("considered", &state.controls.keys().collect::<Vec<_>>())
            .field("valid", &state.valid)
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}
