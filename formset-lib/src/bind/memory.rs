//! In-memory input source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use super::{
    AttributeStyle, EventKind, EventTarget, InputEvent, InputSource, Listener, ListenerId,
};

/// An input source held in memory.
///
/// Inputs are kept by name. [`MemorySource::emit`] delivers an event to every
/// listener registered for its kind. Cheap to clone; clones share state.
///
/// # Example
///
/// ```
/// use formset_lib::bind::{EventKind, EventTarget, InputSource, MemorySource};
///
/// let source = MemorySource::new();
/// source.set_input(EventTarget::new("email").with_value("a@b.co"));
/// assert_eq!(source.inputs().len(), 1);
/// assert_eq!(source.listener_count(EventKind::Input), 0);
/// ```
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<MemorySourceInner>,
}

#[derive(Default)]
struct MemorySourceInner {
    style: AttributeStyle,
    next_id: AtomicU64,
    state: RwLock<MemorySourceState>,
}

#[derive(Default)]
struct MemorySourceState {
    inputs: IndexMap<String, EventTarget>,
    listeners: Vec<(ListenerId, EventKind, Listener)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source whose inputs expose attributes as properties.
    pub fn with_property_attributes() -> Self {
        Self {
            inner: Arc::new(MemorySourceInner {
                style: AttributeStyle::Property,
                ..Default::default()
            }),
        }
    }

    /// Adds or replaces an input, keyed by its native name.
    pub fn set_input(&self, target: EventTarget) {
        let key = target.name.clone().unwrap_or_default();
        if let Ok(mut state) = self.inner.state.write() {
            state.inputs.insert(key, target);
        }
    }

    /// Stores `target` and delivers an event for it.
    pub fn emit(&self, kind: EventKind, target: EventTarget) {
        self.set_input(target.clone());

        // Listeners may re-enter the source.
        let listeners: Vec<Listener> = match self.inner.state.read() {
            Ok(state) => state
                .listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, l)| Arc::clone(l))
                .collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(InputEvent::new(kind, target.clone()));
        }
    }

    /// Returns the number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .state
            .read()
            .map(|state| state.listeners.iter().filter(|(_, k, _)| *k == kind).count())
            .unwrap_or(0)
    }
}

impl InputSource for MemorySource {
    fn is_container(&self) -> bool {
        true
    }

    fn attribute_style(&self) -> AttributeStyle {
        self.inner.style
    }

    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut state) = self.inner.state.write() {
            state.listeners.push((id, kind, listener));
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut state) = self.inner.state.write() {
            state.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        }
    }

    fn inputs(&self) -> Vec<EventTarget> {
        self.inner
            .state
            .read()
            .map(|state| state.inputs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn describe(&self) -> String {
        "memory source".to_string()
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("style", &self.inner.style)
            .finish_non_exhaustive()
    }
}
