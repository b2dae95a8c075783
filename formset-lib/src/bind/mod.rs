//! Input sources a group can be bound to.
//!
//! A source contains named inputs and delivers [`InputEvent`]s to registered
//! listeners. Binding a group to a source validates the edited field on every
//! event the group listens for.

mod memory;
mod reader;

pub use memory::*;
pub use reader::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Events a group can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The value of an input changed.
    Input,
    Focus,
    Blur,
}

/// Kind of input element an event originates from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputType {
    #[default]
    Text,
    Checkbox,
    Radio,
    Select,
    Other(String),
}

/// The input an event originates from.
///
/// # Example
///
/// ```
/// use formset_lib::bind::{EventTarget, InputType};
///
/// let terms = EventTarget::new("terms")
///     .with_value("yes")
///     .with_type(InputType::Checkbox)
///     .with_checked(false);
/// assert_eq!(terms.event_value(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventTarget {
    pub name: Option<String>,
    pub value: Option<String>,
    pub input_type: InputType,
    pub checked: bool,
    /// Attributes read through an accessor.
    pub attributes: HashMap<String, String>,
    /// Attributes exposed as plain properties.
    pub properties: HashMap<String, String>,
}

impl EventTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Creates a target without a native name.
    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The value this target contributes: an unchecked checkbox has none.
    pub fn event_value(&self) -> Option<String> {
        if self.input_type == InputType::Checkbox && !self.checked {
            return None;
        }
        self.value.clone()
    }
}

/// An event delivered by a source.
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub kind: EventKind,
    pub target: EventTarget,
}

impl InputEvent {
    pub fn new(kind: EventKind, target: EventTarget) -> Self {
        Self { kind, target }
    }

    pub fn input(target: EventTarget) -> Self {
        Self::new(EventKind::Input, target)
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback registered on a source.
pub type Listener = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// How a source exposes per-input attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AttributeStyle {
    #[default]
    Accessor,
    Property,
}

/// A container of inputs that delivers events.
pub trait InputSource: Send + Sync {
    /// Returns `true` if the source can hold inputs and deliver events.
    fn is_container(&self) -> bool;

    /// How attributes of this source's inputs are read.
    fn attribute_style(&self) -> AttributeStyle {
        AttributeStyle::Accessor
    }

    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Current inputs, used to collect values right after binding.
    fn inputs(&self) -> Vec<EventTarget>;

    /// Short description used in error messages.
    fn describe(&self) -> String {
        "input source".to_string()
    }
}
