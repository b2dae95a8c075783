//! Group configuration

use std::time::Duration;

use crate::bind::EventKind;

/// Configuration of a [`FormGroup`](super::FormGroup).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use formset_lib::bind::EventKind;
/// use formset_lib::group::GroupConfig;
///
/// let config = GroupConfig::default()
///     .with_full_messages(false)
///     .with_dispatch_delay(Duration::from_millis(50))
///     .with_default_events(vec![EventKind::Input, EventKind::Blur]);
/// ```
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Prefix messages with the prettified field name.
    ///
    /// Default: true
    pub full_messages: bool,

    /// Delay applied to every event dispatched by a bound source.
    ///
    /// Zero defers by a single scheduler yield. Default: zero
    pub dispatch_delay: Duration,

    /// Events listened to by `bind` when none are requested.
    ///
    /// Default: input only
    pub default_events: Vec<EventKind>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            full_messages: true,
            dispatch_delay: Duration::ZERO,
            default_events: vec![EventKind::Input],
        }
    }
}

impl GroupConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether messages carry the field name.
    pub fn with_full_messages(mut self, full_messages: bool) -> Self {
        self.full_messages = full_messages;
        self
    }

    /// Sets the dispatch delay.
    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    /// Sets the events used by `bind` when none are requested.
    pub fn with_default_events(mut self, events: Vec<EventKind>) -> Self {
        self.default_events = events;
        self
    }
}
