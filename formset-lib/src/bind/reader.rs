//! Reading the per-field override attribute of an event target.

use std::sync::Arc;

use super::{AttributeStyle, EventTarget};

/// Attribute names that override an input's native name, in priority order.
pub const OVERRIDE_ATTRIBUTES: [&str; 2] = ["data-validate-control", "validate-control"];

/// Reads attributes from event targets.
pub trait AttributeReader: Send + Sync {
    fn read(&self, target: &EventTarget, key: &str) -> Option<String>;
}

/// Reads attributes through the target's attribute accessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessorReader;

impl AttributeReader for AccessorReader {
    fn read(&self, target: &EventTarget, key: &str) -> Option<String> {
        target.attributes.get(key).cloned()
    }
}

/// Reads attributes exposed as plain properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyReader;

impl AttributeReader for PropertyReader {
    fn read(&self, target: &EventTarget, key: &str) -> Option<String> {
        target.properties.get(key).cloned()
    }
}

/// Returns the reader matching a source's attribute style.
pub fn reader_for(style: AttributeStyle) -> Arc<dyn AttributeReader> {
    match style {
        AttributeStyle::Accessor => Arc::new(AccessorReader),
        AttributeStyle::Property => Arc::new(PropertyReader),
    }
}

/// Resolves the field name of a target: an override attribute wins over the
/// native name. Empty names are ignored.
pub fn resolve_name(reader: &dyn AttributeReader, target: &EventTarget) -> Option<String> {
    OVERRIDE_ATTRIBUTES
        .iter()
        .filter_map(|key| reader.read(target, key))
        .chain(target.name.clone())
        .find(|name| !name.is_empty())
}
