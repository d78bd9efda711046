//! Registry of field handlers for one backend

use crate::backend::{Backend, DeviceRef};
use gpu_probe_types::{Field, FieldOutput};
use std::collections::BTreeMap;

/// Function that retrieves one field from one device
pub type FieldHandler<B> = fn(&B, DeviceRef) -> FieldOutput;

/// Registry mapping every field to the handler that produces it
///
/// Built once when an engine is created and read-only afterwards.
pub struct Registry<B> {
    handlers: BTreeMap<Field, FieldHandler<B>>,
}

impl<B> Registry<B> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the field
    pub fn register(&mut self, field: Field, handler: FieldHandler<B>) {
        if self.handlers.insert(field, handler).is_some() {
            log::trace!("Replaced handler for {}", field);
        }
    }

    /// Handler for a field
    pub fn get(&self, field: Field) -> Option<FieldHandler<B>> {
        self.handlers.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.handlers.contains_key(&field)
    }

    /// Registered fields in document order
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.handlers.keys().copied()
    }

    /// Fields of the vocabulary without a handler
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|field| !self.contains(*field))
            .collect()
    }

    /// True if every field has a handler
    pub fn is_total(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<B: Backend> Registry<B> {
    /// Registry populated by the backend's own handlers
    pub fn for_backend() -> Self {
        let mut registry = Self::new();
        B::register(&mut registry);
        registry
    }
}

impl<B> Default for Registry<B> {
    fn default() -> Self {
        Self::new()
    }
}
