//! Backend trait and device references

use crate::error::EngineError;
use crate::registry::Registry;
use gpu_probe_types::BackendKind;

/// Identifies one device to a backend for the duration of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceRef {
    /// Ordinal index within the backend's device list
    pub index: u32,
}

impl DeviceRef {
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

/// Trait for all telemetry backends
///
/// A backend knows how many devices it can see, how to turn an index into a
/// device reference, and supplies a handler for every field. Handlers must
/// translate every source-specific failure into a field result; nothing a
/// handler does may abort the query.
pub trait Backend: Send + Sync + Sized + 'static {
    /// Which data source this backend reads
    fn kind(&self) -> BackendKind;

    /// Number of visible devices, 0 if enumeration fails
    fn device_count(&self) -> u32;

    /// Resolve an index into a device reference
    fn resolve(&self, index: u32) -> Result<DeviceRef, EngineError> {
        Ok(DeviceRef::new(index))
    }

    /// Register a handler for every field
    fn register(registry: &mut Registry<Self>);
}
