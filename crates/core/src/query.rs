//! Query orchestration: fan-out over devices and fields

use crate::backend::{Backend, DeviceRef};
use crate::constants::NO_GPUS_FOUND;
use crate::registry::Registry;
use gpu_probe_types::{DeviceReport, DeviceSelector, Field, FieldOutput, QueryDocument, Selection};
use std::collections::BTreeMap;

/// Query engine bound to one backend
///
/// Owns the backend (and with it any library handle or command settings)
/// together with the backend's handler registry.
pub struct QueryEngine<B: Backend> {
    backend: B,
    registry: Registry<B>,
}

impl<B: Backend> QueryEngine<B> {
    pub fn new(backend: B) -> Self {
        let registry = Registry::for_backend();
        let missing = registry.missing();
        if !missing.is_empty() {
            log::warn!("{} backend has no handler for: {:?}", backend.kind(), missing);
        }
        log::info!("{} backend ready with {} field handlers", backend.kind(), registry.len());

        Self { backend, registry }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &Registry<B> {
        &self.registry
    }

    /// Run one query.
    ///
    /// Only an empty device list, an out-of-range index or a device that
    /// cannot be resolved produce a query-level error. Every other failure is
    /// captured in the affected field's result.
    pub fn query(&self, target: DeviceSelector, selection: &Selection) -> QueryDocument {
        let count = self.backend.device_count();
        let mut document = QueryDocument::default();

        if selection.wants_count() {
            document.count = Some(count);
        }

        if !selection.wants_devices() {
            return document;
        }

        if count == 0 {
            document.error = Some(NO_GPUS_FOUND.to_string());
            return document;
        }

        let indices: Vec<u32> = match target {
            DeviceSelector::Index(index) if index >= count => {
                return QueryDocument::failure(format!("Invalid GPU index: {}", index));
            }
            DeviceSelector::Index(index) => vec![index],
            DeviceSelector::All => (0..count).collect(),
        };

        let mut gpus = BTreeMap::new();
        for index in indices {
            let device = match self.backend.resolve(index) {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("Aborting query: {}", e);
                    return QueryDocument::failure(e.to_string());
                }
            };
            gpus.insert(index, self.query_device(device, selection));
        }

        document.gpus = Some(gpus);
        document
    }

    /// Evaluate the selected fields for one device
    pub fn query_device(&self, device: DeviceRef, selection: &Selection) -> DeviceReport {
        let fields: Vec<Field> = if selection.wants_all() {
            self.registry.fields().collect()
        } else {
            selection.fields().collect()
        };

        fields
            .into_iter()
            .filter_map(|field| self.query_field(device, field).map(|output| (field, output)))
            .collect()
    }

    /// Evaluate a single field, `None` if the backend has no handler for it
    pub fn query_field(&self, device: DeviceRef, field: Field) -> Option<FieldOutput> {
        let handler = self.registry.get(field)?;
        log::debug!("{}: querying {} for GPU {}", self.backend.kind(), field, device.index);
        let output = handler(&self.backend, device);
        if output.has_error() {
            log::debug!("GPU {} {} unavailable", device.index, field);
        }
        Some(output)
    }
}
