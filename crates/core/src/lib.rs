//! gpu-probe-core: Backend trait, field registry and query orchestration.
//!
//! This crate contains the `Backend` trait every data source implements, the
//! per-backend field handler `Registry`, the composite field evaluator and
//! the `QueryEngine` that turns a selection into a query document.

pub mod constants;
mod backend;
mod composite;
mod error;
mod query;
mod registry;

pub use backend::{Backend, DeviceRef};
pub use composite::Composite;
pub use error::{EngineError, Result};
pub use query::QueryEngine;
pub use registry::{FieldHandler, Registry};

// Re-export types used in trait signatures for convenience
pub use gpu_probe_types::{
    BackendKind, DeviceSelector, Field, FieldOutput, FieldResult, QueryDocument, Selection,
};
