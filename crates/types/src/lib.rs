//! gpu-probe-types: Shared data types for gpu-probe.
//!
//! This crate contains pure data types (the field vocabulary, field results,
//! query documents, selections and configuration) shared by every gpu-probe
//! crate and by collaborators that consume query documents.

pub mod config;
pub mod document;
pub mod field;
pub mod result;
pub mod selection;

// Re-export commonly used types at the crate root for convenience
pub use config::{BackendKind, ProbeConfig, ShellConfig, SyntheticConfig};
pub use document::{DeviceReport, QueryDocument};
pub use field::Field;
pub use result::{
    Clocks, EccCounts, FieldOutput, FieldResult, MemoryUsage, ProcessEntry, Utilization,
};
pub use selection::{DeviceSelector, Flag, Selection};
