//! gpu-probe: Point-in-time GPU telemetry as partially-fallible JSON
//!
//! A query names a device (or all devices) and a set of fields. Each field is
//! retrieved independently through one of three backends (the NVML library,
//! the `nvidia-smi` tool, or a simulator) and reported as a
//! [`FieldResult`], so one unsupported field never hides the others.
//!
//! ```no_run
//! use gpu_probe::{BackendKind, DeviceSelector, Engine, ProbeConfig, Selection};
//!
//! let engine = Engine::open(BackendKind::Synthetic, &ProbeConfig::default())?;
//! let doc = engine.query(DeviceSelector::All, &Selection::from_tokens(["count", "temp"]));
//! println!("{}", doc.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;

pub use gpu_probe_core::{Backend, DeviceRef, EngineError, QueryEngine, Registry};
pub use gpu_probe_sources::Engine;
pub use gpu_probe_types::{
    BackendKind, DeviceReport, DeviceSelector, Field, FieldOutput, FieldResult, Flag,
    ProbeConfig, QueryDocument, Selection,
};
