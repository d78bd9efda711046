//! gpu-probe-sources: Backend implementations for gpu-probe.
//!
//! Three backends read the same field vocabulary: the NVML library (behind
//! the `nvidia` feature), the `nvidia-smi`/`dcgmi` command-line tools, and a
//! synthetic generator for machines without a GPU. [`Engine`] selects one at
//! runtime.

mod gpu;

pub use gpu::{
    ClockDomain, CommandOutput, CommandRunner, DeviceLibrary, EccKind, LibraryError, MemoryBytes,
    NativeBackend, RunError, ShellBackend, SyntheticBackend, SystemRunner,
    SYNTHETIC_DEVICE_COUNT,
};
#[cfg(feature = "nvidia")]
pub use gpu::NvmlLibrary;

use gpu_probe_core::{Backend, EngineError, QueryEngine};
use gpu_probe_types::{BackendKind, DeviceSelector, ProbeConfig, QueryDocument, Selection};

/// Query engine over whichever backend was selected
///
/// Enum dispatch instead of `Box<dyn>` since each engine is generic over its
/// backend.
pub enum Engine {
    #[cfg(feature = "nvidia")]
    Native(QueryEngine<NativeBackend<NvmlLibrary>>),
    Shell(QueryEngine<ShellBackend>),
    Synthetic(QueryEngine<SyntheticBackend>),
}

impl Engine {
    /// Initialize the requested backend
    pub fn open(kind: BackendKind, config: &ProbeConfig) -> Result<Self, EngineError> {
        log::debug!("Opening {} backend", kind);
        match kind {
            #[cfg(feature = "nvidia")]
            BackendKind::Native => {
                let library = NvmlLibrary::init()
                    .map_err(|e| EngineError::InitializationFailed(kind, e.to_string()))?;
                Ok(Engine::Native(QueryEngine::new(NativeBackend::new(library))))
            }
            #[cfg(not(feature = "nvidia"))]
            BackendKind::Native => Err(EngineError::Unavailable(
                kind,
                "NVML support not compiled in".to_string(),
            )),
            BackendKind::Shell => Ok(Engine::Shell(QueryEngine::new(ShellBackend::new(
                config.shell.clone(),
            )))),
            BackendKind::Synthetic => Ok(Engine::Synthetic(QueryEngine::new(
                SyntheticBackend::from_config(&config.synthetic),
            ))),
        }
    }

    /// Open a backend by name (`native`, `shell`, `synthetic` or an alias)
    pub fn open_named(name: &str, config: &ProbeConfig) -> Result<Self, EngineError> {
        let kind = name
            .parse::<BackendKind>()
            .map_err(|_| EngineError::UnknownBackend(name.to_string()))?;
        Self::open(kind, config)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "nvidia")]
            Engine::Native(engine) => engine.backend().kind(),
            Engine::Shell(engine) => engine.backend().kind(),
            Engine::Synthetic(engine) => engine.backend().kind(),
        }
    }

    pub fn device_count(&self) -> u32 {
        match self {
            #[cfg(feature = "nvidia")]
            Engine::Native(engine) => engine.backend().device_count(),
            Engine::Shell(engine) => engine.backend().device_count(),
            Engine::Synthetic(engine) => engine.backend().device_count(),
        }
    }

    pub fn query(&self, target: DeviceSelector, selection: &Selection) -> QueryDocument {
        match self {
            #[cfg(feature = "nvidia")]
            Engine::Native(engine) => engine.query(target, selection),
            Engine::Shell(engine) => engine.query(target, selection),
            Engine::Synthetic(engine) => engine.query(target, selection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_probe_types::SyntheticConfig;

    fn synthetic_config(seed: u64) -> ProbeConfig {
        ProbeConfig {
            synthetic: SyntheticConfig { seed: Some(seed) },
            ..ProbeConfig::default()
        }
    }

    #[test]
    fn test_open_synthetic() {
        let engine = Engine::open(BackendKind::Synthetic, &synthetic_config(1)).unwrap();
        assert_eq!(engine.kind(), BackendKind::Synthetic);
        assert_eq!(engine.device_count(), 3);

        let doc = engine.query(DeviceSelector::All, &Selection::from_tokens(["count"]));
        assert_eq!(doc.count, Some(3));
    }

    #[test]
    fn test_open_named_aliases() {
        let engine = Engine::open_named("sim", &synthetic_config(2)).unwrap();
        assert_eq!(engine.kind(), BackendKind::Synthetic);

        let engine = Engine::open_named("bash", &ProbeConfig::default()).unwrap();
        assert_eq!(engine.kind(), BackendKind::Shell);

        match Engine::open_named("rocm", &ProbeConfig::default()) {
            Err(EngineError::UnknownBackend(name)) => assert_eq!(name, "rocm"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("rocm backend should not exist"),
        }
    }

    #[cfg(not(feature = "nvidia"))]
    #[test]
    fn test_native_unavailable_without_feature() {
        match Engine::open(BackendKind::Native, &ProbeConfig::default()) {
            Err(e) => {
                assert_eq!(
                    e.to_string(),
                    "native backend is not available: NVML support not compiled in"
                );
            }
            Ok(_) => panic!("native backend opened without NVML support"),
        }
    }
}
