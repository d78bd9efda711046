//! GPU telemetry backends (NVML, nvidia-smi, synthetic)

mod native;
#[cfg(feature = "nvidia")]
mod nvml;
mod runner;
mod shell;
mod synthetic;

pub use native::{ClockDomain, DeviceLibrary, EccKind, LibraryError, MemoryBytes, NativeBackend};
#[cfg(feature = "nvidia")]
pub use nvml::NvmlLibrary;
pub use runner::{CommandOutput, CommandRunner, RunError, SystemRunner};
pub use shell::ShellBackend;
pub use synthetic::{SyntheticBackend, SYNTHETIC_DEVICE_COUNT};
