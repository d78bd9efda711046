//! Native backend over a device-management library (NVML)

use gpu_probe_core::constants::{BYTES_PER_MIB, MILLIWATTS_PER_WATT, VALUE_NOT_AVAILABLE};
use gpu_probe_core::{Backend, BackendKind, Composite, DeviceRef, EngineError, Registry};
use gpu_probe_types::{
    Clocks, EccCounts, Field, FieldOutput, FieldResult, MemoryUsage, ProcessEntry, Utilization,
};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Error reported by the device library
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct LibraryError(pub String);

impl LibraryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Clock domain of a clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockDomain {
    /// Streaming-multiprocessor (graphics) clock
    Sm,
    Memory,
}

/// Which ECC counter to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccKind {
    Corrected,
    Uncorrected,
}

/// Framebuffer memory in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryBytes {
    pub used: u64,
    pub total: u64,
}

/// Raw calls into a device-management library.
///
/// Devices are addressed by index; implementations resolve the index to the
/// library's own handle on each call.
pub trait DeviceLibrary: Send + Sync {
    fn device_count(&self) -> Result<u32, LibraryError>;
    /// Check that the index resolves to a device handle
    fn resolve(&self, index: u32) -> Result<(), LibraryError>;
    fn name(&self, index: u32) -> Result<String, LibraryError>;
    fn serial(&self, index: u32) -> Result<String, LibraryError>;
    fn uuid(&self, index: u32) -> Result<String, LibraryError>;
    fn vbios_version(&self, index: u32) -> Result<String, LibraryError>;
    /// System-wide driver version
    fn driver_version(&self) -> Result<String, LibraryError>;
    /// Degrees Celsius
    fn temperature(&self, index: u32) -> Result<u32, LibraryError>;
    /// Percent of maximum fan speed
    fn fan_speed(&self, index: u32) -> Result<u32, LibraryError>;
    fn minor_number(&self, index: u32) -> Result<u32, LibraryError>;
    /// Numeric P-state (0 = maximum performance)
    fn performance_state(&self, index: u32) -> Result<i32, LibraryError>;
    fn max_pcie_link_gen(&self, index: u32) -> Result<u32, LibraryError>;
    fn max_pcie_link_width(&self, index: u32) -> Result<u32, LibraryError>;
    /// Milliwatts
    fn power_usage(&self, index: u32) -> Result<u32, LibraryError>;
    /// Milliwatts
    fn power_limit(&self, index: u32) -> Result<u32, LibraryError>;
    /// MHz
    fn clock(&self, index: u32, domain: ClockDomain) -> Result<u32, LibraryError>;
    fn memory(&self, index: u32) -> Result<MemoryBytes, LibraryError>;
    fn utilization(&self, index: u32) -> Result<Utilization, LibraryError>;
    /// Volatile error count
    fn ecc_errors(&self, index: u32, kind: EccKind) -> Result<u64, LibraryError>;
    fn compute_processes(&self, index: u32) -> Result<Vec<ProcessEntry>, LibraryError>;
}

/// Backend reading from a native device library
pub struct NativeBackend<L> {
    library: L,
}

impl<L: DeviceLibrary> NativeBackend<L> {
    pub fn new(library: L) -> Self {
        Self { library }
    }

    fn clocks(&self, device: DeviceRef) -> FieldResult<Clocks> {
        let mut clocks = Composite::new(Clocks::default());
        if let Some(mhz) = clocks.probe(
            "SM Clock",
            self.library.clock(device.index, ClockDomain::Sm),
        ) {
            clocks.value_mut().gpu_clock_mhz = mhz;
        }
        if let Some(mhz) = clocks.probe(
            "Memory Clock",
            self.library.clock(device.index, ClockDomain::Memory),
        ) {
            clocks.value_mut().memory_clock_mhz = mhz;
        }
        clocks.finish()
    }

    fn memory(&self, device: DeviceRef) -> FieldResult<MemoryUsage> {
        self.library
            .memory(device.index)
            .map(|bytes| MemoryUsage {
                memory_used_mib: bytes.used / BYTES_PER_MIB,
                memory_total_mib: bytes.total / BYTES_PER_MIB,
                memory_usage_percent: percent(bytes.used as f64, bytes.total as f64),
            })
            .into()
    }

    fn ecc(&self, device: DeviceRef) -> FieldResult<EccCounts> {
        let mut ecc = Composite::new(EccCounts::default());
        if let Some(count) = ecc.probe(
            "Corrected Errors",
            self.library.ecc_errors(device.index, EccKind::Corrected),
        ) {
            ecc.value_mut().ecc_corrected_errors = count;
        }
        if let Some(count) = ecc.probe(
            "Uncorrected Errors",
            self.library.ecc_errors(device.index, EccKind::Uncorrected),
        ) {
            ecc.value_mut().ecc_uncorrected_errors = count;
        }
        ecc.finish()
    }

    fn processes(&self, device: DeviceRef) -> Vec<ProcessEntry> {
        self.library
            .compute_processes(device.index)
            .unwrap_or_else(|e| {
                log::warn!("GPU {}: failed to list compute processes: {}", device.index, e);
                Vec::new()
            })
    }
}

/// `100 * part / whole`, 0 when `whole` is 0
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        100.0 * part / whole
    } else {
        0.0
    }
}

fn watts(result: Result<u32, LibraryError>) -> FieldOutput {
    FieldResult::from(result.map(|mw| mw as f64 / MILLIWATTS_PER_WATT)).into()
}

fn scalar<T: Default + serde::Serialize, E: fmt::Display>(result: Result<T, E>) -> FieldOutput {
    FieldResult::from(result).into()
}

impl<L: DeviceLibrary + 'static> Backend for NativeBackend<L> {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn device_count(&self) -> u32 {
        self.library.device_count().unwrap_or_else(|e| {
            log::warn!("Failed to get GPU count: {}", e);
            0
        })
    }

    fn resolve(&self, index: u32) -> Result<DeviceRef, EngineError> {
        self.library
            .resolve(index)
            .map(|()| DeviceRef::new(index))
            .map_err(|e| EngineError::DeviceHandle {
                index,
                message: e.to_string(),
            })
    }

    fn register(registry: &mut Registry<Self>) {
        registry.register(Field::Name, |b, d| scalar(b.library.name(d.index)));
        registry.register(Field::Serial, |b, d| scalar(b.library.serial(d.index)));
        registry.register(Field::Uuid, |b, d| scalar(b.library.uuid(d.index)));
        registry.register(Field::Vbios, |b, d| scalar(b.library.vbios_version(d.index)));
        registry.register(Field::Driver, |b, _| scalar(b.library.driver_version()));
        registry.register(Field::Temperature, |b, d| scalar(b.library.temperature(d.index)));
        registry.register(Field::FanSpeed, |b, d| scalar(b.library.fan_speed(d.index)));
        registry.register(Field::MinorNumber, |b, d| scalar(b.library.minor_number(d.index)));
        registry.register(Field::PerformanceState, |b, d| {
            FieldResult::from_result_or(b.library.performance_state(d.index), -1).into()
        });
        registry.register(Field::PcieGeneration, |b, d| {
            scalar(b.library.max_pcie_link_gen(d.index))
        });
        registry.register(Field::PcieWidth, |b, d| {
            scalar(b.library.max_pcie_link_width(d.index))
        });
        registry.register(Field::PowerDraw, |b, d| watts(b.library.power_usage(d.index)));
        registry.register(Field::PowerLimit, |b, d| watts(b.library.power_limit(d.index)));
        registry.register(Field::Clocks, |b, d| b.clocks(d).into());
        registry.register(Field::Memory, |b, d| b.memory(d).into());
        registry.register(Field::Utilization, |b, d| scalar(b.library.utilization(d.index)));
        registry.register(Field::Ecc, |b, d| b.ecc(d).into());
        registry.register(Field::Processes, |b, d| b.processes(d).into());
        // The library has no health-check primitive
        registry.register(Field::Health, |_, _| {
            FieldResult::failed_with(Value::from(""), VALUE_NOT_AVAILABLE).into()
        });
    }
}
