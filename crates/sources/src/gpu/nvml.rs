//! NVML device library using nvml-wrapper

use super::native::{ClockDomain, DeviceLibrary, EccKind, LibraryError, MemoryBytes};
use gpu_probe_types::{ProcessEntry, Utilization};
use nvml_wrapper::enum_wrappers::device::{
    Clock, EccCounter, MemoryError, PerformanceState, TemperatureSensor,
};
use nvml_wrapper::enums::device::UsedGpuMemory;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};

impl From<NvmlError> for LibraryError {
    fn from(e: NvmlError) -> Self {
        LibraryError(e.to_string())
    }
}

/// Initialized NVML session
///
/// NVML is shut down when this value is dropped.
pub struct NvmlLibrary {
    nvml: Nvml,
}

impl NvmlLibrary {
    pub fn init() -> Result<Self, LibraryError> {
        let nvml = Nvml::init()?;
        log::info!("NVML initialized");
        Ok(Self { nvml })
    }

    fn device(&self, index: u32) -> Result<Device<'_>, LibraryError> {
        Ok(self.nvml.device_by_index(index)?)
    }
}

impl Drop for NvmlLibrary {
    fn drop(&mut self) {
        log::debug!("Shutting down NVML");
    }
}

fn pstate_number(state: PerformanceState) -> i32 {
    match state {
        PerformanceState::Zero => 0,
        PerformanceState::One => 1,
        PerformanceState::Two => 2,
        PerformanceState::Three => 3,
        PerformanceState::Four => 4,
        PerformanceState::Five => 5,
        PerformanceState::Six => 6,
        PerformanceState::Seven => 7,
        PerformanceState::Eight => 8,
        PerformanceState::Nine => 9,
        PerformanceState::Ten => 10,
        PerformanceState::Eleven => 11,
        PerformanceState::Twelve => 12,
        PerformanceState::Thirteen => 13,
        PerformanceState::Fourteen => 14,
        PerformanceState::Fifteen => 15,
        // NVML_PSTATE_UNKNOWN
        PerformanceState::Unknown => 32,
    }
}

impl DeviceLibrary for NvmlLibrary {
    fn device_count(&self) -> Result<u32, LibraryError> {
        Ok(self.nvml.device_count()?)
    }

    fn resolve(&self, index: u32) -> Result<(), LibraryError> {
        self.device(index).map(|_| ())
    }

    fn name(&self, index: u32) -> Result<String, LibraryError> {
        Ok(self.device(index)?.name()?)
    }

    fn serial(&self, index: u32) -> Result<String, LibraryError> {
        Ok(self.device(index)?.serial()?)
    }

    fn uuid(&self, index: u32) -> Result<String, LibraryError> {
        Ok(self.device(index)?.uuid()?)
    }

    fn vbios_version(&self, index: u32) -> Result<String, LibraryError> {
        Ok(self.device(index)?.vbios_version()?)
    }

    fn driver_version(&self) -> Result<String, LibraryError> {
        Ok(self.nvml.sys_driver_version()?)
    }

    fn temperature(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.temperature(TemperatureSensor::Gpu)?)
    }

    fn fan_speed(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.fan_speed(0)?)
    }

    #[cfg(target_os = "linux")]
    fn minor_number(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.minor_number()?)
    }

    // NVML only exposes device minor numbers on Linux
    #[cfg(not(target_os = "linux"))]
    fn minor_number(&self, _index: u32) -> Result<u32, LibraryError> {
        Err(LibraryError::new(gpu_probe_core::constants::NOT_SUPPORTED))
    }

    fn performance_state(&self, index: u32) -> Result<i32, LibraryError> {
        Ok(pstate_number(self.device(index)?.performance_state()?))
    }

    fn max_pcie_link_gen(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.max_pcie_link_gen()?)
    }

    fn max_pcie_link_width(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.max_pcie_link_width()?)
    }

    fn power_usage(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.power_usage()?)
    }

    fn power_limit(&self, index: u32) -> Result<u32, LibraryError> {
        Ok(self.device(index)?.power_management_limit()?)
    }

    fn clock(&self, index: u32, domain: ClockDomain) -> Result<u32, LibraryError> {
        let clock = match domain {
            ClockDomain::Sm => Clock::SM,
            ClockDomain::Memory => Clock::Memory,
        };
        Ok(self.device(index)?.clock_info(clock)?)
    }

    fn memory(&self, index: u32) -> Result<MemoryBytes, LibraryError> {
        let info = self.device(index)?.memory_info()?;
        Ok(MemoryBytes {
            used: info.used,
            total: info.total,
        })
    }

    fn utilization(&self, index: u32) -> Result<Utilization, LibraryError> {
        let rates = self.device(index)?.utilization_rates()?;
        Ok(Utilization {
            gpu_utilization_percent: rates.gpu,
            memory_utilization_percent: rates.memory,
        })
    }

    fn ecc_errors(&self, index: u32, kind: EccKind) -> Result<u64, LibraryError> {
        let error_type = match kind {
            EccKind::Corrected => MemoryError::Corrected,
            EccKind::Uncorrected => MemoryError::Uncorrected,
        };
        Ok(self
            .device(index)?
            .total_ecc_errors(error_type, EccCounter::Volatile)?)
    }

    fn compute_processes(&self, index: u32) -> Result<Vec<ProcessEntry>, LibraryError> {
        let processes = self.device(index)?.running_compute_processes()?;
        Ok(processes
            .into_iter()
            .map(|p| ProcessEntry {
                pid: p.pid,
                gpu_memory: match p.used_gpu_memory {
                    UsedGpuMemory::Used(bytes) => Some(bytes),
                    UsedGpuMemory::Unavailable => None,
                },
            })
            .collect())
    }
}
