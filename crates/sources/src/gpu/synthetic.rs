//! Synthetic backend producing believable, time-varying telemetry

use gpu_probe_core::constants::BYTES_PER_MIB;
use gpu_probe_core::{Backend, BackendKind, DeviceRef, Registry};
use gpu_probe_types::{
    Clocks, EccCounts, Field, FieldOutput, FieldResult, MemoryUsage, ProcessEntry, SyntheticConfig,
    Utilization,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::{Mutex, MutexGuard};

/// Number of simulated devices
pub const SYNTHETIC_DEVICE_COUNT: u32 = 3;

const DRIVER_VERSION: &str = "525.00";
const MAX_PROCESSES: usize = 5;

/// Static description of one simulated device
struct Profile {
    name: &'static str,
    uuid: &'static str,
    serial: &'static str,
    vbios: &'static str,
    temperature: f64,
    fan: f64,
    power: f64,
    power_limit: u32,
    gpu_clock: f64,
    memory_clock: f64,
    utilization: f64,
    memory_used_mib: f64,
    memory_total_mib: f64,
    minor: u32,
    pstate: i32,
    pcie_gen: u32,
    pcie_width: u32,
}

const PROFILES: [Profile; SYNTHETIC_DEVICE_COUNT as usize] = [
    Profile {
        name: "SIM-RTX4090",
        uuid: "GPU-0a1b2c3d-4e5f-6172-8192-334455667788",
        serial: "SIM123456",
        vbios: "90.00.01.00.AB",
        temperature: 45.0,
        fan: 40.0,
        power: 100.0,
        power_limit: 350,
        gpu_clock: 2100.0,
        memory_clock: 1100.0,
        utilization: 30.0,
        memory_used_mib: 3000.0,
        memory_total_mib: 24000.0,
        minor: 0,
        pstate: 0,
        pcie_gen: 4,
        pcie_width: 16,
    },
    Profile {
        name: "SIM-RTX3080",
        uuid: "GPU-1b2c3d4e-5f6a-7b8c-9d0e-112233445566",
        serial: "SIM654321",
        vbios: "90.00.02.00.CD",
        temperature: 55.0,
        fan: 60.0,
        power: 200.0,
        power_limit: 250,
        gpu_clock: 1800.0,
        memory_clock: 900.0,
        utilization: 60.0,
        memory_used_mib: 6000.0,
        memory_total_mib: 16000.0,
        minor: 1,
        pstate: 1,
        pcie_gen: 3,
        pcie_width: 8,
    },
    Profile {
        name: "SIM-GTX1060",
        uuid: "GPU-2c3d4e5f-6a7b-8c9d-0e1f-223344556677",
        serial: "SIM000001",
        vbios: "90.00.03.00.EF",
        temperature: 65.0,
        fan: 80.0,
        power: 300.0,
        power_limit: 150,
        gpu_clock: 1500.0,
        memory_clock: 700.0,
        utilization: 90.0,
        memory_used_mib: 2000.0,
        memory_total_mib: 8000.0,
        minor: 2,
        pstate: 2,
        pcie_gen: 2,
        pcie_width: 4,
    },
];

fn profile(device: DeviceRef) -> &'static Profile {
    &PROFILES[device.index as usize % PROFILES.len()]
}

/// Backend that fabricates telemetry for three simulated GPUs
///
/// Every field succeeds. Seed it for reproducible output.
pub struct SyntheticBackend {
    rng: Mutex<StdRng>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &SyntheticConfig) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        // A panic while holding the lock cannot leave the generator invalid
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `base` varied by up to `variation` of itself, never below half of it
    fn noisy(&self, base: f64, variation: f64) -> f64 {
        let factor: f64 = self.rng().gen_range(-1.0..=1.0);
        (base + base * variation * factor).max(base * 0.5)
    }

    fn memory(&self, device: DeviceRef) -> MemoryUsage<f64> {
        let profile = profile(device);
        let used = self.noisy(profile.memory_used_mib, 0.15);
        MemoryUsage {
            memory_used_mib: used,
            memory_total_mib: profile.memory_total_mib,
            memory_usage_percent: 100.0 * used / profile.memory_total_mib,
        }
    }

    fn processes(&self) -> Vec<ProcessEntry> {
        let mut rng = self.rng();
        let count = rng.gen_range(0..=MAX_PROCESSES);
        (0..count)
            .map(|_| ProcessEntry {
                pid: rng.gen_range(1000..=9999),
                gpu_memory: rng
                    .gen_bool(0.8)
                    .then(|| rng.gen_range(100..=2000u64) * BYTES_PER_MIB),
            })
            .collect()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn ok<T: serde::Serialize>(value: T) -> FieldOutput {
    FieldResult::ok(value).into()
}

impl Backend for SyntheticBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn device_count(&self) -> u32 {
        SYNTHETIC_DEVICE_COUNT
    }

    fn register(registry: &mut Registry<Self>) {
        registry.register(Field::Name, |_, d| ok(profile(d).name));
        registry.register(Field::Serial, |_, d| ok(profile(d).serial));
        registry.register(Field::Uuid, |_, d| ok(profile(d).uuid));
        registry.register(Field::Vbios, |_, d| ok(profile(d).vbios));
        registry.register(Field::Driver, |_, _| ok(DRIVER_VERSION));
        registry.register(Field::Temperature, |b, d| {
            ok(b.noisy(profile(d).temperature, 0.05))
        });
        registry.register(Field::FanSpeed, |b, d| ok(b.noisy(profile(d).fan, 0.1)));
        registry.register(Field::MinorNumber, |_, d| ok(profile(d).minor));
        registry.register(Field::PerformanceState, |_, d| ok(profile(d).pstate));
        registry.register(Field::PcieGeneration, |_, d| ok(profile(d).pcie_gen));
        registry.register(Field::PcieWidth, |_, d| ok(profile(d).pcie_width));
        registry.register(Field::PowerDraw, |b, d| ok(b.noisy(profile(d).power, 0.15)));
        registry.register(Field::PowerLimit, |_, d| ok(profile(d).power_limit));
        registry.register(Field::Clocks, |b, d| {
            let profile = profile(d);
            ok(Clocks {
                gpu_clock_mhz: b.noisy(profile.gpu_clock, 0.05),
                memory_clock_mhz: b.noisy(profile.memory_clock, 0.05),
            })
        });
        registry.register(Field::Memory, |b, d| ok(b.memory(d)));
        registry.register(Field::Utilization, |b, d| {
            let base = profile(d).utilization;
            ok(Utilization {
                gpu_utilization_percent: b.noisy(base, 0.2),
                memory_utilization_percent: b.noisy(base * 0.8, 0.2),
            })
        });
        registry.register(Field::Ecc, |_, _| ok(EccCounts::default()));
        registry.register(Field::Processes, |b, _| b.processes().into());
        registry.register(Field::Health, |_, _| {
            ok(json!({"body": {"Overall Health": {"value": "Healthy"}}}))
        });
    }
}
