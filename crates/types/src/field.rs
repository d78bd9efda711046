//! The fixed field vocabulary shared by every backend and collaborator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One independently queryable telemetry attribute of a device.
///
/// The serialized form is the key used inside a query document
/// (`"temp"`, `"mem"`, ...), which collaborators depend on. The command-line
/// token is the longer, descriptive name (see [`Field::token`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Field {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "serial")]
    Serial,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "vbios")]
    Vbios,
    #[serde(rename = "driver")]
    Driver,
    #[serde(rename = "temp")]
    Temperature,
    #[serde(rename = "fan")]
    FanSpeed,
    #[serde(rename = "minor")]
    MinorNumber,
    #[serde(rename = "pstate")]
    PerformanceState,
    #[serde(rename = "pciegen")]
    PcieGeneration,
    #[serde(rename = "pciewidth")]
    PcieWidth,
    #[serde(rename = "power")]
    PowerDraw,
    #[serde(rename = "plimit")]
    PowerLimit,
    #[serde(rename = "clocks")]
    Clocks,
    #[serde(rename = "mem")]
    Memory,
    #[serde(rename = "util")]
    Utilization,
    #[serde(rename = "ecc")]
    Ecc,
    #[serde(rename = "processes")]
    Processes,
    #[serde(rename = "health")]
    Health,
}

impl Field {
    /// Every field, in document order
    pub const ALL: [Field; 19] = [
        Field::Name,
        Field::Serial,
        Field::Uuid,
        Field::Vbios,
        Field::Driver,
        Field::Temperature,
        Field::FanSpeed,
        Field::MinorNumber,
        Field::PerformanceState,
        Field::PcieGeneration,
        Field::PcieWidth,
        Field::PowerDraw,
        Field::PowerLimit,
        Field::Clocks,
        Field::Memory,
        Field::Utilization,
        Field::Ecc,
        Field::Processes,
        Field::Health,
    ];

    /// Key of this field inside a device report
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Serial => "serial",
            Field::Uuid => "uuid",
            Field::Vbios => "vbios",
            Field::Driver => "driver",
            Field::Temperature => "temp",
            Field::FanSpeed => "fan",
            Field::MinorNumber => "minor",
            Field::PerformanceState => "pstate",
            Field::PcieGeneration => "pciegen",
            Field::PcieWidth => "pciewidth",
            Field::PowerDraw => "power",
            Field::PowerLimit => "plimit",
            Field::Clocks => "clocks",
            Field::Memory => "mem",
            Field::Utilization => "util",
            Field::Ecc => "ecc",
            Field::Processes => "processes",
            Field::Health => "health",
        }
    }

    /// Token used to request this field
    pub fn token(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Serial => "serial",
            Field::Uuid => "uuid",
            Field::Vbios => "vbios",
            Field::Driver => "driver",
            Field::Temperature => "temperature",
            Field::FanSpeed => "fan",
            Field::MinorNumber => "minor-number",
            Field::PerformanceState => "performance-state",
            Field::PcieGeneration => "pcie-generation",
            Field::PcieWidth => "pcie-width",
            Field::PowerDraw => "power",
            Field::PowerLimit => "power-limit",
            Field::Clocks => "clocks",
            Field::Memory => "memory",
            Field::Utilization => "utilization",
            Field::Ecc => "ecc",
            Field::Processes => "processes",
            Field::Health => "health",
        }
    }

    /// Short human-readable description, used in usage output
    pub fn description(self) -> &'static str {
        match self {
            Field::Name => "GPU name",
            Field::Serial => "Serial number",
            Field::Uuid => "GPU UUID",
            Field::Vbios => "VBIOS version",
            Field::Driver => "Driver version",
            Field::Temperature => "GPU temperature",
            Field::FanSpeed => "Fan speed",
            Field::MinorNumber => "Minor number",
            Field::PerformanceState => "Performance state",
            Field::PcieGeneration => "Max PCIe generation",
            Field::PcieWidth => "Max PCIe link width",
            Field::PowerDraw => "Power usage",
            Field::PowerLimit => "Power limit",
            Field::Clocks => "GPU and memory clocks",
            Field::Memory => "Memory usage",
            Field::Utilization => "GPU and memory utilization",
            Field::Ecc => "ECC error counts",
            Field::Processes => "Processes using the GPU",
            Field::Health => "GPU health status",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    /// Accepts the token, the document key, and the legacy `procs` alias,
    /// with or without a leading `--`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches("--").to_ascii_lowercase();
        if name == "procs" {
            return Ok(Field::Processes);
        }
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.token() == name || field.key() == name)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}
