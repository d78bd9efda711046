//! Backend selection and backend configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Data source a query engine reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// NVIDIA Management Library
    #[default]
    #[serde(alias = "nvml")]
    Native,
    /// `nvidia-smi` and `dcgmi` subprocesses
    #[serde(alias = "bash")]
    Shell,
    /// Simulated devices
    #[serde(alias = "sim")]
    Synthetic,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::Shell => "shell",
            BackendKind::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "nvml" => Ok(BackendKind::Native),
            "shell" | "bash" => Ok(BackendKind::Shell),
            "synthetic" | "sim" => Ok(BackendKind::Synthetic),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

fn default_smi_path() -> String {
    "nvidia-smi".to_string()
}

fn default_dcgmi_path() -> String {
    "dcgmi".to_string()
}

fn default_dcgm_host() -> String {
    "localhost".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Shell backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Path or name of the `nvidia-smi` executable
    #[serde(default = "default_smi_path")]
    pub smi_path: String,
    /// Path or name of the `dcgmi` executable used for health checks
    #[serde(default = "default_dcgmi_path")]
    pub dcgmi_path: String,
    /// Host running the DCGM host engine
    #[serde(default = "default_dcgm_host")]
    pub dcgm_host: String,
    /// Upper bound for a single subprocess invocation
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            smi_path: default_smi_path(),
            dcgmi_path: default_dcgmi_path(),
            dcgm_host: default_dcgm_host(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Synthetic backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Fixed seed for reproducible telemetry
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Top-level configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}
