//! Uniform per-field results and the composite values they carry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome of retrieving one field from one device.
///
/// A successful result always has an empty `error`. A failed result carries
/// the field's empty value (`T::default()` unless the caller supplies one)
/// and a message describing the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult<T> {
    pub value: T,
    pub has_error: bool,
    pub error: String,
}

impl<T> FieldResult<T> {
    /// Successful result
    pub fn ok(value: T) -> Self {
        Self {
            value,
            has_error: false,
            error: String::new(),
        }
    }

    /// Failed result carrying an explicit value
    pub fn failed_with(value: T, error: impl Into<String>) -> Self {
        Self {
            value,
            has_error: true,
            error: error.into(),
        }
    }

    /// Convert a fallible probe, substituting `empty` on failure
    pub fn from_result_or<E: fmt::Display>(result: Result<T, E>, empty: T) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failed_with(empty, e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.has_error
    }
}

impl<T: Default> FieldResult<T> {
    /// Failed result carrying the type's empty value
    pub fn failed(error: impl Into<String>) -> Self {
        Self::failed_with(T::default(), error)
    }
}

impl<T: Default, E: fmt::Display> From<Result<T, E>> for FieldResult<T> {
    fn from(result: Result<T, E>) -> Self {
        Self::from_result_or(result, T::default())
    }
}

impl<T: Serialize> FieldResult<T> {
    /// Erase the value type for inclusion in a query document
    pub fn into_json(self) -> FieldResult<Value> {
        match serde_json::to_value(&self.value) {
            Ok(value) => FieldResult {
                value,
                has_error: self.has_error,
                error: self.error,
            },
            Err(e) => FieldResult::failed_with(Value::Null, format!("Serialization error: {}", e)),
        }
    }
}

/// Graphics and memory clock pair in MHz
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Clocks<T = u32> {
    pub gpu_clock_mhz: T,
    pub memory_clock_mhz: T,
}

/// Framebuffer usage in MiB
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage<T = u64> {
    pub memory_used_mib: T,
    pub memory_total_mib: T,
    pub memory_usage_percent: f64,
}

/// GPU and memory-controller utilization in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Utilization<T = u32> {
    pub gpu_utilization_percent: T,
    pub memory_utilization_percent: T,
}

/// Volatile ECC error counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccCounts {
    pub ecc_corrected_errors: u64,
    pub ecc_uncorrected_errors: u64,
}

/// A compute process holding GPU memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Bytes of GPU memory, `None` when the driver cannot report it
    pub gpu_memory: Option<u64>,
}

/// What a field handler produces.
///
/// Everything is a [`FieldResult`] except the process list, which collaborators
/// consume as a bare sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOutput {
    Reading(FieldResult<Value>),
    Processes(Vec<ProcessEntry>),
}

impl FieldOutput {
    pub fn reading(&self) -> Option<&FieldResult<Value>> {
        match self {
            FieldOutput::Reading(result) => Some(result),
            FieldOutput::Processes(_) => None,
        }
    }

    pub fn processes(&self) -> Option<&[ProcessEntry]> {
        match self {
            FieldOutput::Reading(_) => None,
            FieldOutput::Processes(list) => Some(list),
        }
    }

    /// True if this output reports a failure
    pub fn has_error(&self) -> bool {
        self.reading().map(|r| r.has_error).unwrap_or(false)
    }
}

impl<T: Serialize> From<FieldResult<T>> for FieldOutput {
    fn from(result: FieldResult<T>) -> Self {
        FieldOutput::Reading(result.into_json())
    }
}

impl From<Vec<ProcessEntry>> for FieldOutput {
    fn from(list: Vec<ProcessEntry>) -> Self {
        FieldOutput::Processes(list)
    }
}
