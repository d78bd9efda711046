//! Shared constants for field results and query documents

/// Query-level error when the backend sees no devices
pub const NO_GPUS_FOUND: &str = "No NVIDIA GPUs found";

/// Error for fields a backend cannot report for this device
pub const VALUE_NOT_AVAILABLE: &str = "Value not available";

/// Error for fields a backend has no mechanism for
pub const NOT_SUPPORTED: &str = "Not Supported";

/// Output `nvidia-smi` prints for a field that does not apply
pub const NOT_APPLICABLE_SENTINEL: &str = "[N/A]";

/// Separator between sub-probe errors of a composite field
pub const COMPOSITE_ERROR_SEPARATOR: &str = "; ";

/// Bytes per mebibyte (1024 * 1024)
pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Milliwatts per watt
pub const MILLIWATTS_PER_WATT: f64 = 1000.0;
