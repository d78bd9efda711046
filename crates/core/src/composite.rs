//! Evaluation of fields built from several independent sub-probes

use crate::constants::COMPOSITE_ERROR_SEPARATOR;
use gpu_probe_types::FieldResult;
use std::fmt;

/// Accumulates sub-probe outcomes for one composite field.
///
/// Each sub-probe is evaluated on its own. Successful sub-values are written
/// into the composite value even when siblings fail; the composite as a whole
/// fails if any sub-probe failed, with every failure message joined by `"; "`.
///
/// ```
/// use gpu_probe_core::Composite;
/// use gpu_probe_types::Clocks;
///
/// let mut clocks = Composite::new(Clocks::default());
/// if let Some(mhz) = clocks.probe("SM Clock", Ok::<u32, String>(2100)) {
///     clocks.value_mut().gpu_clock_mhz = mhz;
/// }
/// clocks.probe("Memory Clock", Err::<u32, _>("Not Supported"));
///
/// let result = clocks.finish();
/// assert!(result.has_error);
/// assert_eq!(result.error, "Memory Clock: Not Supported");
/// assert_eq!(result.value.gpu_clock_mhz, 2100);
/// ```
#[derive(Debug)]
pub struct Composite<T> {
    value: T,
    errors: Vec<String>,
}

impl<T> Composite<T> {
    /// Start from the composite's empty value
    pub fn new(value: T) -> Self {
        Self {
            value,
            errors: Vec::new(),
        }
    }

    /// Record one labelled sub-probe, returning its value on success
    pub fn probe<V, E: fmt::Display>(&mut self, label: &str, result: Result<V, E>) -> Option<V> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(format!("{}: {}", label, e));
                None
            }
        }
    }

    /// Record a failure message as-is
    pub fn fail(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Produce the field result
    pub fn finish(self) -> FieldResult<T> {
        if self.errors.is_empty() {
            FieldResult::ok(self.value)
        } else {
            FieldResult::failed_with(self.value, self.errors.join(COMPOSITE_ERROR_SEPARATOR))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpu_probe_types::EccCounts;

    #[test]
    fn test_all_probes_succeed() {
        let mut ecc = Composite::new(EccCounts::default());
        if let Some(count) = ecc.probe("Corrected Errors", Ok::<u64, String>(3)) {
            ecc.value_mut().ecc_corrected_errors = count;
        }
        if let Some(count) = ecc.probe("Uncorrected Errors", Ok::<u64, String>(1)) {
            ecc.value_mut().ecc_uncorrected_errors = count;
        }

        let result = ecc.finish();
        assert_eq!(
            result,
            FieldResult::ok(EccCounts {
                ecc_corrected_errors: 3,
                ecc_uncorrected_errors: 1,
            })
        );
    }

    #[test]
    fn test_failures_are_joined() {
        let mut ecc = Composite::new(EccCounts::default());
        ecc.probe("Corrected Errors", Err::<u64, _>("Not Supported"));
        ecc.probe("Uncorrected Errors", Err::<u64, _>("Unknown Error"));

        let result = ecc.finish();
        assert!(result.has_error);
        assert_eq!(
            result.error,
            "Corrected Errors: Not Supported; Uncorrected Errors: Unknown Error"
        );
        assert_eq!(result.value, EccCounts::default());
    }

    #[test]
    fn test_unlabelled_failure() {
        let mut composite = Composite::new(0u32);
        composite.fail("Parse error: garbage");
        assert_eq!(composite.finish().error, "Parse error: garbage");
    }
}
