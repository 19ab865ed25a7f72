//! Maps `Box<dyn Error>` from trait boundaries to typed `SpineError`.
//!
//! The traits in `spine_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `spine_hardware::HwError` downcasting.

use crate::error::SpineError;

/// Map a trait-boundary error to a typed `SpineError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SpineError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<spine_hardware::error::HwError>() {
            return match hw {
                spine_hardware::error::HwError::Timeout
                | spine_hardware::error::HwError::DataReadyTimeout => SpineError::SensorTimeout,
                other => SpineError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        SpineError::SensorTimeout
    } else {
        SpineError::Hardware(s)
    }
}
