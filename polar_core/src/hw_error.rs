//! Maps `Box<dyn Error>` from trait boundaries to typed `PolarError`.
//!
//! The traits in `polar_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `polar_hardware::HwError` downcasting.

use crate::error::PolarError;

/// Map a sensor-read error to a typed `PolarError`.
///
/// Known hardware error types are downcast first, then string heuristics apply.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PolarError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<polar_hardware::error::HwError>() {
            return match hw {
                polar_hardware::error::HwError::Timeout
                | polar_hardware::error::HwError::DataReadyTimeout => PolarError::Timeout,
                other => PolarError::SensorUnavailable(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        PolarError::Timeout
    } else {
        PolarError::SensorUnavailable(s)
    }
}

/// Map an actuator error; these never mean a sensor is missing.
pub fn map_actuator_error(e: &(dyn std::error::Error + 'static)) -> PolarError {
    PolarError::Hardware(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_strings_map_to_timeout() {
        let e: Box<dyn std::error::Error + Send + Sync> = "probe Timeout".into();
        assert_eq!(map_hw_error(&*e), PolarError::Timeout);
    }

    #[test]
    fn other_strings_map_to_unavailable() {
        let e: Box<dyn std::error::Error + Send + Sync> = "i2c nack".into();
        assert_eq!(
            map_hw_error(&*e),
            PolarError::SensorUnavailable("i2c nack".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hardware_errors_are_downcast() {
        use polar_hardware::error::HwError;
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::DataReadyTimeout);
        assert_eq!(map_hw_error(&*e), PolarError::Timeout);
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::ProbeFlag(0x8001));
        assert!(matches!(map_hw_error(&*e), PolarError::SensorUnavailable(_)));
    }
}
