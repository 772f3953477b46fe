//! `ProximitySensor` trait for analog IR range finders.

use seeker_types::SensorError;

/// Full-scale value of the 10-bit ADC.
pub const ADC_MAX: u16 = 1023;
/// ADC reference voltage.
pub const ADC_REFERENCE_VOLTS: f32 = 5.0;

/// A short-range sensor read through a 10-bit analog input.
pub trait ProximitySensor: Send {
    /// Stable identifier, e.g. `"ir_front"`.
    fn id(&self) -> &str;

    /// Sample the analog input.  Values are `0..=1023`.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BusFault`] if the conversion fails.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Map a raw 10-bit sample linearly onto `0.0..=5.0` volts.
///
/// Values above [`ADC_MAX`] saturate at full scale.
pub fn raw_to_volts(raw: u16) -> f32 {
    f32::from(raw.min(ADC_MAX)) * ADC_REFERENCE_VOLTS / f32::from(ADC_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_endpoints() {
        assert_eq!(raw_to_volts(0), 0.0);
        assert!((raw_to_volts(1023) - 5.0).abs() < 1e-6);
        assert!((raw_to_volts(4000) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn conversion_is_linear() {
        let mid = raw_to_volts(512);
        assert!((mid - 512.0 * 5.0 / 1023.0).abs() < 1e-6);
        assert!(raw_to_volts(900) > mid);
    }
}
