//! `RateGyro` trait for single-axis angular rate sensors.

use seeker_types::SensorError;

/// An angular rate sensor read about the vertical (Z) axis.
pub trait RateGyro: Send {
    /// Stable identifier, e.g. `"l3g"`.
    fn id(&self) -> &str;

    /// Power the device up and select its default range.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::DeviceUnreachable`] if the device does not
    /// acknowledge.
    fn enable(&mut self) -> Result<(), SensorError>;

    /// Instantaneous Z-axis rate in raw device counts.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BusFault`] if the sample cannot be read.
    fn read_rate_z(&mut self) -> Result<i16, SensorError>;
}
