//! `seeker-hal` – hardware abstraction for the seeker sensor stack.
//!
//! The perception logic never touches a bus directly.  Each physical
//! collaborator is a trait here, so drivers can be swapped for the
//! simulated devices in [`sim`] without touching scoring or calibration
//! code.
//!
//! # Modules
//!
//! - [`camera`] – [`BlockCamera`][camera::BlockCamera]: blob-detecting camera
//!   that reports the currently visible [`Block`][seeker_types::Block]s.
//! - [`proximity`] – [`ProximitySensor`][proximity::ProximitySensor]: 10-bit
//!   analog IR range sensor.
//! - [`gyro`] – [`RateGyro`][gyro::RateGyro]: single-axis angular rate.
//! - [`magnetometer`] – [`Magnetometer`][magnetometer::Magnetometer]: raw
//!   3-axis field plus gain/config register writes, with the HMC5883 register
//!   map and [`MagGain`][magnetometer::MagGain] table.
//! - [`clock`] – [`Clock`][clock::Clock]: millisecond time source with a
//!   blocking delay, used by the bounded calibration routines.
//! - [`store`] – [`CalibrationStore`][store::CalibrationStore] with an
//!   EEPROM-style [`MemoryStore`][store::MemoryStore] and a TOML
//!   [`FileStore`][store::FileStore].
//! - [`sim`] – simulated devices for tests and headless runs.

pub mod camera;
pub mod clock;
pub mod gyro;
pub mod magnetometer;
pub mod proximity;
pub mod sim;
pub mod store;

pub use camera::BlockCamera;
pub use clock::{Clock, SystemClock};
pub use gyro::RateGyro;
pub use magnetometer::{MagGain, Magnetometer};
pub use proximity::ProximitySensor;
pub use store::{CalibrationStore, FileStore, MemoryStore};
