//! `seeker-perception` – targeting and heading logic.
//!
//! Turns raw camera blocks, IR voltages, gyro rates and magnetometer
//! vectors into the handful of signals a steering loop consumes: the best
//! target block, whether an obstacle is close, and two headings in
//! `[0, 360)`.
//!
//! Every sensor here is polled from a single control-loop thread: call
//! `update(now_ms)` once per iteration, then read the outputs.  Reads made
//! before the first update return neutral values (`Block::BAD`, `false`,
//! `0.0`).
//!
//! # Modules
//!
//! - [`visual`] – [`VisualSensor`][visual::VisualSensor]: block scoring and
//!   selection, stall tracking, signature voting and IR proximity state.
//! - [`proximity`] – [`ProximityFilter`][proximity::ProximityFilter]: rolling
//!   average, stability run-length and change latch for the IR sensor.
//! - [`histogram`] – [`SignatureHistogram`][histogram::SignatureHistogram]:
//!   per-signature sighting counts.
//! - [`gyro`] – [`Gyro`][gyro::Gyro]: bias self-calibration and rate
//!   integration.
//! - [`compass`] – [`Compass`][compass::Compass]: hard-iron centre and
//!   mounting rotation calibration, heading conversion.
//! - [`math`] – small fixed-size [`Vec3`][math::Vec3] /
//!   [`Mat3`][math::Mat3] helpers.

pub mod compass;
pub mod gyro;
pub mod histogram;
pub mod math;
pub mod proximity;
pub mod visual;

pub use compass::{Compass, CompassConfig, CompassMode, CompassPhase};
pub use gyro::{Gyro, GyroCalibration, GyroConfig, GyroPhase};
pub use histogram::SignatureHistogram;
pub use proximity::ProximityFilter;
pub use visual::{BlockScoreWeights, VisualConfig, VisualSensor};
