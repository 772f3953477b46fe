//! `seeker-runtime` – the control-loop side of the seeker stack.
//!
//! # Modules
//!
//! - [`suite`] – [`SensorSuite`][suite::SensorSuite]: owns the visual, gyro
//!   and compass sensors, sets them up in order and produces one
//!   [`SensorSnapshot`][suite::SensorSnapshot] per loop iteration.
//! - [`startup`] – [`StartupMonitor`][startup::StartupMonitor]: runs each
//!   blocking setup routine against a time budget and records the outcome.
//!
//! # Example
//!
//! ```rust
//! use seeker_hal::sim::{SimCamera, SimClock, SimGyro, SimMagnetometer, SimProximity};
//! use seeker_hal::{CalibrationStore, MemoryStore};
//! use seeker_perception::{Compass, CompassConfig, Gyro, GyroConfig, VisualConfig, VisualSensor};
//! use seeker_runtime::{LoopConfig, SensorSuite};
//! use seeker_types::CompassCalibration;
//!
//! let visual = VisualSensor::new(
//!     Box::new(SimCamera::new("pixy")),
//!     Box::new(SimProximity::new("ir_front")),
//!     VisualConfig::default(),
//! )
//! .unwrap();
//! let gyro = Gyro::new(Box::new(SimGyro::new("l3g", 4.0, 1.0, 1)), GyroConfig::default()).unwrap();
//! let compass = Compass::new(Box::new(SimMagnetometer::new("hmc", 1)), CompassConfig::default()).unwrap();
//! let mut suite = SensorSuite::new(visual, gyro, compass, LoopConfig::default()).unwrap();
//!
//! let mut store = MemoryStore::new();
//! store.save_compass(&CompassCalibration::identity()).unwrap();
//! let mut clock = SimClock::new(0);
//! suite.setup(&mut store, &mut clock).unwrap();
//!
//! let snapshot = suite.tick(1_020);
//! assert!(snapshot.target.is_none());
//! assert!((0.0..360.0).contains(&snapshot.gyro_heading));
//! ```

pub mod startup;
pub mod suite;

pub use startup::{ComponentStartup, StartupMonitor, StartupStatus};
pub use suite::{LoopConfig, SensorSnapshot, SensorSuite};
