//! Simulated vehicle: the device handles behind a [`SensorSuite`] and the
//! scripted scene they observe.
//!
//! The scene is a single "fish" marker that weaves across the frame while
//! the vehicle closes in on it, plus a smaller decoy high in the frame.  The
//! IR voltage rises as the fish nears the bottom of the image.  The vehicle
//! yaws at a constant rate, which both the gyro and the magnetometer see.

use std::f64::consts::TAU;

use seeker_hal::sim::{SimCamera, SimGyro, SimMagnetometer, SimProximity};
use seeker_perception::{Compass, CompassMode, Gyro, VisualSensor};
use seeker_runtime::{LoopConfig, SensorSuite};
use seeker_types::{Block, SensorError, normalize_degrees};

use crate::config::{Config, SimConfig};

const FISH_SIGNATURE: u16 = 2;
const DECOY_SIGNATURE: u16 = 3;
/// Sweep turns made during a compass calibration.
const CALIBRATION_TURNS: f32 = 2.0;

pub struct SimRig {
    pub camera: SimCamera,
    pub ir: SimProximity,
    pub gyro: SimGyro,
    pub mag: SimMagnetometer,
    turn_rate_dps: f64,
    calibration_spin: f32,
    start_heading: f64,
}

impl SimRig {
    pub fn new(sim: &SimConfig, seed: u64) -> Self {
        Self {
            camera: SimCamera::new("pixy"),
            ir: SimProximity::new("ir_front"),
            gyro: SimGyro::new("l3g", sim.gyro_bias_counts, sim.gyro_noise_counts, seed),
            mag: SimMagnetometer::new("hmc", seed.wrapping_add(1))
                .with_hard_iron(sim.hard_iron_ut)
                .with_tilt_deg(sim.mount_tilt_deg)
                .with_noise(sim.mag_noise_ut),
            turn_rate_dps: sim.turn_rate_dps,
            calibration_spin: 0.0,
            start_heading: 0.0,
        }
    }

    /// Wire the simulated devices into a fresh suite.
    pub fn build_suite(&self, cfg: &Config, loop_cfg: LoopConfig) -> Result<SensorSuite, SensorError> {
        let visual = VisualSensor::new(
            Box::new(self.camera.clone()),
            Box::new(self.ir.clone()),
            cfg.visual,
        )?;
        let gyro = Gyro::new(Box::new(self.gyro.clone()), cfg.gyro)?;
        let compass = Compass::new(Box::new(self.mag.clone()), cfg.compass)?;
        SensorSuite::new(visual, gyro, compass, loop_cfg)
    }

    /// Hold the vehicle still for the gyro and, when calibrating, spin it
    /// through the compass sweep.
    pub fn prepare_setup(&mut self, mode: CompassMode, sweep_samples: u32) {
        self.gyro.set_rate_counts(0.0);
        self.calibration_spin = match mode {
            CompassMode::Calibrate => CALIBRATION_TURNS * 360.0 / sweep_samples.max(1) as f32,
            CompassMode::Load => 0.0,
        };
        self.mag.set_spin(self.calibration_spin);
    }

    /// Stop the sweep and start the steady turn.  Call once setup succeeded.
    pub fn start_motion(&mut self, gyro_scale_dps_per_count: f64) {
        self.mag.set_spin(0.0);
        // The compass captured its reference on the last read, before the
        // spin advanced the simulated heading once more.
        self.start_heading = f64::from(self.mag.heading_deg() - self.calibration_spin);
        self.mag.set_heading_deg(self.start_heading as f32);
        self.gyro
            .set_rate_counts((self.turn_rate_dps / gyro_scale_dps_per_count) as f32);
    }

    /// Vehicle yaw relative to the start of motion, in `[0, 360)`.
    pub fn true_heading(&self, elapsed_ms: u64) -> f64 {
        normalize_degrees(self.turn_rate_dps * elapsed_ms as f64 / 1000.0)
    }

    /// Advance the scene to `elapsed_ms` after the start of motion.
    pub fn drive(&self, elapsed_ms: u64) {
        self.mag
            .set_heading_deg((self.start_heading + self.true_heading(elapsed_ms)) as f32);

        let t = elapsed_ms as f64 / 1000.0;
        let x = 160.0 + 40.0 * (TAU * t / 8.0).sin();
        let y = (100.0 + 10.0 * t).min(185.0);
        let side = 14.0 + (y - 60.0) / 4.0;
        let fish = Block::new(FISH_SIGNATURE, x as u16, y as u16, side as u16, side as u16);
        let decoy = Block::new(DECOY_SIGNATURE, 240, 35, 10, 10);
        self.camera.push_frame(vec![decoy, fish]);

        let raw = 150.0 + (y - 60.0) * 4.0;
        self.ir.set_raw(raw as u16);
    }
}
