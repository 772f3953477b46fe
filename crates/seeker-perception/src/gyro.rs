//! Rate-gyro heading integration with zero-rate bias calibration.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──setup()──► Calibrating ──ok──► Ready
//!        ▲                        │
//!        └──────── rejected ──────┘
//! ```
//!
//! [`Gyro::setup`] samples the stationary device, estimates the zero-rate
//! bias (mean) and its variance, and refuses to become ready when the
//! variance shows the vehicle was moving.  Once ready, every
//! [`Gyro::update`] integrates `(raw - bias) · scale · dt` into the running
//! angle.  The heading is that angle relative to where it stood at the end
//! of setup, folded into `[0, 360)`.
//!
//! Drift is not corrected: the integral accumulates whatever bias error the
//! calibration left behind.

use seeker_hal::{Clock, RateGyro};
use seeker_types::{SensorError, normalize_degrees};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tuning for [`Gyro`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GyroConfig {
    /// Degrees per second per raw count (0.00875 for a ±250 dps part).
    pub scale_factor_z: f64,
    /// Samples taken during calibration.
    pub calibration_samples: u32,
    /// Delay between calibration samples.
    pub sample_interval_ms: u64,
    /// Largest acceptable bias variance, in counts².
    pub max_bias_variance: f64,
    /// Cap on a single integration step.
    pub max_step_ms: u64,
    /// Expected control-loop period, used for `average_timed_bias`.
    pub nominal_period_ms: u64,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            scale_factor_z: 0.00875,
            calibration_samples: 200,
            sample_interval_ms: 5,
            max_bias_variance: 100.0,
            max_step_ms: 100,
            nominal_period_ms: 10,
        }
    }
}

impl GyroConfig {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] for a non-positive scale, an
    /// empty calibration window or a zero step cap.
    pub fn validate(&self) -> Result<(), SensorError> {
        if !(self.scale_factor_z.is_finite() && self.scale_factor_z > 0.0) {
            return Err(SensorError::InvalidConfig(
                "gyro: scale_factor_z must be positive".to_string(),
            ));
        }
        if self.calibration_samples == 0 {
            return Err(SensorError::InvalidConfig(
                "gyro: calibration_samples must be at least 1".to_string(),
            ));
        }
        if self.max_step_ms == 0 {
            return Err(SensorError::InvalidConfig(
                "gyro: max_step_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful bias calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroCalibration {
    /// Mean raw rate while stationary, in counts.
    pub average_bias_z: f64,
    /// Variance of the raw rate while stationary, in counts².
    pub sigma_z: f64,
    /// Bias expressed as degrees accumulated per nominal loop period.
    pub average_timed_bias: f64,
}

/// Externally visible lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GyroPhase {
    Uninitialized,
    Calibrating,
    Ready,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Uninitialized,
    Calibrating,
    Ready {
        calibration: GyroCalibration,
        previous_ms: u64,
    },
}

/// Streaming mean/variance (Welford).
#[derive(Debug, Default)]
struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / f64::from(self.count);
        self.m2 += delta * (x - self.mean);
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / f64::from(self.count)
        }
    }
}

/// Single-axis gyro heading.
pub struct Gyro {
    device: Box<dyn RateGyro>,
    config: GyroConfig,
    state: State,
    angle_z: f64,
    offset_angle: f64,
}

impl Gyro {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] if `config` fails validation.
    pub fn new(device: Box<dyn RateGyro>, config: GyroConfig) -> Result<Self, SensorError> {
        config.validate()?;
        Ok(Self {
            device,
            config,
            state: State::Uninitialized,
            angle_z: 0.0,
            offset_angle: 0.0,
        })
    }

    pub fn config(&self) -> &GyroConfig {
        &self.config
    }

    pub fn phase(&self) -> GyroPhase {
        match self.state {
            State::Uninitialized => GyroPhase::Uninitialized,
            State::Calibrating => GyroPhase::Calibrating,
            State::Ready { .. } => GyroPhase::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    /// Bias estimate from the last successful [`setup`][Self::setup].
    pub fn calibration(&self) -> Option<GyroCalibration> {
        match self.state {
            State::Ready { calibration, .. } => Some(calibration),
            _ => None,
        }
    }

    /// Enable the device and estimate its zero-rate bias.  The vehicle must
    /// stay still for `calibration_samples × sample_interval_ms`.
    ///
    /// On success the current angle becomes the zero heading.  Calling this
    /// again recalibrates from scratch.
    ///
    /// # Errors
    ///
    /// - [`SensorError::DeviceUnreachable`] if the device cannot be enabled.
    /// - [`SensorError::CalibrationRejected`] if fewer than half the samples
    ///   could be read, or the variance exceeds `max_bias_variance`.
    pub fn setup(&mut self, clock: &mut dyn Clock) -> Result<(), SensorError> {
        self.state = State::Calibrating;
        let result = self.calibrate(clock);
        match result {
            Ok(calibration) => {
                self.offset_angle = self.angle_z;
                self.state = State::Ready {
                    calibration,
                    previous_ms: clock.now_ms(),
                };
                info!(
                    device = self.device.id(),
                    bias = calibration.average_bias_z,
                    variance = calibration.sigma_z,
                    "gyro calibrated"
                );
                Ok(())
            }
            Err(e) => {
                self.state = State::Uninitialized;
                warn!(device = self.device.id(), error = %e, "gyro setup failed");
                Err(e)
            }
        }
    }

    fn calibrate(&mut self, clock: &mut dyn Clock) -> Result<GyroCalibration, SensorError> {
        self.device.enable()?;

        let wanted = self.config.calibration_samples;
        let mut stats = RunningStats::default();
        for i in 0..wanted {
            match self.device.read_rate_z() {
                Ok(raw) => stats.push(f64::from(raw)),
                Err(e) => debug!(device = self.device.id(), sample = i, error = %e, "calibration sample lost"),
            }
            clock.delay_ms(self.config.sample_interval_ms);
        }

        if stats.count * 2 < wanted {
            return Err(SensorError::CalibrationRejected {
                component: "gyro".to_string(),
                reason: format!("only {} of {wanted} samples readable", stats.count),
            });
        }
        let variance = stats.variance();
        if variance > self.config.max_bias_variance {
            return Err(SensorError::CalibrationRejected {
                component: "gyro".to_string(),
                reason: format!(
                    "bias variance {variance:.2} exceeds {:.2}; vehicle moved during calibration",
                    self.config.max_bias_variance
                ),
            });
        }

        let nominal_s = self.config.nominal_period_ms as f64 / 1000.0;
        Ok(GyroCalibration {
            average_bias_z: stats.mean,
            sigma_z: variance,
            average_timed_bias: stats.mean * self.config.scale_factor_z * nominal_s,
        })
    }

    /// Integrate one rate sample.  No effect until ready.  A failed read
    /// leaves the angle and the previous timestamp untouched, so the next
    /// successful read covers the gap (up to `max_step_ms`).
    pub fn update(&mut self, now_ms: u64) {
        let State::Ready {
            calibration,
            previous_ms,
        } = self.state
        else {
            return;
        };

        let raw = match self.device.read_rate_z() {
            Ok(raw) => raw,
            Err(e) => {
                debug!(device = self.device.id(), error = %e, "gyro read skipped");
                return;
            }
        };

        let elapsed_ms = now_ms.saturating_sub(previous_ms).min(self.config.max_step_ms);
        let dt = elapsed_ms as f64 / 1000.0;
        self.angle_z += (f64::from(raw) - calibration.average_bias_z) * self.config.scale_factor_z * dt;
        self.state = State::Ready {
            calibration,
            previous_ms: now_ms,
        };
    }

    /// Heading relative to the end of setup, in `[0, 360)`.  `0.0` before
    /// the gyro is ready.
    pub fn get_degrees(&self) -> f64 {
        if !self.is_ready() {
            return 0.0;
        }
        normalize_degrees(self.angle_z - self.offset_angle)
    }

    /// Make the current heading read as zero.
    pub fn zero_heading(&mut self) {
        self.offset_angle = self.angle_z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_hal::sim::{SimClock, SimGyro};

    fn gyro(device: &SimGyro, config: GyroConfig) -> Gyro {
        Gyro::new(Box::new(device.clone()), config).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 1);
        let config = GyroConfig {
            scale_factor_z: 0.0,
            ..GyroConfig::default()
        };
        assert!(matches!(
            Gyro::new(Box::new(device), config),
            Err(SensorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn reads_zero_before_setup() {
        let device = SimGyro::new("l3g", 5.0, 0.0, 1);
        let mut g = gyro(&device, GyroConfig::default());
        device.set_rate_counts(1000.0);
        g.update(50);
        assert_eq!(g.phase(), GyroPhase::Uninitialized);
        assert_eq!(g.get_degrees(), 0.0);
        assert!(g.calibration().is_none());
    }

    #[test]
    fn bias_estimate_converges_to_injected_offset() {
        let device = SimGyro::new("l3g", 12.0, 2.0, 42);
        let mut g = gyro(
            &device,
            GyroConfig {
                calibration_samples: 500,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();

        let cal = g.calibration().unwrap();
        assert!((cal.average_bias_z - 12.0).abs() < 0.5, "bias {}", cal.average_bias_z);
        assert!(cal.sigma_z > 1.0 && cal.sigma_z < 10.0, "variance {}", cal.sigma_z);
        assert!((cal.average_timed_bias - cal.average_bias_z * 0.00875 * 0.01).abs() < 1e-12);
        // 500 samples at 5 ms.
        assert_eq!(clock.now_ms(), 2500);
        assert_eq!(g.phase(), GyroPhase::Ready);
    }

    #[test]
    fn stationary_device_holds_heading_after_bias_removal() {
        let device = SimGyro::new("l3g", 30.0, 0.0, 7);
        let mut g = gyro(&device, GyroConfig::default());
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();
        let start = clock.now_ms();
        for step in 1..=100 {
            g.update(start + step * 10);
        }
        assert!(g.get_degrees() < 1e-9);
    }

    #[test]
    fn noisy_device_is_rejected() {
        let device = SimGyro::new("l3g", 0.0, 25.0, 3);
        let mut g = gyro(&device, GyroConfig::default());
        let mut clock = SimClock::new(0);
        assert!(matches!(
            g.setup(&mut clock),
            Err(SensorError::CalibrationRejected { .. })
        ));
        assert_eq!(g.phase(), GyroPhase::Uninitialized);
    }

    #[test]
    fn unreachable_device_fails_setup() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 3);
        device.set_unreachable(true);
        let mut g = gyro(&device, GyroConfig::default());
        assert!(matches!(
            g.setup(&mut SimClock::new(0)),
            Err(SensorError::DeviceUnreachable { .. })
        ));
        assert!(!g.is_ready());
    }

    #[test]
    fn accumulated_angle_wraps_into_range() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 9);
        let mut g = gyro(
            &device,
            GyroConfig {
                scale_factor_z: 1.0,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();

        // 145 dps for 5 s = 725 degrees.
        device.set_rate_counts(145.0);
        let start = clock.now_ms();
        for step in 1..=50 {
            g.update(start + step * 100);
        }
        assert!((g.get_degrees() - 5.0).abs() < 1e-6, "heading {}", g.get_degrees());
    }

    #[test]
    fn negative_rotation_stays_in_range() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 9);
        let mut g = gyro(
            &device,
            GyroConfig {
                scale_factor_z: 1.0,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();
        device.set_rate_counts(-100.0);
        let start = clock.now_ms();
        for step in 1..=3 {
            g.update(start + step * 100);
            let deg = g.get_degrees();
            assert!((0.0..360.0).contains(&deg));
        }
        assert!((g.get_degrees() - 330.0).abs() < 1e-6);
    }

    #[test]
    fn long_gap_is_clamped() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 9);
        let mut g = gyro(
            &device,
            GyroConfig {
                scale_factor_z: 1.0,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();
        device.set_rate_counts(100.0);
        // A 10 s stall integrates as one 100 ms step.
        g.update(clock.now_ms() + 10_000);
        assert!((g.get_degrees() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn zero_heading_recaptures_offset() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 9);
        let mut g = gyro(
            &device,
            GyroConfig {
                scale_factor_z: 1.0,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();
        device.set_rate_counts(200.0);
        g.update(clock.now_ms() + 100);
        assert!((g.get_degrees() - 20.0).abs() < 1e-6);
        g.zero_heading();
        assert_eq!(g.get_degrees(), 0.0);
    }

    #[test]
    fn failed_read_does_not_advance_timestamp() {
        let device = SimGyro::new("l3g", 0.0, 0.0, 9);
        let mut g = gyro(
            &device,
            GyroConfig {
                scale_factor_z: 1.0,
                ..GyroConfig::default()
            },
        );
        let mut clock = SimClock::new(0);
        g.setup(&mut clock).unwrap();
        let start = clock.now_ms();
        device.set_rate_counts(100.0);

        device.set_unreachable(true);
        g.update(start + 50);
        device.set_unreachable(false);
        g.update(start + 100);
        // The successful read covers the full 100 ms.
        assert!((g.get_degrees() - 10.0).abs() < 1e-6);
    }
}
