//! Magnetometer heading with hard-iron and mounting-rotation correction.
//!
//! # Lifecycle
//!
//! ```text
//!                    ┌─ Calibrate ─► Calibrating ─┐
//! Uninitialized ─────┤                            ├──► Ready
//!                    └─ Load ──────► Loading ─────┘
//! ```
//!
//! Either branch ends in a [`CompassCalibration`]: a centre vector that
//! removes constant offsets, and a rotation that levels the plane the field
//! sweeps while the vehicle turns.  The corrected field is
//! `rotation · (raw − center)`.
//!
//! # Calibration sweep
//!
//! While the vehicle turns through at least one full revolution the field
//! vector traces a circle.  The centre is the per-axis midpoint of min/max.
//! The circle's plane normal is accumulated without storing samples: for
//! consecutive readings `aᵢ`, `Σ (aᵢ − c) × (aᵢ₊₁ − c)` expands to
//! `Σ aᵢ × aᵢ₊₁ + (a_last − a_first) × c`, so only the running cross-product
//! sum, the first and the last reading are kept until `c` is known.  The
//! rotation carrying that normal onto +Z is built with Rodrigues' formula and
//! is orthonormal by construction.
//!
//! # Heading
//!
//! `atan2(y, x)` of the corrected vector, plus the magnetic declination,
//! folded into `[0, 360)`, then expressed relative to the heading captured
//! when the compass became ready.

use std::f64::consts::PI;

use seeker_hal::magnetometer::{GAUSS_TO_MICROTESLA, registers};
use seeker_hal::{CalibrationStore, Clock, MagGain, Magnetometer};
use seeker_types::{CompassCalibration, SensorError, normalize_degrees};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::math::{Mat3, Vec3, apply_calibration};

const COMPONENT: &str = "compass";

/// Tuning for [`Compass`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompassConfig {
    pub gain: MagGain,
    /// Local magnetic declination in radians (east positive).
    pub declination_rad: f64,
    /// Readings taken during the calibration sweep.
    pub calibration_samples: u32,
    pub sample_interval_ms: u64,
    /// Minimum field span on the X and Y axes for a sweep to count as a full
    /// turn, in microtesla.
    pub min_axis_span_ut: f64,
    /// Allowed deviation of `R·Rᵀ` from identity for a loaded rotation.
    pub orthonormal_tolerance: f32,
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            gain: MagGain::default(),
            declination_rad: 0.069522276053,
            calibration_samples: 400,
            sample_interval_ms: 25,
            min_axis_span_ut: 10.0,
            orthonormal_tolerance: 1e-3,
        }
    }
}

impl CompassConfig {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] when the sweep is too short to
    /// fit a plane or a threshold is not a usable number.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.calibration_samples < 3 {
            return Err(SensorError::InvalidConfig(
                "compass: calibration_samples must be at least 3".to_string(),
            ));
        }
        if !self.declination_rad.is_finite() || !self.min_axis_span_ut.is_finite() {
            return Err(SensorError::InvalidConfig(
                "compass: declination and span must be finite".to_string(),
            ));
        }
        if self.orthonormal_tolerance.is_nan() || self.orthonormal_tolerance <= 0.0 {
            return Err(SensorError::InvalidConfig(
                "compass: orthonormal_tolerance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the calibration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompassMode {
    /// Run the sweep and persist the result.
    Calibrate,
    /// Use the record in the calibration store.
    Load,
}

/// Externally visible lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompassPhase {
    Uninitialized,
    Calibrating,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Uninitialized,
    Calibrating,
    Loading,
    Ready {
        calibration: CompassCalibration,
        initial_heading: f64,
    },
}

/// Running min/max and plane-normal accumulator for the calibration sweep.
#[derive(Debug, Default)]
struct SweepFit {
    count: u32,
    min: Vec3,
    max: Vec3,
    cross_sum: Vec3,
    first: Vec3,
    last: Vec3,
}

impl SweepFit {
    fn push(&mut self, v: Vec3) {
        if self.count == 0 {
            self.min = v;
            self.max = v;
            self.first = v;
        } else {
            self.min = Vec3::new(self.min.x.min(v.x), self.min.y.min(v.y), self.min.z.min(v.z));
            self.max = Vec3::new(self.max.x.max(v.x), self.max.y.max(v.y), self.max.z.max(v.z));
            self.cross_sum = self.cross_sum + self.last.cross(v);
        }
        self.last = v;
        self.count += 1;
    }

    fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    fn span(&self) -> Vec3 {
        self.max - self.min
    }

    /// Unit normal of the swept plane, pointing to +Z.
    fn normal(&self) -> Option<Vec3> {
        let n = (self.cross_sum + (self.last - self.first).cross(self.center())).normalized()?;
        Some(if n.z < 0.0 { -n } else { n })
    }

    fn finish(&self, min_span: f64) -> Result<CompassCalibration, SensorError> {
        let reject = |reason: String| SensorError::CalibrationRejected {
            component: COMPONENT.to_string(),
            reason,
        };
        let span = self.span();
        if span.x < min_span || span.y < min_span {
            return Err(reject(format!(
                "sweep too small (x span {:.1} µT, y span {:.1} µT, need {min_span:.1}); rotate the vehicle a full turn",
                span.x, span.y
            )));
        }
        let normal = self
            .normal()
            .ok_or_else(|| reject("sweep did not trace a plane".to_string()))?;
        let rotation = Mat3::rotation_between(normal, Vec3::Z)
            .ok_or_else(|| reject("sweep plane normal is degenerate".to_string()))?;
        Ok(CompassCalibration {
            center: self.center().to_f32(),
            rotation: rotation.to_f32(),
        })
    }
}

/// 3-axis magnetometer heading.
pub struct Compass {
    device: Box<dyn Magnetometer>,
    config: CompassConfig,
    gain: MagGain,
    lsb_per_gauss_xy: f64,
    lsb_per_gauss_z: f64,
    state: State,
    begun: bool,
    heading: f64,
}

impl Compass {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] if `config` fails validation.
    pub fn new(device: Box<dyn Magnetometer>, config: CompassConfig) -> Result<Self, SensorError> {
        config.validate()?;
        Ok(Self {
            device,
            gain: config.gain,
            lsb_per_gauss_xy: f64::from(config.gain.lsb_per_gauss_xy()),
            lsb_per_gauss_z: f64::from(config.gain.lsb_per_gauss_z()),
            config,
            state: State::Uninitialized,
            begun: false,
            heading: 0.0,
        })
    }

    pub fn config(&self) -> &CompassConfig {
        &self.config
    }

    pub fn phase(&self) -> CompassPhase {
        match self.state {
            State::Uninitialized => CompassPhase::Uninitialized,
            State::Calibrating => CompassPhase::Calibrating,
            State::Loading => CompassPhase::Loading,
            State::Ready { .. } => CompassPhase::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    pub fn gain(&self) -> MagGain {
        self.gain
    }

    /// Active calibration, once ready.
    pub fn calibration(&self) -> Option<CompassCalibration> {
        match self.state {
            State::Ready { calibration, .. } => Some(calibration),
            _ => None,
        }
    }

    /// Absolute heading captured when the compass became ready.  Every
    /// relative heading is measured from it.
    pub fn initial_heading(&self) -> Option<f64> {
        match self.state {
            State::Ready {
                initial_heading, ..
            } => Some(initial_heading),
            _ => None,
        }
    }

    /// Program averaging, gain and continuous conversion.  Safe to call any
    /// number of times.
    ///
    /// # Errors
    ///
    /// Propagates the device's register write error.
    pub fn begin(&mut self) -> Result<(), SensorError> {
        self.device
            .write_register(registers::CRA_REG_M, registers::CRA_AVG8_15HZ)?;
        self.set_gain(self.gain)?;
        self.device
            .write_register(registers::MR_REG_M, registers::MODE_CONTINUOUS)?;
        if !self.begun {
            debug!(device = self.device.id(), gain = ?self.gain, "magnetometer configured");
        }
        self.begun = true;
        Ok(())
    }

    /// Select a full-scale range and the matching counts-to-Gauss constants.
    ///
    /// # Errors
    ///
    /// Propagates the device's register write error; the previous gain stays
    /// in effect.
    pub fn set_gain(&mut self, gain: MagGain) -> Result<(), SensorError> {
        self.device
            .write_register(registers::CRB_REG_M, gain.register_value())?;
        self.gain = gain;
        self.lsb_per_gauss_xy = f64::from(gain.lsb_per_gauss_xy());
        self.lsb_per_gauss_z = f64::from(gain.lsb_per_gauss_z());
        Ok(())
    }

    /// Bring the compass to `Ready` by calibrating or loading, then capture
    /// the reference heading.
    ///
    /// A calibration run blocks for `calibration_samples ×
    /// sample_interval_ms`; the vehicle must turn through a full revolution
    /// meanwhile.  Its result is saved to `store`.
    ///
    /// # Errors
    ///
    /// - [`SensorError::CalibrationRejected`] if the sweep was too small.
    /// - [`SensorError::CalibrationMissing`] if `Load` finds nothing stored.
    /// - [`SensorError::CalibrationInvalid`] if the stored record is corrupt
    ///   or its rotation is not orthonormal.
    /// - Device and storage errors as reported.
    ///
    /// On any error the compass returns to `Uninitialized`.
    pub fn initialize(
        &mut self,
        mode: CompassMode,
        store: &mut dyn CalibrationStore,
        clock: &mut dyn Clock,
    ) -> Result<(), SensorError> {
        let result = self.try_initialize(mode, store, clock);
        if let Err(e) = &result {
            self.state = State::Uninitialized;
            warn!(device = self.device.id(), ?mode, error = %e, "compass initialization failed");
        }
        result
    }

    fn try_initialize(
        &mut self,
        mode: CompassMode,
        store: &mut dyn CalibrationStore,
        clock: &mut dyn Clock,
    ) -> Result<(), SensorError> {
        self.begin()?;
        let calibration = match mode {
            CompassMode::Calibrate => {
                self.state = State::Calibrating;
                let calibration = self.run_sweep(clock)?;
                store.save_compass(&calibration)?;
                info!(
                    device = self.device.id(),
                    center = ?calibration.center,
                    "compass calibrated and saved"
                );
                calibration
            }
            CompassMode::Load => {
                self.state = State::Loading;
                let calibration = store.load_compass()?.ok_or_else(|| {
                    SensorError::CalibrationMissing(COMPONENT.to_string())
                })?;
                if !calibration.is_orthonormal(self.config.orthonormal_tolerance) {
                    return Err(SensorError::CalibrationInvalid {
                        component: COMPONENT.to_string(),
                        reason: "stored rotation is not orthonormal".to_string(),
                    });
                }
                info!(device = self.device.id(), "compass calibration loaded");
                calibration
            }
        };

        let adjusted = apply_calibration(&calibration, self.read_field_ut()?);
        let initial_heading = self.absolute_heading(adjusted);
        self.state = State::Ready {
            calibration,
            initial_heading,
        };
        self.heading = 0.0;
        info!(device = self.device.id(), initial_heading, "compass ready");
        Ok(())
    }

    fn run_sweep(&mut self, clock: &mut dyn Clock) -> Result<CompassCalibration, SensorError> {
        let mut fit = SweepFit::default();
        for i in 0..self.config.calibration_samples {
            match self.read_field_ut() {
                Ok(v) => fit.push(v),
                Err(e) => debug!(device = self.device.id(), sample = i, error = %e, "sweep sample lost"),
            }
            clock.delay_ms(self.config.sample_interval_ms);
        }
        if fit.count < 3 {
            return Err(SensorError::CalibrationRejected {
                component: COMPONENT.to_string(),
                reason: format!("only {} readable sweep samples", fit.count),
            });
        }
        let calibration = fit.finish(self.config.min_axis_span_ut)?;
        if !calibration.is_orthonormal(self.config.orthonormal_tolerance) {
            return Err(SensorError::CalibrationRejected {
                component: COMPONENT.to_string(),
                reason: "fitted rotation is not orthonormal".to_string(),
            });
        }
        Ok(calibration)
    }

    fn read_field_ut(&mut self) -> Result<Vec3, SensorError> {
        let raw = self.device.read_raw_field()?;
        let gauss_to_ut = f64::from(GAUSS_TO_MICROTESLA);
        Ok(Vec3::new(
            f64::from(raw[0]) / self.lsb_per_gauss_xy * gauss_to_ut,
            f64::from(raw[1]) / self.lsb_per_gauss_xy * gauss_to_ut,
            f64::from(raw[2]) / self.lsb_per_gauss_z * gauss_to_ut,
        ))
    }

    /// Read the field in microtesla.  With `adjusted`, the centre is
    /// subtracted and the rotation applied.
    ///
    /// # Errors
    ///
    /// [`SensorError::NotReady`] when an adjusted vector is requested before
    /// a calibration is active, otherwise the device's read error.
    pub fn get_mag_vector(&mut self, adjusted: bool) -> Result<Vec3, SensorError> {
        if !adjusted {
            return self.read_field_ut();
        }
        let State::Ready { calibration, .. } = self.state else {
            return Err(SensorError::NotReady(COMPONENT.to_string()));
        };
        Ok(apply_calibration(&calibration, self.read_field_ut()?))
    }

    fn absolute_heading(&self, adjusted: Vec3) -> f64 {
        let radians = adjusted.y.atan2(adjusted.x) + self.config.declination_rad;
        normalize_degrees(radians * 180.0 / PI)
    }

    /// Sample the device and return the heading relative to the reference,
    /// in `[0, 360)`.
    ///
    /// # Errors
    ///
    /// [`SensorError::NotReady`] before initialization, otherwise the
    /// device's read error.
    pub fn read_degrees(&mut self) -> Result<f64, SensorError> {
        let State::Ready {
            initial_heading, ..
        } = self.state
        else {
            return Err(SensorError::NotReady(COMPONENT.to_string()));
        };
        let adjusted = self.get_mag_vector(true)?;
        Ok(normalize_degrees(
            self.absolute_heading(adjusted) - initial_heading,
        ))
    }

    /// Refresh the cached heading.  A failed read keeps the previous value.
    pub fn update(&mut self, now_ms: u64) {
        if !self.is_ready() {
            return;
        }
        match self.read_degrees() {
            Ok(heading) => self.heading = heading,
            Err(e) => debug!(device = self.device.id(), now_ms, error = %e, "compass read skipped"),
        }
    }

    /// Heading from the last [`update`][Self::update], in `[0, 360)`.  `0.0`
    /// until the first successful update.
    pub fn get_degrees(&self) -> f64 {
        self.heading
    }
}
