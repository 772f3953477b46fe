//! `seeker-types` – shared value types for the seeker sensor stack.
//!
//! Everything that crosses a crate boundary lives here: the camera
//! [`Block`], the persisted [`CompassCalibration`] record, heading helpers
//! and the single [`SensorError`] enum every component reports through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the camera frame in pixels.
pub const FRAME_WIDTH: u16 = 320;
/// Height of the camera frame in pixels.  `y` grows downward, so larger
/// values are lower in the image and physically closer to the vehicle.
pub const FRAME_HEIGHT: u16 = 200;

/// Number of distinct marker signatures tracked by the histogram.
pub const SIGNATURE_COUNT: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// Block
// ────────────────────────────────────────────────────────────────────────────

/// One camera-detected target candidate.
///
/// `x`/`y` are the centre of the detection in sensor-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Block {
    /// Colour signature tag (1-based; 1..=4 are the tracked categories).
    pub signature: u16,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    /// Tracking index reported by the camera for this detection.
    pub id: u16,
}

impl Block {
    /// The "no target found" sentinel.  Every field is zero.
    pub const BAD: Block = Block {
        signature: 0,
        x: 0,
        y: 0,
        width: 0,
        height: 0,
        id: 0,
    };

    pub fn new(signature: u16, x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            signature,
            x,
            y,
            width,
            height,
            id: 0,
        }
    }

    /// Attach a camera tracking index.
    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    /// `true` when this is [`Block::BAD`].
    pub fn is_bad(&self) -> bool {
        *self == Block::BAD
    }

    /// Pixel area of the detection.
    pub fn area(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Headings
// ────────────────────────────────────────────────────────────────────────────

/// Wrap an angle in degrees into `[0, 360)`.
///
/// ```
/// use seeker_types::normalize_degrees;
///
/// assert!((normalize_degrees(725.0) - 5.0).abs() < 1e-9);
/// assert!((normalize_degrees(-90.0) - 270.0).abs() < 1e-9);
/// assert!(normalize_degrees(-1e-18) < 360.0);
/// ```
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// ────────────────────────────────────────────────────────────────────────────
// Compass calibration record
// ────────────────────────────────────────────────────────────────────────────

/// Hard-iron centre and mounting rotation learned by the compass
/// calibration routine.
///
/// Corrected field = `rotation * (raw - center)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompassCalibration {
    /// Midpoint of the swept field per axis (microtesla).
    pub center: [f32; 3],
    /// Row-major 3×3 rotation matrix.
    pub rotation: [[f32; 3]; 3],
}

impl CompassCalibration {
    /// Zero centre, identity rotation.
    pub fn identity() -> Self {
        Self {
            center: [0.0; 3],
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// `true` when `rotation` is a proper rotation: `R·Rᵀ ≈ I` and
    /// `det(R) ≈ +1`, each within `tolerance`.  Non-finite entries fail.
    pub fn is_orthonormal(&self, tolerance: f32) -> bool {
        let r = &self.rotation;
        if r.iter().flatten().chain(self.center.iter()).any(|v| !v.is_finite()) {
            return false;
        }
        for i in 0..3 {
            for j in 0..3 {
                let dot: f32 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                if (dot - expected).abs() > tolerance {
                    return false;
                }
            }
        }
        let det = r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0]);
        (det - 1.0).abs() <= tolerance
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Every failure a sensor component can report.
///
/// "No target" is not an error; it is [`Block::BAD`].  Transient read noise
/// never surfaces here either, it is absorbed by the filters.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorError {
    #[error("Device {device} did not respond: {details}")]
    DeviceUnreachable { device: String, details: String },

    #[error("Bus fault on {device}: {details}")]
    BusFault { device: String, details: String },

    #[error("Calibration rejected for {component}: {reason}")]
    CalibrationRejected { component: String, reason: String },

    #[error("Stored calibration for {component} is invalid: {reason}")]
    CalibrationInvalid { component: String, reason: String },

    #[error("No stored calibration for {0}")]
    CalibrationMissing(String),

    #[error("{0} is not ready")]
    NotReady(String),

    #[error("Setup of {component} exceeded {limit_ms} ms (took {elapsed_ms} ms)")]
    SetupTimeout {
        component: String,
        limit_ms: u64,
        elapsed_ms: u64,
    },

    #[error("Calibration store error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
