//! `Magnetometer` trait and the HMC5883 register map.
//!
//! The trait exposes exactly what the compass logic needs: raw 3-axis
//! counts and single-register writes for gain and mode configuration.

use seeker_types::SensorError;
use serde::{Deserialize, Serialize};

/// Register addresses of the HMC5883 family.
pub mod registers {
    pub const CRA_REG_M: u8 = 0x00;
    pub const CRB_REG_M: u8 = 0x01;
    pub const MR_REG_M: u8 = 0x02;
    pub const OUT_X_H_M: u8 = 0x03;
    pub const SR_REG_M: u8 = 0x09;

    /// CRA value: 8-sample averaging, 15 Hz output, normal bias.
    pub const CRA_AVG8_15HZ: u8 = 0x70;
    /// Mode register value for continuous conversion.
    pub const MODE_CONTINUOUS: u8 = 0x00;
}

/// Microtesla per Gauss.
pub const GAUSS_TO_MICROTESLA: f32 = 100.0;

/// Selectable full-scale range.  The discriminant is the value written to
/// [`registers::CRB_REG_M`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagGain {
    /// ±1.3 Gauss
    #[default]
    Gain1_3 = 0x20,
    /// ±1.9 Gauss
    Gain1_9 = 0x40,
    /// ±2.5 Gauss
    Gain2_5 = 0x60,
    /// ±4.0 Gauss
    Gain4_0 = 0x80,
    /// ±4.7 Gauss
    Gain4_7 = 0xA0,
    /// ±5.6 Gauss
    Gain5_6 = 0xC0,
    /// ±8.1 Gauss
    Gain8_1 = 0xE0,
}

impl MagGain {
    /// Value written to the gain register.
    pub fn register_value(self) -> u8 {
        self as u8
    }

    /// Decode a gain register value; unknown bit patterns yield `None`.
    pub fn from_register(value: u8) -> Option<Self> {
        Some(match value {
            0x20 => Self::Gain1_3,
            0x40 => Self::Gain1_9,
            0x60 => Self::Gain2_5,
            0x80 => Self::Gain4_0,
            0xA0 => Self::Gain4_7,
            0xC0 => Self::Gain5_6,
            0xE0 => Self::Gain8_1,
            _ => return None,
        })
    }

    /// Counts per Gauss on the X and Y axes.
    pub fn lsb_per_gauss_xy(self) -> f32 {
        match self {
            Self::Gain1_3 => 1100.0,
            Self::Gain1_9 => 855.0,
            Self::Gain2_5 => 670.0,
            Self::Gain4_0 => 450.0,
            Self::Gain4_7 => 400.0,
            Self::Gain5_6 => 330.0,
            Self::Gain8_1 => 230.0,
        }
    }

    /// Counts per Gauss on the Z axis.
    pub fn lsb_per_gauss_z(self) -> f32 {
        match self {
            Self::Gain1_3 => 980.0,
            Self::Gain1_9 => 760.0,
            Self::Gain2_5 => 600.0,
            Self::Gain4_0 => 400.0,
            Self::Gain4_7 => 355.0,
            Self::Gain5_6 => 295.0,
            Self::Gain8_1 => 205.0,
        }
    }
}

/// A 3-axis magnetometer behind a register interface.
pub trait Magnetometer: Send {
    /// Stable identifier, e.g. `"hmc5883"`.
    fn id(&self) -> &str;

    /// Write one configuration register.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BusFault`] if the write is not acknowledged.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError>;

    /// Read the raw field as `[x, y, z]` counts.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::BusFault`] if the sample cannot be read.
    fn read_raw_field(&mut self) -> Result<[i16; 3], SensorError>;
}
