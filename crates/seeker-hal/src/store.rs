//! Persistent calibration storage.
//!
//! A [`CalibrationStore`] keeps one fixed-size [`CompassCalibration`]
//! record.  Loading distinguishes three outcomes:
//!
//! | Result | Meaning |
//! |---|---|
//! | `Ok(Some(record))` | A record was written earlier and reads back intact (it may legitimately be all zeros). |
//! | `Ok(None)` | Nothing has ever been written. |
//! | `Err(SensorError::CalibrationInvalid { .. })` | Something was written but it no longer decodes. |
//!
//! Two backends are provided: [`MemoryStore`], a byte image laid out the way
//! an EEPROM cell would hold it, and [`FileStore`], a TOML file on disk.

use std::fs;
use std::path::{Path, PathBuf};

use seeker_types::{CompassCalibration, SensorError};
use serde::{Deserialize, Serialize};
use tracing::debug;

const COMPONENT: &str = "compass";

/// Typed load/save of the compass calibration record.
pub trait CalibrationStore: Send {
    /// Read the stored record, if any.
    ///
    /// # Errors
    ///
    /// [`SensorError::CalibrationInvalid`] when stored bytes are corrupt,
    /// [`SensorError::Storage`] when the medium itself cannot be read.
    fn load_compass(&self) -> Result<Option<CompassCalibration>, SensorError>;

    /// Persist `calibration`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// [`SensorError::Storage`] when the medium cannot be written.
    fn save_compass(&mut self, calibration: &CompassCalibration) -> Result<(), SensorError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

const MAGIC: [u8; 4] = *b"SKCC";
const VERSION: u8 = 1;
const FLOAT_COUNT: usize = 12;
const PAYLOAD_END: usize = 5 + FLOAT_COUNT * 4;
/// Size of one encoded record in bytes.
pub const RECORD_LEN: usize = PAYLOAD_END + 4;
const ERASED: u8 = 0xFF;

/// EEPROM-style in-memory store.
///
/// Layout: 4-byte magic, version byte, twelve little-endian `f32`s (centre
/// then the row-major rotation), and an FNV-1a checksum over everything
/// before it.  A fresh store is "erased" (all `0xFF`).
#[derive(Debug, Clone)]
pub struct MemoryStore {
    image: [u8; RECORD_LEN],
}

impl MemoryStore {
    /// An erased store that has never been written.
    pub fn new() -> Self {
        Self {
            image: [ERASED; RECORD_LEN],
        }
    }

    /// Wrap an existing byte image, e.g. one read back from a device.
    pub fn from_image(image: [u8; RECORD_LEN]) -> Self {
        Self { image }
    }

    /// The raw byte image.
    pub fn image(&self) -> &[u8; RECORD_LEN] {
        &self.image
    }

    /// Mutable access to the raw bytes.
    pub fn image_mut(&mut self) -> &mut [u8; RECORD_LEN] {
        &mut self.image
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationStore for MemoryStore {
    fn load_compass(&self) -> Result<Option<CompassCalibration>, SensorError> {
        if self.image[..4] != MAGIC {
            debug!("calibration image has no record");
            return Ok(None);
        }
        if self.image[4] != VERSION {
            return Err(invalid(format!("unsupported record version {}", self.image[4])));
        }
        let stored = u32::from_le_bytes(read4(&self.image, PAYLOAD_END));
        let computed = fnv1a(&self.image[..PAYLOAD_END]);
        if stored != computed {
            return Err(invalid(format!(
                "checksum mismatch (stored {stored:#010x}, computed {computed:#010x})"
            )));
        }

        let mut floats = [0.0_f32; FLOAT_COUNT];
        for (i, f) in floats.iter_mut().enumerate() {
            *f = f32::from_le_bytes(read4(&self.image, 5 + i * 4));
        }
        let mut cal = CompassCalibration::identity();
        cal.center.copy_from_slice(&floats[..3]);
        for (row, chunk) in cal.rotation.iter_mut().zip(floats[3..].chunks_exact(3)) {
            row.copy_from_slice(chunk);
        }
        Ok(Some(cal))
    }

    fn save_compass(&mut self, calibration: &CompassCalibration) -> Result<(), SensorError> {
        let mut image = [0_u8; RECORD_LEN];
        image[..4].copy_from_slice(&MAGIC);
        image[4] = VERSION;
        let floats = calibration
            .center
            .iter()
            .chain(calibration.rotation.iter().flatten());
        for (i, f) in floats.enumerate() {
            image[5 + i * 4..9 + i * 4].copy_from_slice(&f.to_le_bytes());
        }
        let checksum = fnv1a(&image[..PAYLOAD_END]);
        image[PAYLOAD_END..].copy_from_slice(&checksum.to_le_bytes());
        self.image = image;
        Ok(())
    }
}

fn read4(bytes: &[u8], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5_u32, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

fn invalid(reason: String) -> SensorError {
    SensorError::CalibrationInvalid {
        component: COMPONENT.to_string(),
        reason,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FileStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct CalibrationFile {
    compass: CompassCalibration,
}

/// TOML-backed store, e.g. `~/.seeker/calibration.toml`.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for FileStore {
    fn load_compass(&self) -> Result<Option<CompassCalibration>, SensorError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            SensorError::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let file: CalibrationFile = toml::from_str(&raw)
            .map_err(|e| invalid(format!("failed to parse {}: {e}", self.path.display())))?;
        Ok(Some(file.compass))
    }

    fn save_compass(&mut self, calibration: &CompassCalibration) -> Result<(), SensorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SensorError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let raw = toml::to_string_pretty(&CalibrationFile {
            compass: *calibration,
        })
        .map_err(|e| SensorError::Storage(format!("failed to serialize calibration: {e}")))?;
        fs::write(&self.path, raw).map_err(|e| {
            SensorError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "compass calibration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompassCalibration {
        CompassCalibration {
            center: [12.5, -3.75, 41.0],
            rotation: [
                [0.998_629_5, 0.0, -0.052_335_96],
                [0.0, 1.0, 0.0],
                [0.052_335_96, 0.0, 0.998_629_5],
            ],
        }
    }

    #[test]
    fn erased_memory_store_has_no_record() {
        assert_eq!(MemoryStore::new().load_compass().unwrap(), None);
    }

    #[test]
    fn memory_store_roundtrip_is_bit_identical() {
        let mut store = MemoryStore::new();
        store.save_compass(&sample()).unwrap();
        let back = store.load_compass().unwrap().expect("record present");
        assert_eq!(back, sample());
    }

    #[test]
    fn all_zero_record_is_distinct_from_missing() {
        let zero = CompassCalibration {
            center: [0.0; 3],
            rotation: [[0.0; 3]; 3],
        };
        let mut store = MemoryStore::new();
        store.save_compass(&zero).unwrap();
        assert_eq!(store.load_compass().unwrap(), Some(zero));
    }

    #[test]
    fn flipped_payload_byte_is_reported_invalid() {
        let mut store = MemoryStore::new();
        store.save_compass(&sample()).unwrap();
        store.image_mut()[10] ^= 0x40;
        assert!(matches!(
            store.load_compass(),
            Err(SensorError::CalibrationInvalid { .. })
        ));
    }

    #[test]
    fn unknown_version_is_reported_invalid() {
        let mut store = MemoryStore::new();
        store.save_compass(&sample()).unwrap();
        let mut image = *store.image();
        image[4] = 9;
        let store = MemoryStore::from_image(image);
        assert!(matches!(
            store.load_compass(),
            Err(SensorError::CalibrationInvalid { .. })
        ));
    }

    #[test]
    fn file_store_missing_file_has_no_record() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let store = FileStore::new(dir.path().join("calibration.toml"));
        assert_eq!(store.load_compass().unwrap(), None);
    }

    #[test]
    fn file_store_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(".seeker").join("calibration.toml");
        let mut store = FileStore::new(&path);
        store.save_compass(&sample()).unwrap();
        assert!(path.exists());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.load_compass().unwrap(), Some(sample()));
    }

    #[test]
    fn file_store_garbage_is_reported_invalid() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("calibration.toml");
        std::fs::write(&path, "compass = \"not a table\"").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(
            store.load_compass(),
            Err(SensorError::CalibrationInvalid { .. })
        ));
    }
}
