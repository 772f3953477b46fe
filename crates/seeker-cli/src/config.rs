//! Configuration file – reads/writes `~/.seeker/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use seeker_perception::{CompassConfig, GyroConfig, VisualConfig};
use seeker_runtime::LoopConfig;

/// Parameters of the simulated vehicle and its devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Gyro zero-rate offset in raw counts.
    pub gyro_bias_counts: f32,
    /// Standard deviation of the gyro noise in raw counts.
    pub gyro_noise_counts: f32,
    /// Constant magnetometer offset from nearby iron (µT).
    pub hard_iron_ut: [f32; 3],
    /// Roll of the magnetometer mount (degrees).
    pub mount_tilt_deg: f32,
    pub mag_noise_ut: f32,
    /// Yaw rate of the simulated vehicle once the loop runs.
    pub turn_rate_dps: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gyro_bias_counts: 12.0,
            gyro_noise_counts: 2.0,
            hard_iron_ut: [15.0, -8.0, 30.0],
            mount_tilt_deg: 6.0,
            mag_noise_ut: 0.2,
            turn_rate_dps: 15.0,
        }
    }
}

/// Persisted configuration stored in `~/.seeker/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of loop iterations before exiting.
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    /// Where the compass calibration record is kept.  Defaults to
    /// `~/.seeker/compass.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_path: Option<PathBuf>,

    /// Pace the loop against the wall clock instead of simulated time.
    #[serde(default)]
    pub realtime: bool,

    #[serde(default, rename = "loop")]
    pub control_loop: LoopConfig,

    #[serde(default)]
    pub visual: VisualConfig,

    #[serde(default)]
    pub gyro: GyroConfig,

    #[serde(default)]
    pub compass: CompassConfig,

    #[serde(default)]
    pub sim: SimConfig,
}

fn default_iterations() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            calibration_path: None,
            realtime: false,
            control_loop: LoopConfig::default(),
            visual: VisualConfig::default(),
            gyro: GyroConfig::default(),
            compass: CompassConfig::default(),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Calibration file path, falling back to `~/.seeker/compass.toml`.
    pub fn calibration_path(&self) -> PathBuf {
        self.calibration_path
            .clone()
            .unwrap_or_else(|| seeker_dir_for_home(&home_dir()).join("compass.toml"))
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn seeker_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".seeker")
}

/// Return the path to `~/.seeker/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    seeker_dir_for_home(home).join("config.toml")
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Load `path` (or defaults when it is absent) and apply environment
/// overrides.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `SEEKER_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `SEEKER_ITERATIONS` | `iterations` |
/// | `SEEKER_LOOP_PERIOD_MS` | `loop.loop_period_ms` |
/// | `SEEKER_CALIBRATION_PATH` | `calibration_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SEEKER_ITERATIONS")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.iterations = n;
    }
    if let Ok(v) = std::env::var("SEEKER_LOOP_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.control_loop.loop_period_ms = ms;
    }
    if let Ok(v) = std::env::var("SEEKER_CALIBRATION_PATH")
        && !v.is_empty()
    {
        cfg.calibration_path = Some(PathBuf::from(v));
    }
}

/// Save the config to a specific path, creating parent directories.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_perception::CompassMode;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn config_path_points_to_seeker_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".seeker"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "iterations = 12\n\n[loop]\ncompass_mode = \"calibrate\"\n\n[visual]\ncenter = 150\n\n[visual.weights]\nsize = 0.05\n",
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.iterations, 12);
        assert_eq!(cfg.control_loop.compass_mode, CompassMode::Calibrate);
        assert_eq!(cfg.control_loop.loop_period_ms, LoopConfig::default().loop_period_ms);
        assert_eq!(cfg.visual.center, 150);
        assert_eq!(cfg.visual.weights.size, 0.05);
        assert_eq!(cfg.visual.weights.vertical, 0.5);
        assert_eq!(cfg.gyro, GyroConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "iterations = \"many\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn calibration_path_defaults_under_seeker_dir() {
        let cfg = Config::default();
        assert!(cfg.calibration_path().ends_with(".seeker/compass.toml"));

        let cfg = Config {
            calibration_path: Some(PathBuf::from("/tmp/cal.toml")),
            ..Config::default()
        };
        assert_eq!(cfg.calibration_path(), PathBuf::from("/tmp/cal.toml"));
    }

    #[test]
    fn apply_env_overrides_changes_fields() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe {
            std::env::set_var("SEEKER_ITERATIONS", "42");
            std::env::set_var("SEEKER_CALIBRATION_PATH", "/var/lib/seeker/cal.toml");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.iterations, 42);
        assert_eq!(
            cfg.calibration_path,
            Some(PathBuf::from("/var/lib/seeker/cal.toml"))
        );
        unsafe {
            std::env::remove_var("SEEKER_ITERATIONS");
            std::env::remove_var("SEEKER_CALIBRATION_PATH");
        }
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_numbers() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SEEKER_LOOP_PERIOD_MS", "fast") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.control_loop.loop_period_ms, LoopConfig::default().loop_period_ms);
        unsafe { std::env::remove_var("SEEKER_LOOP_PERIOD_MS") };
    }
}
