//! [`SensorSuite`] – the three sensors driven by one control loop.
//!
//! The suite owns a [`VisualSensor`], a [`Gyro`] and a [`Compass`].  Setup
//! runs them in that order under a [`StartupMonitor`]; afterwards every
//! [`SensorSuite::tick`] updates each healthy sensor exactly once and returns
//! a [`SensorSnapshot`] of everything a steering controller consumes.  A
//! component whose setup failed, including by overrunning its budget, is not
//! updated and reports neutral values.

use seeker_hal::{CalibrationStore, Clock};
use seeker_perception::{Compass, CompassMode, Gyro, VisualSensor};
use seeker_types::{Block, SensorError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::startup::StartupMonitor;

pub const VISUAL: &str = "visual";
pub const GYRO: &str = "gyro";
pub const COMPASS: &str = "compass";

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Loop cadence and startup budgets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Target period of one [`SensorSuite::tick`].
    pub loop_period_ms: u64,
    pub visual_setup_timeout_ms: u64,
    pub gyro_setup_timeout_ms: u64,
    pub compass_setup_timeout_ms: u64,
    /// Whether the compass sweeps a fresh calibration or loads the stored one.
    pub compass_mode: CompassMode,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            loop_period_ms: 20,
            visual_setup_timeout_ms: 1_000,
            gyro_setup_timeout_ms: 5_000,
            compass_setup_timeout_ms: 15_000,
            compass_mode: CompassMode::Load,
        }
    }
}

impl LoopConfig {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] for a zero loop period.
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.loop_period_ms == 0 {
            return Err(SensorError::InvalidConfig(
                "loop: loop_period_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Outputs of one control-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub time_ms: u64,
    /// Gyro heading in `[0, 360)`.
    pub gyro_heading: f64,
    /// Compass heading in `[0, 360)`.
    pub compass_heading: f64,
    /// Best target, or `None` when nothing good is in view.
    pub target: Option<Block>,
    pub target_centered: bool,
    pub stalled: bool,
    pub close: bool,
    pub stop: bool,
    pub ir_constant: bool,
    /// `true` on the one tick that observed a new obstacle.
    pub ir_changed: bool,
    pub ir_volts: f32,
    pub fish_signature: u16,
    pub fish_signature_confident: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// SensorSuite
// ────────────────────────────────────────────────────────────────────────────

/// Owner of the three sensors.
pub struct SensorSuite {
    visual: VisualSensor,
    gyro: Gyro,
    compass: Compass,
    config: LoopConfig,
    monitor: StartupMonitor,
    ticks: u64,
}

impl SensorSuite {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        visual: VisualSensor,
        gyro: Gyro,
        compass: Compass,
        config: LoopConfig,
    ) -> Result<Self, SensorError> {
        config.validate()?;
        Ok(Self {
            visual,
            gyro,
            compass,
            config,
            monitor: StartupMonitor::new(),
            ticks: 0,
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Set up visual, gyro and compass in order, each within its budget.
    ///
    /// Every component is attempted even if an earlier one fails; the
    /// per-component outcome is kept in [`startup`][Self::startup].
    ///
    /// # Errors
    ///
    /// The first component error, after all three have been attempted.
    pub fn setup(
        &mut self,
        store: &mut dyn CalibrationStore,
        clock: &mut dyn Clock,
    ) -> Result<(), SensorError> {
        let config = self.config;
        let visual = &mut self.visual;
        let gyro = &mut self.gyro;
        let compass = &mut self.compass;

        let results = [
            self.monitor
                .run(VISUAL, config.visual_setup_timeout_ms, clock, |c| {
                    visual.setup(c.now_ms())
                }),
            self.monitor
                .run(GYRO, config.gyro_setup_timeout_ms, clock, |c| gyro.setup(c)),
            self.monitor
                .run(COMPASS, config.compass_setup_timeout_ms, clock, |c| {
                    compass.initialize(config.compass_mode, store, c)
                }),
        ];

        match results.into_iter().find_map(Result::err) {
            Some(e) => Err(e),
            None => {
                info!("all sensors ready");
                Ok(())
            }
        }
    }

    /// Per-component setup record.
    pub fn startup(&self) -> &StartupMonitor {
        &self.monitor
    }

    /// Update every sensor once and collect their outputs.
    ///
    /// Components recorded as failed by [`setup`][Self::setup] are skipped:
    /// a failed visual sensor reports no target and no proximity, and a
    /// failed gyro or compass reports a heading of `0.0`.
    pub fn tick(&mut self, now_ms: u64) -> SensorSnapshot {
        let visual_ok = !self.monitor.has_failed(VISUAL);
        let gyro_ok = !self.monitor.has_failed(GYRO);
        let compass_ok = !self.monitor.has_failed(COMPASS);

        let (block, ir_changed) = if visual_ok {
            self.visual.update(now_ms);
            (
                self.visual.get_block(now_ms),
                self.visual.detect_ir_change(now_ms),
            )
        } else {
            (Block::BAD, false)
        };
        if gyro_ok {
            self.gyro.update(now_ms);
        }
        if compass_ok {
            self.compass.update(now_ms);
        }
        self.ticks += 1;

        let snapshot = SensorSnapshot {
            time_ms: now_ms,
            gyro_heading: if gyro_ok { self.gyro.get_degrees() } else { 0.0 },
            compass_heading: if compass_ok {
                self.compass.get_degrees()
            } else {
                0.0
            },
            target: (!block.is_bad()).then_some(block),
            target_centered: self.visual.is_centered(&block),
            stalled: visual_ok && self.visual.is_stalled(),
            close: visual_ok && self.visual.is_close(),
            stop: visual_ok && self.visual.should_stop(),
            ir_constant: visual_ok && self.visual.ir_is_constant(),
            ir_changed,
            ir_volts: if visual_ok { self.visual.ir_average() } else { 0.0 },
            fish_signature: self.visual.get_fish_signature(false),
            fish_signature_confident: self.visual.has_confident_signature(),
        };
        debug!(tick = self.ticks, ?snapshot, "tick");
        snapshot
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn visual(&self) -> &VisualSensor {
        &self.visual
    }

    pub fn visual_mut(&mut self) -> &mut VisualSensor {
        &mut self.visual
    }

    pub fn gyro(&self) -> &Gyro {
        &self.gyro
    }

    pub fn gyro_mut(&mut self) -> &mut Gyro {
        &mut self.gyro
    }

    pub fn compass(&self) -> &Compass {
        &self.compass
    }
}
