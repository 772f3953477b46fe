//! Visual target selection and IR proximity state.
//!
//! [`VisualSensor`] answers four questions every loop iteration: is there a
//! target, which one, is it close, and which marker signature is the fish.
//!
//! # Selection
//!
//! A block survives [`VisualSensor::is_good_block`] when it is large enough,
//! scores high enough and is not below `maximum_block_y` (detections at the
//! very bottom of the frame are usually the vehicle's own bumper or a
//! partially occluded blob).  Among survivors the block lowest in the image
//! (largest `y`, physically closest) wins.  With a non-zero
//! `y_tie_tolerance`, every survivor within that many pixels of the lowest
//! one competes on score instead, so the pick does not depend on the order
//! the camera reports blocks in.
//!
//! # Example
//!
//! ```rust
//! use seeker_hal::sim::{SimCamera, SimProximity};
//! use seeker_perception::visual::{VisualConfig, VisualSensor};
//! use seeker_types::Block;
//!
//! let camera = SimCamera::new("pixy");
//! let ir = SimProximity::new("ir_front");
//! let mut sensor = VisualSensor::new(
//!     Box::new(camera.clone()),
//!     Box::new(ir.clone()),
//!     VisualConfig::default(),
//! )
//! .unwrap();
//! sensor.setup(0).unwrap();
//!
//! camera.push_frame(vec![Block::new(2, 150, 60, 20, 20), Block::new(1, 170, 140, 20, 20)]);
//! let best = sensor.get_block(100);
//! assert_eq!(best.signature, 1); // lower in the frame = closer
//! ```

use seeker_hal::proximity::raw_to_volts;
use seeker_hal::{BlockCamera, ProximitySensor};
use seeker_types::{Block, FRAME_HEIGHT, SensorError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::histogram::SignatureHistogram;
use crate::proximity::{ProximityFilter, ProximityThresholds};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Coefficients combining a block's geometry into one desirability score:
///
/// ```text
/// score = size·area + vertical·y − horizontal·|x − center| − distance·hypot
/// ```
///
/// where `hypot` is the distance from the block centre to the bottom of the
/// frame at the aim column.  All weights must be non-negative, which keeps the
/// score non-decreasing in area and in `y`, and non-increasing in horizontal
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockScoreWeights {
    pub size: f32,
    pub vertical: f32,
    pub horizontal: f32,
    pub distance: f32,
}

impl Default for BlockScoreWeights {
    fn default() -> Self {
        Self {
            size: 0.01,
            vertical: 0.5,
            horizontal: 0.3,
            distance: 0.2,
        }
    }
}

impl BlockScoreWeights {
    pub fn as_array(&self) -> [f32; 4] {
        [self.size, self.vertical, self.horizontal, self.distance]
    }
}

impl From<[f32; 4]> for BlockScoreWeights {
    fn from(w: [f32; 4]) -> Self {
        Self {
            size: w[0],
            vertical: w[1],
            horizontal: w[2],
            distance: w[3],
        }
    }
}

/// Tuning for [`VisualSensor`].  Voltages are in volts, times in
/// milliseconds, positions and sizes in camera pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Column the vehicle aims for.
    pub center: u16,
    /// Averaged IR voltage at which the vehicle must stop.
    pub stop_voltage: f32,
    /// Averaged IR voltage at which an obstacle counts as close.
    pub close_voltage: f32,
    /// Largest sample-to-mean deviation still counted as "not changing".
    pub error_voltage: f32,
    /// Physical peak output of the IR sensor; higher samples are clamped.
    pub peak_voltage: f32,
    /// Deviation from the settled IR level that counts as a new obstacle.
    pub ir_constant_threshold: f32,
    /// Consecutive steady samples before the IR reading counts as constant.
    pub min_stable_samples: u32,
    /// Rolling-mean window for the IR sensor.
    pub proximity_window: usize,
    /// Half-width of the "on target" band around `center`.
    pub error_deadzone: u16,
    /// Minimum interval between camera polls.
    pub pixy_update_ms: u64,
    /// How long without a good block before the search counts as stalled.
    pub stall_ms: u64,
    pub weights: BlockScoreWeights,
    pub minimum_block_score: f32,
    /// Minimum block area in square pixels.
    pub minimum_block_size: f32,
    pub maximum_block_y: u16,
    /// Good blocks at most this far above the lowest one are compared by score.
    pub y_tie_tolerance: u16,
    /// Sightings needed before the signature vote is trusted.
    pub fish_signature_min_count: u32,
    /// Camera pings attempted by `setup` before giving up.
    pub setup_attempts: u32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            center: 160,
            stop_voltage: 2.6,
            close_voltage: 2.0,
            error_voltage: 0.15,
            peak_voltage: 5.0,
            ir_constant_threshold: 0.5,
            min_stable_samples: 10,
            proximity_window: 5,
            error_deadzone: 10,
            pixy_update_ms: 20,
            stall_ms: 1000,
            weights: BlockScoreWeights::default(),
            minimum_block_score: 5.0,
            minimum_block_size: 20.0,
            maximum_block_y: 190,
            y_tie_tolerance: 0,
            fish_signature_min_count: 5,
            setup_attempts: 3,
        }
    }
}

impl VisualConfig {
    /// Reject configurations that would break the scoring or IR contracts.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), SensorError> {
        let fail = |msg: &str| Err(SensorError::InvalidConfig(format!("visual: {msg}")));
        if self.weights.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return fail("block score weights must be finite and non-negative");
        }
        if self.stop_voltage < self.close_voltage {
            return fail("stop_voltage must not be below close_voltage");
        }
        if self.proximity_window == 0 {
            return fail("proximity_window must be at least 1");
        }
        if self.setup_attempts == 0 {
            return fail("setup_attempts must be at least 1");
        }
        if !(0.0..=5.0).contains(&self.peak_voltage) {
            return fail("peak_voltage must lie within the 0-5 V ADC range");
        }
        Ok(())
    }

    fn proximity_thresholds(&self) -> ProximityThresholds {
        ProximityThresholds {
            window: self.proximity_window,
            error_voltage: self.error_voltage,
            min_stable_samples: self.min_stable_samples,
            close_voltage: self.close_voltage,
            stop_voltage: self.stop_voltage,
            peak_voltage: self.peak_voltage,
            change_threshold: self.ir_constant_threshold,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// VisualSensor
// ────────────────────────────────────────────────────────────────────────────

/// Camera + IR proximity sensor pair.
///
/// Construct with [`VisualSensor::new`], call [`setup`][Self::setup] once,
/// then once per loop call [`update`][Self::update] and
/// [`get_block`][Self::get_block].
pub struct VisualSensor {
    camera: Box<dyn BlockCamera>,
    proximity: Box<dyn ProximitySensor>,
    config: VisualConfig,
    filter: ProximityFilter,
    histogram: SignatureHistogram,
    frame: Vec<Block>,
    ready: bool,
    best: Block,
    last_poll_ms: Option<u64>,
    last_seen_ms: u64,
    stalled: bool,
    last_ir_change_ms: Option<u64>,
}

impl VisualSensor {
    /// # Errors
    ///
    /// Returns [`SensorError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        camera: Box<dyn BlockCamera>,
        proximity: Box<dyn ProximitySensor>,
        config: VisualConfig,
    ) -> Result<Self, SensorError> {
        config.validate()?;
        Ok(Self {
            camera,
            proximity,
            filter: ProximityFilter::new(config.proximity_thresholds()),
            histogram: SignatureHistogram::new(),
            frame: Vec::with_capacity(16),
            ready: false,
            best: Block::BAD,
            last_poll_ms: None,
            last_seen_ms: 0,
            stalled: false,
            last_ir_change_ms: None,
            config,
        })
    }

    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    /// Check that the camera answers, trying up to `setup_attempts` times.
    /// Stall tracking starts at `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns the last ping error if every attempt fails.  The caller
    /// decides whether to try again.
    pub fn setup(&mut self, now_ms: u64) -> Result<(), SensorError> {
        let mut last_err = None;
        for attempt in 1..=self.config.setup_attempts {
            match self.camera.ping() {
                Ok(()) => {
                    self.ready = true;
                    self.last_seen_ms = now_ms;
                    self.stalled = false;
                    info!(camera = self.camera.id(), attempt, "camera online");
                    return Ok(());
                }
                Err(e) => {
                    debug!(camera = self.camera.id(), attempt, error = %e, "camera ping failed");
                    last_err = Some(e);
                }
            }
        }
        self.ready = false;
        let err = last_err.unwrap_or_else(|| SensorError::DeviceUnreachable {
            device: self.camera.id().to_string(),
            details: "no ping attempted".to_string(),
        });
        warn!(camera = self.camera.id(), error = %err, "camera setup failed");
        Err(err)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// `true` when the block clears the size, vertical-position and score
    /// thresholds.
    pub fn is_good_block(&self, block: &Block) -> bool {
        !block.is_bad()
            && block.area() as f32 >= self.config.minimum_block_size
            && block.y <= self.config.maximum_block_y
            && self.get_block_score(block, false) >= self.config.minimum_block_score
    }

    /// Desirability of `block`; see [`BlockScoreWeights`].
    ///
    /// `print` only emits the score breakdown as a log line.
    pub fn get_block_score(&self, block: &Block, print: bool) -> f32 {
        let w = &self.config.weights;
        let area = block.area() as f32;
        let vertical = f32::from(block.y);
        let horizontal = (f32::from(block.x) - f32::from(self.config.center)).abs();
        let hypotenuse = self.get_hypotenuse(block);
        let score = w.size * area + w.vertical * vertical
            - w.horizontal * horizontal
            - w.distance * hypotenuse;
        if print {
            info!(
                signature = block.signature,
                x = block.x,
                y = block.y,
                area,
                horizontal,
                hypotenuse,
                score,
                "block score"
            );
        }
        score
    }

    /// Distance from the block centre to the bottom of the frame at the aim
    /// column.
    fn get_hypotenuse(&self, block: &Block) -> f32 {
        let dx = f32::from(block.x) - f32::from(self.config.center);
        let dy = f32::from(FRAME_HEIGHT) - f32::from(block.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Poll the camera and pick the best target.
    ///
    /// Returns [`Block::BAD`] when nothing good is in view.  Calls within
    /// `pixy_update_ms` of the previous poll return the cached answer without
    /// touching the camera or the signature counts.
    pub fn get_block(&mut self, now_ms: u64) -> Block {
        if !self.ready {
            return Block::BAD;
        }
        if let Some(last) = self.last_poll_ms
            && now_ms.saturating_sub(last) < self.config.pixy_update_ms
        {
            return self.best;
        }
        self.last_poll_ms = Some(now_ms);

        if let Err(e) = self.camera.read_blocks(&mut self.frame) {
            warn!(camera = self.camera.id(), error = %e, "camera poll failed");
            self.frame.clear();
        }

        // Candidates are the good blocks within `y_tie_tolerance` of the lowest
        // one; the first highest score among them wins.
        let max_y = self
            .frame
            .iter()
            .filter(|b| self.is_good_block(b))
            .map(|b| b.y)
            .max();
        let chosen = max_y.and_then(|max_y| {
            let floor = max_y.saturating_sub(self.config.y_tie_tolerance);
            self.frame
                .iter()
                .filter(|b| b.y >= floor && self.is_good_block(b))
                .map(|b| (*b, self.get_block_score(b, false)))
                .fold(None, |best: Option<(Block, f32)>, (block, score)| match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((block, score)),
                })
        });

        match chosen {
            Some((block, _)) => {
                self.histogram.record(block.signature);
                self.last_seen_ms = now_ms;
                self.stalled = false;
                self.best = block;
            }
            None => {
                let was_stalled = self.stalled;
                self.stalled = now_ms.saturating_sub(self.last_seen_ms) > self.config.stall_ms;
                if self.stalled && !was_stalled {
                    info!(
                        since_ms = self.last_seen_ms,
                        "no good block within stall window"
                    );
                }
                self.best = Block::BAD;
            }
        }
        self.best
    }

    /// Result of the most recent camera poll.
    pub fn last_block(&self) -> Block {
        self.best
    }

    /// `true` once no good block has been seen for longer than `stall_ms`.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// `true` when the block sits within `error_deadzone` of the aim column.
    pub fn is_centered(&self, block: &Block) -> bool {
        !block.is_bad() && block.x.abs_diff(self.config.center) <= self.config.error_deadzone
    }

    /// Most frequently selected signature (lowest wins ties), optionally
    /// clearing the counts in the same call.
    pub fn get_fish_signature(&mut self, reset_counts: bool) -> u16 {
        let signature = self.histogram.most_frequent();
        if reset_counts {
            self.histogram.reset();
        }
        signature
    }

    /// `true` once enough sightings have been counted to trust the vote.
    pub fn has_confident_signature(&self) -> bool {
        self.histogram.total() >= self.config.fish_signature_min_count
    }

    pub fn histogram(&self) -> &SignatureHistogram {
        &self.histogram
    }

    /// Read the IR sensor as volts (`0.0..=5.0`), unfiltered.
    ///
    /// # Errors
    ///
    /// Propagates the sensor's read error.
    pub fn read_proximity(&mut self) -> Result<f32, SensorError> {
        Ok(raw_to_volts(self.proximity.read_raw()?))
    }

    /// Sample the IR sensor and refresh the proximity flags.  A failed read
    /// leaves the previous state untouched.
    pub fn update(&mut self, now_ms: u64) {
        match self.read_proximity() {
            Ok(volts) => self.filter.push(volts),
            Err(e) => debug!(sensor = self.proximity.id(), now_ms, error = %e, "proximity read skipped"),
        }
    }

    /// `true` exactly once per obstacle: when the IR level moved more than
    /// `ir_constant_threshold` away from where it had settled.
    pub fn detect_ir_change(&mut self, now_ms: u64) -> bool {
        let changed = self.filter.take_change();
        if changed {
            self.last_ir_change_ms = Some(now_ms);
            info!(average = self.filter.average(), "proximity change detected");
        }
        changed
    }

    pub fn last_ir_change_ms(&self) -> Option<u64> {
        self.last_ir_change_ms
    }

    /// Rolling mean of the IR voltage.
    pub fn ir_average(&self) -> f32 {
        self.filter.average()
    }

    pub fn ir_is_constant(&self) -> bool {
        self.filter.is_constant()
    }

    pub fn is_close(&self) -> bool {
        self.filter.is_close()
    }

    pub fn should_stop(&self) -> bool {
        self.filter.should_stop()
    }
}
