//! Simulated devices for tests and headless runs.
//!
//! Every simulated device is a cheap [`Clone`] over shared state: hand one
//! clone to the sensor that owns the device and keep another as a control
//! handle to script what the device reports next.
//!
//! | Device | Behaviour |
//! |---|---|
//! | [`SimClock`] | Manual millisecond counter; `delay_ms` advances it instantly. |
//! | [`SimCamera`] | Replays scripted frames, then repeats a steady frame. |
//! | [`SimProximity`] | Reports a settable raw ADC value. |
//! | [`SimGyro`] | Constant bias + true rate + seeded Gaussian noise. |
//! | [`SimMagnetometer`] | Horizontal field rotated by the vehicle heading, then tilted, offset by hard iron and scaled by the programmed gain. |
//!
//! # Example
//!
//! ```rust
//! use seeker_hal::sim::SimProximity;
//! use seeker_hal::ProximitySensor;
//!
//! let ir = SimProximity::new("ir_front");
//! let mut owned = ir.clone();
//! ir.set_raw(512);
//! assert_eq!(owned.read_raw().unwrap(), 512);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use seeker_types::{Block, SensorError};

use crate::camera::BlockCamera;
use crate::clock::Clock;
use crate::gyro::RateGyro;
use crate::magnetometer::{GAUSS_TO_MICROTESLA, MagGain, Magnetometer, registers};
use crate::proximity::{ADC_MAX, ProximitySensor};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn gaussian(rng: &mut StdRng, sigma: f32) -> f32 {
    if sigma <= 0.0 {
        return 0.0;
    }
    Normal::new(0.0, sigma).map(|n| n.sample(rng)).unwrap_or(0.0)
}

fn bus_fault(device: &str, details: &str) -> SensorError {
    SensorError::BusFault {
        device: device.to_string(),
        details: details.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

/// A manually driven clock.  `delay_ms` returns immediately after advancing
/// the shared counter, so calibration routines finish instantly in tests.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_ms(&mut self, ms: u64) {
        self.advance(ms);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CameraState {
    script: VecDeque<Vec<Block>>,
    steady: Vec<Block>,
    failing_pings: u32,
    polls: u64,
}

/// Scripted blob camera.
#[derive(Debug, Clone)]
pub struct SimCamera {
    id: String,
    state: Arc<Mutex<CameraState>>,
}

impl SimCamera {
    /// A camera that sees nothing until scripted.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(CameraState::default())),
        }
    }

    /// Queue a frame to be returned by one upcoming poll.
    pub fn push_frame(&self, blocks: Vec<Block>) {
        lock(&self.state).script.push_back(blocks);
    }

    /// Frame returned whenever the script is empty.
    pub fn set_steady(&self, blocks: Vec<Block>) {
        lock(&self.state).steady = blocks;
    }

    /// Make the next `count` pings fail.
    pub fn fail_pings(&self, count: u32) {
        lock(&self.state).failing_pings = count;
    }

    /// Number of frames read so far.
    pub fn polls(&self) -> u64 {
        lock(&self.state).polls
    }
}

impl BlockCamera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn ping(&mut self) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        if state.failing_pings > 0 {
            state.failing_pings -= 1;
            return Err(SensorError::DeviceUnreachable {
                device: self.id.clone(),
                details: "no response to ping".to_string(),
            });
        }
        Ok(())
    }

    fn read_blocks(&mut self, out: &mut Vec<Block>) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        state.polls += 1;
        out.clear();
        match state.script.pop_front() {
            Some(frame) => out.extend_from_slice(&frame),
            None => out.extend_from_slice(&state.steady),
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Proximity
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ProximityState {
    raw: u16,
    failing_reads: u32,
}

/// Analog IR sensor reporting a settable raw value.
#[derive(Debug, Clone)]
pub struct SimProximity {
    id: String,
    state: Arc<Mutex<ProximityState>>,
}

impl SimProximity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(ProximityState::default())),
        }
    }

    /// Set the raw ADC value (clamped to `0..=1023`).
    pub fn set_raw(&self, raw: u16) {
        lock(&self.state).raw = raw.min(ADC_MAX);
    }

    /// Make the next `count` reads fail.
    pub fn fail_reads(&self, count: u32) {
        lock(&self.state).failing_reads = count;
    }
}

impl ProximitySensor for SimProximity {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let mut state = lock(&self.state);
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(bus_fault(&self.id, "ADC conversion timed out"));
        }
        Ok(state.raw)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gyro
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct GyroState {
    bias_counts: f32,
    noise_sigma: f32,
    rate_counts: f32,
    unreachable: bool,
    enabled: bool,
    rng: StdRng,
}

/// Rate gyro with a constant zero-rate bias and Gaussian noise.
#[derive(Debug, Clone)]
pub struct SimGyro {
    id: String,
    state: Arc<Mutex<GyroState>>,
}

impl SimGyro {
    /// `bias_counts` is added to every sample; `noise_sigma` is the standard
    /// deviation of the zero-mean noise, drawn from a `StdRng` seeded with
    /// `seed`.
    pub fn new(id: impl Into<String>, bias_counts: f32, noise_sigma: f32, seed: u64) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(GyroState {
                bias_counts,
                noise_sigma,
                rate_counts: 0.0,
                unreachable: false,
                enabled: false,
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    /// True angular rate in device counts, on top of the bias.
    pub fn set_rate_counts(&self, rate: f32) {
        lock(&self.state).rate_counts = rate;
    }

    /// Simulate a disconnected device.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }
}

impl RateGyro for SimGyro {
    fn id(&self) -> &str {
        &self.id
    }

    fn enable(&mut self) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        if state.unreachable {
            return Err(SensorError::DeviceUnreachable {
                device: self.id.clone(),
                details: "no acknowledge on enable".to_string(),
            });
        }
        state.enabled = true;
        Ok(())
    }

    fn read_rate_z(&mut self) -> Result<i16, SensorError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if state.unreachable || !state.enabled {
            return Err(bus_fault(&self.id, "device not enabled"));
        }
        let sigma = state.noise_sigma;
        let noise = gaussian(&mut state.rng, sigma);
        let value = state.bias_counts + state.rate_counts + noise;
        Ok(value.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Magnetometer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct MagState {
    heading_deg: f32,
    spin_deg_per_read: f32,
    horizontal_ut: f32,
    vertical_ut: f32,
    hard_iron_ut: [f32; 3],
    tilt: [[f32; 3]; 3],
    gain: MagGain,
    continuous: bool,
    noise_sigma_ut: f32,
    rng: StdRng,
}

/// 3-axis magnetometer in a uniform Earth field.
///
/// The body-frame field is `(H·cos ψ, H·sin ψ, V)` for vehicle heading ψ,
/// rotated by the mounting tilt, offset by the hard-iron vector and
/// converted to counts with the gain last written to `CRB_REG_M`.  Reads
/// fail until the mode register selects continuous conversion.
#[derive(Debug, Clone)]
pub struct SimMagnetometer {
    id: String,
    state: Arc<Mutex<MagState>>,
}

impl SimMagnetometer {
    /// Level, offset-free device in a 20 µT horizontal / 40 µT vertical field.
    pub fn new(id: impl Into<String>, seed: u64) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(MagState {
                heading_deg: 0.0,
                spin_deg_per_read: 0.0,
                horizontal_ut: 20.0,
                vertical_ut: 40.0,
                hard_iron_ut: [0.0; 3],
                tilt: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                gain: MagGain::default(),
                continuous: false,
                noise_sigma_ut: 0.0,
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    /// Constant field offset from nearby ferrous material (µT).
    pub fn with_hard_iron(self, offset_ut: [f32; 3]) -> Self {
        lock(&self.state).hard_iron_ut = offset_ut;
        self
    }

    /// Mount the sensor rolled by `roll_deg` about its X axis.
    pub fn with_tilt_deg(self, roll_deg: f32) -> Self {
        let (s, c) = roll_deg.to_radians().sin_cos();
        lock(&self.state).tilt = [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]];
        self
    }

    /// Gaussian noise on every axis (µT).
    pub fn with_noise(self, sigma_ut: f32) -> Self {
        lock(&self.state).noise_sigma_ut = sigma_ut;
        self
    }

    pub fn set_heading_deg(&self, heading: f32) {
        lock(&self.state).heading_deg = heading;
    }

    pub fn heading_deg(&self) -> f32 {
        lock(&self.state).heading_deg
    }

    /// Rotate the vehicle by this many degrees after every read.
    pub fn set_spin(&self, deg_per_read: f32) {
        lock(&self.state).spin_deg_per_read = deg_per_read;
    }

    /// Gain most recently programmed through the register interface.
    pub fn gain(&self) -> MagGain {
        lock(&self.state).gain
    }
}

impl Magnetometer for SimMagnetometer {
    fn id(&self) -> &str {
        &self.id
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        let mut state = lock(&self.state);
        match register {
            registers::CRB_REG_M => {
                state.gain = MagGain::from_register(value)
                    .ok_or_else(|| bus_fault(&self.id, "invalid gain bits"))?;
            }
            registers::MR_REG_M => state.continuous = value == registers::MODE_CONTINUOUS,
            registers::CRA_REG_M => {}
            _ => return Err(bus_fault(&self.id, "write to read-only register")),
        }
        Ok(())
    }

    fn read_raw_field(&mut self) -> Result<[i16; 3], SensorError> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        if !state.continuous {
            return Err(bus_fault(&self.id, "device idle"));
        }
        let (s, c) = state.heading_deg.to_radians().sin_cos();
        let body = [state.horizontal_ut * c, state.horizontal_ut * s, state.vertical_ut];
        let sigma = state.noise_sigma_ut;
        let mut field = [0.0_f32; 3];
        for (i, axis) in field.iter_mut().enumerate() {
            let tilted: f32 = (0..3).map(|k| state.tilt[i][k] * body[k]).sum();
            *axis = tilted + state.hard_iron_ut[i] + gaussian(&mut state.rng, sigma);
        }

        let gain = state.gain;
        let scale = [
            gain.lsb_per_gauss_xy(),
            gain.lsb_per_gauss_xy(),
            gain.lsb_per_gauss_z(),
        ];
        let mut counts = [0_i16; 3];
        for i in 0..3 {
            let value = field[i] / GAUSS_TO_MICROTESLA * scale[i];
            counts[i] = value.round().clamp(-2048.0, 2047.0) as i16;
        }

        state.heading_deg = (state.heading_deg + state.spin_deg_per_read).rem_euclid(360.0);
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_clock_delay_advances_shared_counter() {
        let clock = SimClock::new(100);
        let mut owned = clock.clone();
        owned.delay_ms(25);
        assert_eq!(clock.now_ms(), 125);
    }

    #[test]
    fn sim_camera_replays_script_then_steady() {
        let cam = SimCamera::new("pixy");
        let mut owned = cam.clone();
        cam.push_frame(vec![Block::new(1, 1, 1, 1, 1)]);
        cam.set_steady(vec![Block::new(2, 2, 2, 2, 2), Block::new(3, 3, 3, 3, 3)]);

        let mut buf = Vec::new();
        owned.read_blocks(&mut buf).unwrap();
        assert_eq!(buf.len(), 1);
        owned.read_blocks(&mut buf).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(cam.polls(), 2);
    }

    #[test]
    fn sim_camera_ping_failures_are_counted_down() {
        let mut cam = SimCamera::new("pixy");
        cam.fail_pings(2);
        assert!(cam.ping().is_err());
        assert!(cam.ping().is_err());
        assert!(cam.ping().is_ok());
    }

    #[test]
    fn sim_proximity_fails_then_recovers() {
        let mut ir = SimProximity::new("ir");
        ir.set_raw(2000);
        ir.fail_reads(1);
        assert!(ir.read_raw().is_err());
        assert_eq!(ir.read_raw().unwrap(), ADC_MAX);
    }

    #[test]
    fn sim_gyro_requires_enable() {
        let mut gyro = SimGyro::new("l3g", 5.0, 0.0, 1);
        assert!(gyro.read_rate_z().is_err());
        gyro.enable().unwrap();
        assert_eq!(gyro.read_rate_z().unwrap(), 5);
        gyro.set_rate_counts(-20.0);
        assert_eq!(gyro.read_rate_z().unwrap(), -15);
    }

    #[test]
    fn sim_gyro_unreachable_fails_enable() {
        let mut gyro = SimGyro::new("l3g", 0.0, 0.0, 1);
        gyro.set_unreachable(true);
        assert!(matches!(
            gyro.enable(),
            Err(SensorError::DeviceUnreachable { .. })
        ));
    }

    #[test]
    fn sim_magnetometer_needs_continuous_mode() {
        let mut mag = SimMagnetometer::new("hmc", 1);
        assert!(mag.read_raw_field().is_err());
        mag.write_register(registers::MR_REG_M, registers::MODE_CONTINUOUS)
            .unwrap();
        assert!(mag.read_raw_field().is_ok());
    }

    #[test]
    fn sim_magnetometer_scales_with_gain() {
        let mut mag = SimMagnetometer::new("hmc", 1);
        mag.write_register(registers::MR_REG_M, registers::MODE_CONTINUOUS)
            .unwrap();
        let fine = mag.read_raw_field().unwrap();
        // 20 µT = 0.2 G along +X at 1100 LSB/G.
        assert_eq!(fine[0], 220);

        mag.write_register(registers::CRB_REG_M, MagGain::Gain8_1.register_value())
            .unwrap();
        assert_eq!(mag.gain(), MagGain::Gain8_1);
        let coarse = mag.read_raw_field().unwrap();
        assert_eq!(coarse[0], 46);
    }

    #[test]
    fn sim_magnetometer_spins_per_read() {
        let mut mag = SimMagnetometer::new("hmc", 1);
        mag.write_register(registers::MR_REG_M, registers::MODE_CONTINUOUS)
            .unwrap();
        mag.set_spin(90.0);
        mag.read_raw_field().unwrap();
        assert!((mag.heading_deg() - 90.0).abs() < 1e-4);
        let field = mag.read_raw_field().unwrap();
        // Heading 90°: field along +Y.
        assert!(field[0].abs() <= 1);
        assert_eq!(field[1], 220);
    }
}
