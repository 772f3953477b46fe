//! IR proximity filtering.
//!
//! Raw IR voltages jitter from sample to sample.  [`ProximityFilter`]
//! smooths them with a rolling mean and derives four flags:
//!
//! - **constant**: the newest sample has stayed within `error_voltage` of the
//!   rolling mean for at least `min_stable_samples` consecutive updates.
//! - **close** / **stop**: the rolling mean has reached `close_voltage` /
//!   `stop_voltage` (the sensor's voltage rises as range shrinks).
//! - **change**: latched when, after the reading had settled, a sample moves
//!   more than `change_threshold` away from the settled level.  A change also
//!   clears **constant**.  The latch is consumed by
//!   [`ProximityFilter::take_change`] and re-arms only once the reading
//!   settles again, so one obstacle produces one change event.

use std::collections::VecDeque;

/// Thresholds for a [`ProximityFilter`], all in volts except the counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityThresholds {
    pub window: usize,
    pub error_voltage: f32,
    pub min_stable_samples: u32,
    pub close_voltage: f32,
    pub stop_voltage: f32,
    pub peak_voltage: f32,
    pub change_threshold: f32,
}

/// Rolling-mean IR filter.  Feed one sample per control-loop iteration.
#[derive(Debug, Clone)]
pub struct ProximityFilter {
    thresholds: ProximityThresholds,
    samples: VecDeque<f32>,
    sum: f32,
    average: f32,
    latest: f32,
    stable_run: u32,
    constant: bool,
    close: bool,
    stop: bool,
    settled_level: Option<f32>,
    change_pending: bool,
}

impl ProximityFilter {
    /// `thresholds.window` is clamped to at least one sample.
    pub fn new(thresholds: ProximityThresholds) -> Self {
        let window = thresholds.window.max(1);
        Self {
            thresholds: ProximityThresholds {
                window,
                ..thresholds
            },
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
            average: 0.0,
            latest: 0.0,
            stable_run: 0,
            constant: false,
            close: false,
            stop: false,
            settled_level: None,
            change_pending: false,
        }
    }

    /// Add one sample (volts).  Samples above the sensor's peak voltage are
    /// clamped to it.
    pub fn push(&mut self, volts: f32) {
        let t = self.thresholds;
        let sample = volts.min(t.peak_voltage).max(0.0);
        let reference = if self.samples.is_empty() {
            sample
        } else {
            self.average
        };

        if self.samples.len() == t.window
            && let Some(old) = self.samples.pop_front()
        {
            self.sum -= old;
        }
        self.samples.push_back(sample);
        self.sum += sample;
        self.average = self.sum / self.samples.len() as f32;
        self.latest = sample;

        if (sample - reference).abs() < t.error_voltage {
            self.stable_run = self.stable_run.saturating_add(1);
        } else {
            self.stable_run = 0;
        }
        // The settled level is held fixed, so a step is measured against where
        // the reading settled even when it is smaller than `error_voltage`.
        if let Some(level) = self.settled_level
            && (sample - level).abs() > t.change_threshold
        {
            self.change_pending = true;
            self.settled_level = None;
            self.stable_run = 0;
        }
        self.constant = self.stable_run >= t.min_stable_samples;
        if self.constant && self.settled_level.is_none() {
            self.settled_level = Some(self.average);
        }

        self.close = self.average >= t.close_voltage;
        self.stop = self.average >= t.stop_voltage;
    }

    /// Consume the change latch.
    pub fn take_change(&mut self) -> bool {
        std::mem::take(&mut self.change_pending)
    }

    pub fn average(&self) -> f32 {
        self.average
    }

    pub fn latest(&self) -> f32 {
        self.latest
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_close(&self) -> bool {
        self.close
    }

    pub fn should_stop(&self) -> bool {
        self.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ProximityThresholds {
        ProximityThresholds {
            window: 4,
            error_voltage: 0.2,
            min_stable_samples: 3,
            close_voltage: 2.0,
            stop_voltage: 3.0,
            peak_voltage: 5.0,
            change_threshold: 0.5,
        }
    }

    #[test]
    fn fresh_filter_is_neutral() {
        let f = ProximityFilter::new(thresholds());
        assert!(!f.is_constant());
        assert!(!f.is_close());
        assert!(!f.should_stop());
        assert_eq!(f.average(), 0.0);
    }

    #[test]
    fn average_rolls_over_window() {
        let mut f = ProximityFilter::new(thresholds());
        for v in [1.0, 1.0, 1.0, 1.0, 3.0] {
            f.push(v);
        }
        // Window now holds [1, 1, 1, 3].
        assert!((f.average() - 1.5).abs() < 1e-6);
        assert_eq!(f.latest(), 3.0);
    }

    #[test]
    fn becomes_constant_after_stable_run() {
        let mut f = ProximityFilter::new(thresholds());
        f.push(1.0);
        f.push(1.05);
        assert!(!f.is_constant());
        f.push(0.95);
        assert!(f.is_constant());
    }

    #[test]
    fn jitter_breaks_the_stable_run() {
        let mut f = ProximityFilter::new(thresholds());
        for _ in 0..5 {
            f.push(1.0);
        }
        assert!(f.is_constant());
        f.push(1.4);
        assert!(!f.is_constant());
    }

    #[test]
    fn close_and_stop_follow_the_average() {
        let mut f = ProximityFilter::new(thresholds());
        for _ in 0..4 {
            f.push(2.5);
        }
        assert!(f.is_close());
        assert!(!f.should_stop());
        for _ in 0..4 {
            f.push(3.5);
        }
        assert!(f.should_stop());
    }

    #[test]
    fn samples_above_peak_are_clamped() {
        let mut f = ProximityFilter::new(ProximityThresholds {
            peak_voltage: 3.2,
            ..thresholds()
        });
        f.push(4.5);
        assert!((f.latest() - 3.2).abs() < 1e-6);
    }

    #[test]
    fn change_latches_once_per_settled_level() {
        let mut f = ProximityFilter::new(thresholds());
        for _ in 0..5 {
            f.push(1.0);
        }
        assert!(!f.take_change());

        f.push(2.0);
        assert!(f.take_change());
        assert!(!f.take_change());

        // Still moving, not yet settled: no new event.
        f.push(2.0);
        assert!(!f.take_change());
    }

    #[test]
    fn step_inside_error_band_still_latches_change() {
        // The 0.8 V step stays inside the 1 V stability band, so the reading
        // never stops counting as constant on its own.
        let mut f = ProximityFilter::new(ProximityThresholds {
            error_voltage: 1.0,
            ..thresholds()
        });
        for _ in 0..5 {
            f.push(2.5);
        }
        assert!(f.is_constant());

        let mut changes = 0;
        for _ in 0..20 {
            f.push(3.3);
            if f.take_change() {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
        assert!(f.is_constant());
        assert!((f.average() - 3.3).abs() < 1e-5);
    }

    #[test]
    fn no_change_without_a_settled_level() {
        let mut f = ProximityFilter::new(thresholds());
        f.push(0.5);
        f.push(3.0);
        assert!(!f.take_change());
    }
}
