//! [`StartupMonitor`] – bounded setup supervision.
//!
//! Sensor setup routines are synchronous and may legitimately take seconds
//! (the gyro and compass calibrations).  There is no way to cancel one
//! midway, so the monitor measures each run against the component's time
//! budget on the supplied [`Clock`] and turns an overrun into
//! [`SensorError::SetupTimeout`], even when the routine itself reported
//! success.  The caller decides what to do with a failed component.

use seeker_hal::Clock;
use seeker_types::SensorError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one supervised setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartupStatus {
    /// Setup finished inside its budget.
    Ready { elapsed_ms: u64 },
    /// Setup returned an error, or overran its budget.
    Failed { error: SensorError },
}

/// One row of the startup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStartup {
    pub component: String,
    pub limit_ms: u64,
    pub status: StartupStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// StartupMonitor
// ────────────────────────────────────────────────────────────────────────────

/// Runs setup closures against per-component time budgets and keeps a record
/// of the outcomes.
///
/// # Example
///
/// ```
/// use seeker_hal::Clock;
/// use seeker_hal::sim::SimClock;
/// use seeker_runtime::startup::StartupMonitor;
/// use seeker_types::SensorError;
///
/// let mut clock = SimClock::new(0);
/// let mut monitor = StartupMonitor::new();
///
/// let slow = monitor.run("gyro", 100, &mut clock, |c| {
///     c.delay_ms(250);
///     Ok(())
/// });
/// assert!(matches!(slow, Err(SensorError::SetupTimeout { .. })));
/// assert!(!monitor.all_ready());
/// ```
#[derive(Debug, Default)]
pub struct StartupMonitor {
    record: Vec<ComponentStartup>,
}

impl StartupMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `setup` for `component` and check it finished within `limit_ms`.
    ///
    /// Running the same component again replaces its earlier record.
    ///
    /// # Errors
    ///
    /// The error returned by `setup`, or [`SensorError::SetupTimeout`] when
    /// it succeeded but took longer than `limit_ms`.
    pub fn run<T, F>(
        &mut self,
        component: &str,
        limit_ms: u64,
        clock: &mut dyn Clock,
        setup: F,
    ) -> Result<T, SensorError>
    where
        F: FnOnce(&mut dyn Clock) -> Result<T, SensorError>,
    {
        let started = clock.now_ms();
        let outcome = setup(&mut *clock);
        let elapsed_ms = clock.now_ms().saturating_sub(started);

        let result = match outcome {
            Ok(_) if elapsed_ms > limit_ms => Err(SensorError::SetupTimeout {
                component: component.to_string(),
                limit_ms,
                elapsed_ms,
            }),
            other => other,
        };

        let status = match &result {
            Ok(_) => {
                info!(component, elapsed_ms, "setup complete");
                StartupStatus::Ready { elapsed_ms }
            }
            Err(e) => {
                warn!(component, elapsed_ms, limit_ms, error = %e, "setup failed");
                StartupStatus::Failed { error: e.clone() }
            }
        };
        self.record.retain(|entry| entry.component != component);
        self.record.push(ComponentStartup {
            component: component.to_string(),
            limit_ms,
            status,
        });
        result
    }

    /// Status of `component`, or `None` if it was never run.
    pub fn status(&self, component: &str) -> Option<&StartupStatus> {
        self.record
            .iter()
            .find(|entry| entry.component == component)
            .map(|entry| &entry.status)
    }

    /// `true` when `component` ran and failed.  A component that never ran
    /// has not failed.
    pub fn has_failed(&self, component: &str) -> bool {
        matches!(self.status(component), Some(StartupStatus::Failed { .. }))
    }

    /// `true` when at least one component ran and none failed.
    pub fn all_ready(&self) -> bool {
        !self.record.is_empty()
            && self
                .record
                .iter()
                .all(|entry| matches!(entry.status, StartupStatus::Ready { .. }))
    }

    /// Names of the components whose setup failed, in run order.
    pub fn failed(&self) -> Vec<String> {
        self.record
            .iter()
            .filter(|entry| matches!(entry.status, StartupStatus::Failed { .. }))
            .map(|entry| entry.component.clone())
            .collect()
    }

    /// The full record, in run order.
    pub fn record(&self) -> &[ComponentStartup] {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_hal::sim::SimClock;

    #[test]
    fn fast_setup_is_ready() {
        let mut clock = SimClock::new(1_000);
        let mut monitor = StartupMonitor::new();
        let value = monitor
            .run("visual", 500, &mut clock, |c| {
                c.delay_ms(40);
                Ok(7)
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(
            monitor.status("visual"),
            Some(&StartupStatus::Ready { elapsed_ms: 40 })
        );
        assert!(monitor.all_ready());
    }

    #[test]
    fn budget_is_inclusive() {
        let mut clock = SimClock::new(0);
        let mut monitor = StartupMonitor::new();
        assert!(
            monitor
                .run("gyro", 100, &mut clock, |c| {
                    c.delay_ms(100);
                    Ok(())
                })
                .is_ok()
        );
    }

    #[test]
    fn overrun_becomes_timeout() {
        let mut clock = SimClock::new(0);
        let mut monitor = StartupMonitor::new();
        let err = monitor
            .run("compass", 1_000, &mut clock, |c| {
                c.delay_ms(1_500);
                Ok(())
            })
            .unwrap_err();
        assert_eq!(
            err,
            SensorError::SetupTimeout {
                component: "compass".to_string(),
                limit_ms: 1_000,
                elapsed_ms: 1_500,
            }
        );
        assert_eq!(monitor.failed(), vec!["compass".to_string()]);
        assert!(monitor.has_failed("compass"));
    }

    #[test]
    fn has_failed_tracks_the_latest_run() {
        let mut clock = SimClock::new(0);
        let mut monitor = StartupMonitor::new();
        assert!(!monitor.has_failed("gyro"));

        let _ = monitor.run("gyro", 50, &mut clock, |c| {
            c.delay_ms(80);
            Ok(())
        });
        assert!(monitor.has_failed("gyro"));

        monitor.run("gyro", 50, &mut clock, |_| Ok(())).unwrap();
        assert!(!monitor.has_failed("gyro"));
    }

    #[test]
    fn setup_error_is_recorded_and_returned() {
        let mut clock = SimClock::new(0);
        let mut monitor = StartupMonitor::new();
        let result: Result<(), _> = monitor.run("gyro", 100, &mut clock, |_| {
            Err(SensorError::NotReady("gyro".to_string()))
        });
        assert!(result.is_err());
        assert!(matches!(
            monitor.status("gyro"),
            Some(StartupStatus::Failed { .. })
        ));
        assert!(!monitor.all_ready());
    }

    #[test]
    fn rerun_replaces_record() {
        let mut clock = SimClock::new(0);
        let mut monitor = StartupMonitor::new();
        let _ = monitor.run("visual", 10, &mut clock, |_| {
            Err::<(), _>(SensorError::NotReady("visual".to_string()))
        });
        monitor.run("visual", 10, &mut clock, |_| Ok(())).unwrap();
        assert_eq!(monitor.record().len(), 1);
        assert!(monitor.all_ready());
    }

    #[test]
    fn unknown_component_has_no_status() {
        let monitor = StartupMonitor::new();
        assert!(monitor.status("ghost").is_none());
        assert!(!monitor.all_ready());
    }
}
