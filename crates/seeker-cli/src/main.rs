//! `seeker-cli` – runs the seeker sensor stack from the command line.
//!
//! The binary:
//!
//! 1. Loads `~/.seeker/config.toml` (or `--config`), applies `SEEKER_*`
//!    environment overrides and then command-line flags.
//! 2. Wires simulated camera, IR, gyro and magnetometer devices into a
//!    [`SensorSuite`] and runs its supervised setup.  When no compass
//!    calibration is stored yet, a calibration sweep runs instead.
//! 3. Ticks the suite `iterations` times at `loop_period_ms`, printing each
//!    snapshot as coloured text or JSON lines.
//! 4. Stops early and cleanly on **Ctrl-C**.

mod cli;
mod config;
mod rig;

use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use seeker_hal::sim::SimClock;
use seeker_hal::{CalibrationStore, Clock, FileStore, SystemClock};
use seeker_perception::CompassMode;
use seeker_runtime::{SensorSnapshot, SensorSuite, StartupStatus};

use crate::cli::Cli;
use crate::config::Config;
use crate::rig::SimRig;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); SEEKER_LOG_FORMAT=json
    // switches to newline-delimited JSON.  Snapshots still go to stdout.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("SEEKER_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let args = Cli::parse();

    // ── Configuration ─────────────────────────────────────────────────────
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_or_default(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    args.apply(&mut cfg);

    if args.save_config {
        match config::save_to(&cfg, &path) {
            Ok(()) => eprintln!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping after this iteration …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will abort immediately");
    }

    if let Err(e) = run(&cfg, &args, &shutdown) {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cfg: &Config, args: &Cli, shutdown: &AtomicBool) -> Result<(), String> {
    let mut store = FileStore::new(cfg.calibration_path());
    let mut loop_cfg = cfg.control_loop;

    if loop_cfg.compass_mode == CompassMode::Load {
        match store.load_compass() {
            Ok(Some(_)) => {}
            Ok(None) => {
                eprintln!(
                    "  No compass calibration at {}; running a calibration sweep.",
                    store.path().display().to_string().bold()
                );
                loop_cfg.compass_mode = CompassMode::Calibrate;
            }
            Err(e) => {
                eprintln!("  {}: {}; recalibrating.", "Stored calibration unusable".yellow(), e);
                loop_cfg.compass_mode = CompassMode::Calibrate;
            }
        }
    }

    let mut rig = SimRig::new(&cfg.sim, args.seed);
    let mut suite = rig.build_suite(cfg, loop_cfg).map_err(|e| e.to_string())?;
    let mut clock: Box<dyn Clock> = if cfg.realtime {
        Box::new(SystemClock::new())
    } else {
        Box::new(SimClock::new(0))
    };

    // ── Setup ─────────────────────────────────────────────────────────────
    rig.prepare_setup(loop_cfg.compass_mode, cfg.compass.calibration_samples);
    let setup = suite.setup(&mut store, clock.as_mut());
    print_startup(&suite);
    setup.map_err(|e| format!("sensor setup failed: {e}"))?;
    rig.start_motion(cfg.gyro.scale_factor_z);

    // ── Control loop ──────────────────────────────────────────────────────
    let start = clock.now_ms();
    let mut last = None;
    for _ in 0..cfg.iterations {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let now = clock.now_ms();
        rig.drive(now.saturating_sub(start));
        let snapshot = suite.tick(now);
        if args.json {
            let line = serde_json::to_string(&snapshot)
                .map_err(|e| format!("Failed to encode snapshot: {e}"))?;
            println!("{line}");
        } else {
            print_snapshot(&snapshot);
        }
        last = Some(snapshot);
        clock.delay_ms(loop_cfg.loop_period_ms);
    }

    info!(ticks = suite.ticks(), "control loop finished");
    if !args.json
        && let Some(snapshot) = last
    {
        eprintln!(
            "\n  {} ticks, fish signature {}{}",
            suite.ticks().to_string().bold(),
            snapshot.fish_signature.to_string().bold(),
            if snapshot.fish_signature_confident { "" } else { " (unconfirmed)" }
        );
    }
    Ok(())
}

fn print_startup(suite: &SensorSuite) {
    for entry in suite.startup().record() {
        match &entry.status {
            StartupStatus::Ready { elapsed_ms } => eprintln!(
                "  {} {:<8} ready in {} ms",
                "✓".green(),
                entry.component,
                elapsed_ms
            ),
            StartupStatus::Failed { error } => eprintln!(
                "  {} {:<8} {}",
                "✗".red(),
                entry.component,
                error.to_string().red()
            ),
        }
    }
}

fn print_snapshot(s: &SensorSnapshot) {
    let target = match s.target {
        Some(b) => {
            let text = format!("sig {} @ ({:>3},{:>3})", b.signature, b.x, b.y);
            if s.target_centered {
                text.green().to_string()
            } else {
                text
            }
        }
        None if s.stalled => "stalled".red().to_string(),
        None => "none".dimmed().to_string(),
    };
    let proximity = if s.stop {
        "STOP".red().bold().to_string()
    } else if s.close {
        "close".yellow().to_string()
    } else {
        "clear".dimmed().to_string()
    };
    println!(
        "t={:>7} ms  gyro {:>6.1}°  compass {:>6.1}°  target {}  ir {:.2} V {}{}",
        s.time_ms,
        s.gyro_heading,
        s.compass_heading,
        target,
        s.ir_volts,
        proximity,
        if s.ir_changed { " (changed)".cyan().to_string() } else { String::new() }
    );
}
