use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use seeker_perception::CompassMode;

/// Seeker: runs the target-tracking sensor stack against simulated devices.
///
/// Flags given here take precedence over the config file and the `SEEKER_*`
/// environment variables.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file (default `~/.seeker/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of control-loop iterations to run.
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Sweep a fresh compass calibration instead of loading the stored one.
    #[arg(long, default_value_t = false)]
    pub calibrate: bool,

    /// Print one JSON object per iteration instead of coloured text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Seed for the simulated sensor noise.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Pace the loop against the wall clock instead of simulated time.
    #[arg(long, default_value_t = false)]
    pub realtime: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long, default_value_t = false)]
    pub save_config: bool,
}

impl Cli {
    /// Fold command-line overrides into `cfg`.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(n) = self.iterations {
            cfg.iterations = n;
        }
        if self.calibrate {
            cfg.control_loop.compass_mode = CompassMode::Calibrate;
        }
        if self.realtime {
            cfg.realtime = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_flags() {
        let cli = Cli::try_parse_from(["seeker"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.calibrate && !cli.json && !cli.realtime && !cli.save_config);
        assert_eq!(cli.seed, 7);

        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "seeker",
            "--config",
            "/tmp/seeker.toml",
            "-n",
            "5",
            "--calibrate",
            "--json",
            "--seed",
            "99",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/seeker.toml")));
        assert!(cli.json);
        assert_eq!(cli.seed, 99);

        let mut cfg = Config::default();
        cli.apply(&mut cfg);
        assert_eq!(cfg.iterations, 5);
        assert_eq!(cfg.control_loop.compass_mode, CompassMode::Calibrate);
    }

    #[test]
    fn bad_iteration_count_is_rejected() {
        assert!(Cli::try_parse_from(["seeker", "--iterations", "lots"]).is_err());
    }
}
