use crate::fold::TimingParameters;
use crate::pulse_plot::{TimingSource, DEFAULT_LABEL};
use crate::utils::DynError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "NICER Her X-1 reduction and energy-resolved pulse-profile tooling",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  herx1_timing --data /data/herx1 reduce --obs 4\n  herx1_timing --config herx1.toml --answers answers.txt energy --obs 4\n  herx1_timing --nbin 64 profile events_times.txt --freq 0.80775 --fdot -1.2e-9 --tstart 2.5e8\n  herx1_timing rename /data/herx1/3602020401/xti/analysis\n  herx1_timing bands --base ni3602020401_0mpu7_cl_uo500_oo30_bary_scorr\n"
)]
pub struct Args {
    /// TOML configuration file (every field optional)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory holding the observation folders (overrides data_path)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Number of phase bins per period (overrides bin_count)
    #[arg(long, global = true)]
    pub nbin: Option<usize>,

    /// Answer prompts from a file, one answer per line (empty line = default)
    #[arg(long, global = true, conflicts_with = "yes")]
    pub answers: Option<PathBuf>,

    /// Accept the default answer of every prompt
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run nicerl2 / nimaketime / niextract-events on one observation
    Reduce {
        /// Observation index (1..15), skips the observation prompt
        #[arg(long)]
        obs: Option<String>,
    },
    /// Slice into energy bands, calibrate with HENDRICS and plot aligned profiles
    Energy {
        /// Observation index (1..15), skips the observation prompt
        #[arg(long)]
        obs: Option<String>,
    },
    /// Fold one event list and plot its profile aligned to the pulse minimum
    Profile {
        /// Event list: a text list of times or a HENDRICS calibrated .nc file
        events: PathBuf,

        /// Spin frequency in Hz
        #[arg(long = "freq", visible_alias = "fr", requires = "tstart")]
        frequency: Option<f64>,

        /// Spin frequency derivative in Hz/s
        #[arg(long = "fdot", visible_alias = "frdot", allow_hyphen_values = true, default_value_t = 0.0)]
        frequency_derivative: f64,

        /// Reference epoch of the ephemeris in seconds
        #[arg(long)]
        tstart: Option<f64>,

        /// Look the ephemeris up in the timing parameter table (e.g. 3602020401_GTI1)
        #[arg(long = "timing-id", conflicts_with = "frequency")]
        timing_id: Option<String>,

        /// Legend label
        #[arg(long, default_value = DEFAULT_LABEL)]
        label: String,

        /// Output image (default: <events stem>_pp.png)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rename underonly/overonly to uo/oo in a directory's file names
    Rename {
        /// Directory to scan
        dir: PathBuf,
    },
    /// Print the configured energy bands and the file names they imply
    Bands {
        /// Base event stem used to print band file names
        #[arg(long)]
        base: Option<String>,
    },
}

pub fn parse_timing(
    frequency: Option<f64>,
    frequency_derivative: f64,
    tstart: Option<f64>,
    timing_id: Option<String>,
) -> Result<TimingSource, DynError> {
    match (frequency, tstart, timing_id) {
        (Some(frequency), Some(tstart), None) => {
            if !frequency.is_finite() || frequency <= 0.0 {
                return Err(format!("--freq must be positive, received {frequency}").into());
            }
            Ok(TimingSource::Explicit(TimingParameters {
                tstart,
                frequency,
                frequency_derivative,
            }))
        }
        (None, _, Some(id)) => {
            if id.trim().is_empty() {
                return Err("--timing-id must not be empty".into());
            }
            Ok(TimingSource::Table(id))
        }
        _ => Err("Provide either --freq with --tstart, or --timing-id".into()),
    }
}
