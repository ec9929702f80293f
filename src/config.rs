use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_BIN_COUNT: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_source_name")]
    pub source_name: String,
    #[serde(default = "default_bin_count")]
    pub bin_count: usize,
    #[serde(default = "default_obs_id_prefix")]
    pub obs_id_prefix: String,
    #[serde(default = "default_obs_id_suffix")]
    pub obs_id_suffix: String,
    #[serde(default = "default_obs_index_max")]
    pub obs_index_max: u32,
    #[serde(default = "default_pulse_profile_dir")]
    pub pulse_profile_dir: String,
    #[serde(default = "default_timing_parameters_file")]
    pub timing_parameters_file: String,
    #[serde(default)]
    pub intervals: IntervalMode,
    #[serde(default)]
    pub reduction: ReductionSettings,
    #[serde(default)]
    pub calibration: CalibrationSettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

/// How the PI range is cut into energy bands. Values are in keV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IntervalMode {
    Custom { boundaries: Vec<u32> },
    Equal { start: u32, end: u32, step: u32 },
}

impl Default for IntervalMode {
    fn default() -> Self {
        IntervalMode::Custom {
            boundaries: vec![5, 8, 14, 100],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionSettings {
    #[serde(default = "default_underonly_range")]
    pub underonly_range: String,
    #[serde(default = "default_overonly_range")]
    pub overonly_range: String,
    #[serde(default = "default_pi_min")]
    pub pi_min: u32,
    #[serde(default = "default_pi_max")]
    pub pi_max: u32,
    #[serde(default = "default_event_flags")]
    pub event_flags: String,
    #[serde(default = "default_screen_expr")]
    pub screen_expr: String,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            underonly_range: default_underonly_range(),
            overonly_range: default_overonly_range(),
            pi_min: default_pi_min(),
            pi_max: default_pi_max(),
            event_flags: default_event_flags(),
            screen_expr: default_screen_expr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSettings {
    #[serde(default = "default_rmf_file")]
    pub rmf_file: String,
    #[serde(default = "default_rmf_dir")]
    pub rmf_dir: PathBuf,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            rmf_file: default_rmf_file(),
            rmf_dir: default_rmf_dir(),
        }
    }
}

impl CalibrationSettings {
    pub fn rmf_path(&self) -> PathBuf {
        self.rmf_dir.join(&self.rmf_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// argv template dumping event times from a calibrated file; `{input}` and
    /// `{output}` are substituted.
    #[serde(default = "default_event_export")]
    pub event_export: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            event_export: default_event_export(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            source_name: default_source_name(),
            bin_count: default_bin_count(),
            obs_id_prefix: default_obs_id_prefix(),
            obs_id_suffix: default_obs_id_suffix(),
            obs_index_max: default_obs_index_max(),
            pulse_profile_dir: default_pulse_profile_dir(),
            timing_parameters_file: default_timing_parameters_file(),
            intervals: IntervalMode::default(),
            reduction: ReductionSettings::default(),
            calibration: CalibrationSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_source_name() -> String {
    "Her X-1".to_string()
}

fn default_bin_count() -> usize {
    DEFAULT_BIN_COUNT
}

fn default_obs_id_prefix() -> String {
    "360202".to_string()
}

fn default_obs_id_suffix() -> String {
    "01".to_string()
}

fn default_obs_index_max() -> u32 {
    15
}

fn default_pulse_profile_dir() -> String {
    "pulse_profiles".to_string()
}

fn default_timing_parameters_file() -> String {
    "timing_parameters.txt".to_string()
}

fn default_underonly_range() -> String {
    "0-500".to_string()
}

fn default_overonly_range() -> String {
    "0-30".to_string()
}

fn default_pi_min() -> u32 {
    30
}

fn default_pi_max() -> u32 {
    1200
}

fn default_event_flags() -> String {
    "bxxx1x000".to_string()
}

fn default_screen_expr() -> String {
    "SUN_ANGLE>60 && KP<5".to_string()
}

fn default_rmf_file() -> String {
    "nixtiref20170601v003.rmf".to_string()
}

fn default_rmf_dir() -> PathBuf {
    PathBuf::from("caldb/data/nicer/xti/cpf/rmf")
}

fn default_event_export() -> Vec<String> {
    [
        "python3",
        "-c",
        "import sys, numpy as np; from hendrics.io import load_events; \
         np.savetxt(sys.argv[2], load_events(sys.argv[1]).time, fmt='%.9f')",
        "{input}",
        "{output}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bin_count == 0 {
            return Err(PipelineError::Config("bin_count must be at least 1".into()));
        }
        if self.obs_index_max == 0 {
            return Err(PipelineError::Config(
                "obs_index_max must be at least 1".into(),
            ));
        }
        match &self.intervals {
            IntervalMode::Custom { boundaries } => {
                if boundaries.len() < 2 {
                    return Err(PipelineError::Config(
                        "custom intervals need at least two boundaries".into(),
                    ));
                }
                if boundaries.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(PipelineError::Config(format!(
                        "custom boundaries must be strictly increasing: {boundaries:?}"
                    )));
                }
            }
            IntervalMode::Equal { start, end, step } => {
                if *step == 0 {
                    return Err(PipelineError::Config("equal interval step must be > 0".into()));
                }
                if start >= end {
                    return Err(PipelineError::Config(format!(
                        "equal interval start ({start}) must be below end ({end})"
                    )));
                }
            }
        }
        if self.reduction.pi_min >= self.reduction.pi_max {
            return Err(PipelineError::Config(
                "reduction.pi_min must be below reduction.pi_max".into(),
            ));
        }
        let export = &self.tools.event_export;
        if export.is_empty() || export[0].trim().is_empty() {
            return Err(PipelineError::Config(
                "tools.event_export must name a program".into(),
            ));
        }
        Ok(())
    }

    pub fn timing_parameters_path(&self) -> PathBuf {
        self.data_path.join(&self.timing_parameters_file)
    }
}
