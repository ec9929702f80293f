use std::fs;
use std::path::Path;

use regex::Regex;

use crate::config::IntervalMode;
use crate::error::{PipelineError, Result};

/// PI channels per keV.
pub const PI_PER_KEV: u32 = 10;
pub const XSELECT_SCRIPT: &str = "process_all.xcm";

/// Half-open band `[lo_kev, hi_kev)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnergyBand {
    pub lo_kev: u32,
    pub hi_kev: u32,
}

impl EnergyBand {
    pub fn new(lo_kev: u32, hi_kev: u32) -> Self {
        Self { lo_kev, hi_kev }
    }

    pub fn pi_bounds(&self) -> (u32, u32) {
        (self.lo_kev * PI_PER_KEV, self.hi_kev * PI_PER_KEV)
    }

    pub fn label(&self) -> String {
        format!("{}-{}keV", self.lo_kev, self.hi_kev)
    }

    fn tag(&self) -> String {
        format!("E{}_{}", self.lo_kev, self.hi_kev)
    }

    pub fn event_file(&self, base: &str) -> String {
        format!("{base}_{}.evt", self.tag())
    }

    pub fn calib_file(&self, base: &str) -> String {
        calib_file_name(&format!("{base}_{}", self.tag()))
    }

    pub fn plot_file(&self) -> String {
        format!("herx1_nicer_pp_en_{}.png", self.label())
    }
}

/// HENreadevents output for `{stem}.evt`.
pub fn ev_file_name(stem: &str) -> String {
    format!("{stem}_nicer_xti_ev.nc")
}

/// HENcalibrate output for `{stem}.evt`.
pub fn calib_file_name(stem: &str) -> String {
    format!("{stem}_nicer_xti_ev_calib.nc")
}

/// Cut the configured keV range into adjacent, non-overlapping bands.
pub fn partition(mode: &IntervalMode) -> Result<Vec<EnergyBand>> {
    match mode {
        IntervalMode::Custom { boundaries } => {
            if boundaries.len() < 2 || boundaries.windows(2).any(|w| w[0] >= w[1]) {
                return Err(PipelineError::Config(format!(
                    "custom boundaries must hold two or more increasing values: {boundaries:?}"
                )));
            }
            Ok(boundaries
                .windows(2)
                .map(|w| EnergyBand::new(w[0], w[1]))
                .collect())
        }
        IntervalMode::Equal { start, end, step } => {
            if *step == 0 || start >= end {
                return Err(PipelineError::Config(format!(
                    "equal intervals need start < end and step > 0 (start={start}, end={end}, step={step})"
                )));
            }
            let mut bands = Vec::new();
            let mut lo = *start;
            while lo < *end {
                let hi = lo.saturating_add(*step).min(*end);
                bands.push(EnergyBand::new(lo, hi));
                lo = hi;
            }
            Ok(bands)
        }
    }
}

/// Directory holding one energy-resolved analysis, keyed by interval mode and bin count.
pub fn output_dir_name(mode: &IntervalMode, nbin: usize) -> String {
    match mode {
        IntervalMode::Custom { boundaries } => {
            let joined: Vec<String> = boundaries.iter().map(|b| b.to_string()).collect();
            format!("energy_resolved_pp_E{}_bin{nbin}", joined.join("-"))
        }
        IntervalMode::Equal { step, .. } => format!("energy_resolved_pp_it{step}_bin{nbin}"),
    }
}

/// xselect command script slicing `{base}.evt` into one file per band.
pub fn xselect_script(base: &str, bands: &[EnergyBand]) -> String {
    let read = format!("read events {base}.evt\n.\n");
    let mut script = String::from("xsel1\n");
    script.push_str(&read);
    script.push_str("yes\n");
    for band in bands {
        let (pi_lo, pi_hi) = band.pi_bounds();
        script.push_str(&format!("filter column \"PI={pi_lo}:{pi_hi}\"\n"));
        script.push_str("extract events\n");
        script.push_str(&format!("save events {}\n", band.event_file(base)));
        // keep the unfiltered list as input
        script.push_str("no\n");
        script.push_str("clear all\nyes\n");
        script.push_str(&read);
    }
    script.push_str("quit\nno\n");
    script
}

/// Band event files already sliced from `base` inside `dir`, sorted by energy.
pub fn discover_band_files(dir: &Path, base: &str) -> Result<Vec<EnergyBand>> {
    let pattern = Regex::new(&format!(r"^{}_E(\d+)_(\d+)\.evt$", regex::escape(base)))
        .map_err(|e| PipelineError::Data(format!("bad band pattern: {e}")))?;
    let mut bands = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(caps) = pattern.captures(&name) {
            let lo = caps[1].parse::<u32>();
            let hi = caps[2].parse::<u32>();
            if let (Ok(lo), Ok(hi)) = (lo, hi) {
                bands.push(EnergyBand::new(lo, hi));
            }
        }
    }
    bands.sort();
    Ok(bands)
}
