use crate::error::{PipelineError, Result};
use crate::events::EventList;

/// Spin ephemeris used for folding one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParameters {
    /// Reference epoch (same time system as the events), s.
    pub tstart: f64,
    /// Spin frequency, Hz.
    pub frequency: f64,
    /// Spin frequency derivative, Hz/s.
    pub frequency_derivative: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FoldedProfile {
    /// Bin centres in phase.
    pub phase: Vec<f64>,
    /// Raw counts per bin.
    pub profile: Vec<f64>,
    /// Poisson error per bin.
    pub error: Vec<f64>,
}

pub trait Folder {
    fn fold(&self, events: &EventList, timing: &TimingParameters, nbin: usize)
        -> Result<FoldedProfile>;
}

/// Unweighted folding, phase = f (t - t0) + fdot (t - t0)^2 / 2.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpochFolder;

pub fn pulse_phase(t: f64, timing: &TimingParameters) -> f64 {
    let dt = t - timing.tstart;
    timing.frequency * dt + 0.5 * timing.frequency_derivative * dt * dt
}

impl Folder for EpochFolder {
    fn fold(
        &self,
        events: &EventList,
        timing: &TimingParameters,
        nbin: usize,
    ) -> Result<FoldedProfile> {
        if nbin == 0 {
            return Err(PipelineError::Data("cannot fold into zero bins".into()));
        }
        if events.is_empty() {
            return Err(PipelineError::Data("no events to fold".into()));
        }
        if !timing.frequency.is_finite() || timing.frequency <= 0.0 {
            return Err(PipelineError::Data(format!(
                "spin frequency must be positive, got {}",
                timing.frequency
            )));
        }
        let mut counts = vec![0.0f64; nbin];
        for &t in events.times() {
            let phase = pulse_phase(t, timing);
            let frac = phase - phase.floor();
            let bin = ((frac * nbin as f64) as usize).min(nbin - 1);
            counts[bin] += 1.0;
        }
        let width = 1.0 / nbin as f64;
        Ok(FoldedProfile {
            phase: (0..nbin).map(|i| (i as f64 + 0.5) * width).collect(),
            error: counts.iter().map(|c| c.sqrt()).collect(),
            profile: counts,
        })
    }
}
