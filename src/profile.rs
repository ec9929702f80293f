use crate::error::{PipelineError, Result};
use crate::utils::{argmin, mean, roll, tile};

/// Number of periods laid end to end for plotting.
pub const EXTEND_PERIODS: usize = 3;

/// Divide profile and error by the mean of the profile.
pub fn normalize(profile: &[f64], error: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if profile.len() != error.len() {
        return Err(PipelineError::Data(format!(
            "profile has {} bins but its error has {}",
            profile.len(),
            error.len()
        )));
    }
    let mean_rate = mean(profile).ok_or_else(|| PipelineError::Data("empty profile".into()))?;
    if mean_rate == 0.0 || !mean_rate.is_finite() {
        return Err(PipelineError::Data(format!(
            "cannot normalize a profile with mean {mean_rate}"
        )));
    }
    Ok((
        profile.iter().map(|v| v / mean_rate).collect(),
        error.iter().map(|v| v / mean_rate).collect(),
    ))
}

/// Shift that moves the profile minimum to bin `N / 10`.
pub fn reference_shift(profile: &[f64]) -> Result<isize> {
    let min_index =
        argmin(profile).ok_or_else(|| PipelineError::Data("empty reference profile".into()))?;
    Ok((profile.len() / 10) as isize - min_index as isize)
}

/// Phase of each sample of an extended profile, `index / nbin`.
pub fn phase_axis(len: usize, nbin: usize) -> Vec<f64> {
    (0..len).map(|idx| idx as f64 / nbin as f64).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedProfile {
    pub nbin: usize,
    pub shift: isize,
    pub profile: Vec<f64>,
    pub error: Vec<f64>,
}

impl AlignedProfile {
    /// Normalize, rotate by an externally chosen `shift` and extend to three periods.
    pub fn from_folded(profile: &[f64], error: &[f64], shift: isize) -> Result<Self> {
        let (normalized, normalized_err) = normalize(profile, error)?;
        let shifted = roll(&normalized, shift);
        let shifted_err = roll(&normalized_err, shift);
        Ok(Self {
            nbin: profile.len(),
            shift,
            profile: tile(&shifted, EXTEND_PERIODS),
            error: tile(&shifted_err, EXTEND_PERIODS),
        })
    }

    /// Align a profile on its own minimum.
    pub fn self_aligned(profile: &[f64], error: &[f64]) -> Result<Self> {
        let shift = reference_shift(profile)?;
        Self::from_folded(profile, error, shift)
    }

    pub fn phase(&self) -> Vec<f64> {
        phase_axis(self.profile.len(), self.nbin)
    }

    /// One period of the shifted profile.
    pub fn period(&self) -> &[f64] {
        &self.profile[..self.nbin]
    }

    /// (max - min) / (max + min) over one period.
    pub fn pulsed_fraction(&self) -> f64 {
        let period = self.period();
        let max = period.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = period.iter().copied().fold(f64::INFINITY, f64::min);
        (max - min) / (max + min)
    }
}
