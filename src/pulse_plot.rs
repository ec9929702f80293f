use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::Config;
use crate::ephemeris::load_timing_parameters;
use crate::error::{PipelineError, Result};
use crate::events::EventLoader;
use crate::fold::{Folder, TimingParameters};
use crate::layout::describe_event_file;
use crate::plot::plot_pulse_profile;
use crate::profile::AlignedProfile;

pub const DEFAULT_LABEL: &str = "1.4-10keV";

/// Where the spin ephemeris for a single-file plot comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingSource {
    Explicit(TimingParameters),
    /// Row key in the timing parameter table, e.g. `3602020401_GTI1`.
    Table(String),
}

#[derive(Debug, Clone)]
pub struct ProfileRequest {
    pub events: PathBuf,
    pub timing: TimingSource,
    pub label: String,
    pub output: Option<PathBuf>,
}

pub fn resolve_timing(config: &Config, source: &TimingSource) -> Result<TimingParameters> {
    match source {
        TimingSource::Explicit(timing) => Ok(*timing),
        TimingSource::Table(key) => load_timing_parameters(&config.timing_parameters_path(), key),
    }
}

/// `{dir}/{stem}_pp.png` next to the event file.
pub fn default_output(events: &Path) -> PathBuf {
    let stem = events
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events".to_string());
    events.with_file_name(format!("{stem}_pp.png"))
}

pub fn profile_title(config: &Config, events: &Path) -> String {
    let name = events
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (obs, gti) = describe_event_file(&name);
    let mut title = config.source_name.clone();
    if let Some(obs) = obs {
        title.push_str(&format!(", {obs}"));
        if let Some(gti) = gti {
            title.push_str(&format!(" {gti}"));
        }
    }
    title.push_str(", Aligned to Min Phase");
    title
}

/// Load, fold and self-align one event list.
pub fn build_profile(
    loader: &mut dyn EventLoader,
    folder: &dyn Folder,
    events: &Path,
    timing: &TimingParameters,
    nbin: usize,
) -> Result<AlignedProfile> {
    let list = loader.load(events)?;
    info!("{} events loaded from {}", list.len(), events.display());
    let folded = folder.fold(&list, timing, nbin)?;
    debug!(
        "Folded into {} bins of width {:.4}",
        folded.phase.len(),
        1.0 / nbin as f64
    );
    AlignedProfile::self_aligned(&folded.profile, &folded.error)
}

pub fn run(
    config: &Config,
    request: &ProfileRequest,
    loader: &mut dyn EventLoader,
    folder: &dyn Folder,
) -> Result<PathBuf> {
    let timing = resolve_timing(config, &request.timing)?;
    let aligned = build_profile(loader, folder, &request.events, &timing, config.bin_count)?;
    info!(
        "Profile minimum moved by {} bins, pulsed fraction {:.3}",
        aligned.shift,
        aligned.pulsed_fraction()
    );

    let output = request
        .output
        .clone()
        .unwrap_or_else(|| default_output(&request.events));
    let title = profile_title(config, &request.events);
    plot_pulse_profile(
        &aligned.phase(),
        &aligned.profile,
        &aligned.error,
        &title,
        &request.label,
        &output,
    )
    .map_err(|e| PipelineError::Plot(e.to_string()))?;
    info!("Wrote {}", output.display());
    Ok(output)
}
