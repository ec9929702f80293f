use log::{info, warn};

use crate::config::{Config, ReductionSettings};
use crate::error::{PipelineError, Result};
use crate::layout::ObservationLayout;
use crate::prompt::{ask_range, ask_yes_no, parse_range, InputProvider};
use crate::stage::{stamp_path, ExternalCommand, Stage, StageExecutor, Workspace};

/// Upper limit of a `low-high` count range as it appears in file names, e.g. `500` for `0-500`.
/// Names are matched back with `uo(\d+)`, so the limit must be a whole number.
pub fn range_upper(range: &str) -> Result<String> {
    let (_, high) = parse_range(range)
        .map_err(|e| PipelineError::InvalidUserInput(format!("'{range}': {e}")))?;
    if !high.is_finite() || high < 0.0 || high.fract() != 0.0 {
        return Err(PipelineError::InvalidUserInput(format!(
            "'{range}': the upper limit must be a whole number of counts"
        )));
    }
    Ok(format!("{}", high as u64))
}

fn screening(underonly: &str, overonly: &str) -> String {
    format!("underonly_range={underonly} overonly_range={overonly}")
}

pub fn calmerge_stage(layout: &ObservationLayout) -> Stage {
    Stage::run(
        "nicerl2 CALMERGE,MKF",
        ExternalCommand::new("nicerl2")
            .arg(format!("indir={}", layout.obs_id))
            .args(["clobber=yes", "tasks=CALMERGE,MKF"])
            .current_dir(&layout.data_path)
            .stdout_to(layout.nicerl2_log()),
        vec![layout.mkf()],
    )
}

pub fn screen_stage(layout: &ObservationLayout, underonly: &str, overonly: &str) -> Stage {
    Stage::run(
        "nicerl2 SCREEN",
        ExternalCommand::new("nicerl2")
            .arg(layout.obs_id.clone())
            .args(["clobber=YES", "tasks=SCREEN"])
            .arg(format!("overonly_range={overonly}"))
            .arg(format!("underonly_range={underonly}"))
            .current_dir(&layout.data_path),
        vec![layout.cleaned_events()],
    )
    .stamped(
        stamp_path(&layout.cleaned_events()),
        screening(underonly, overonly),
    )
}

pub fn maketime_stage(
    layout: &ObservationLayout,
    settings: &ReductionSettings,
    underonly: &str,
    overonly: &str,
) -> Stage {
    Stage::run(
        "nimaketime",
        ExternalCommand::new("nimaketime")
            .arg(format!("infile={}", layout.mkf().display()))
            .arg(format!("outfile={}", layout.mkf_gti().display()))
            .arg("cleanup=YES")
            .arg(format!("underonly_range={underonly}"))
            .arg(format!("overonly_range={overonly}"))
            .arg(format!("expr={}", settings.screen_expr))
            .args(["chatter=5", "clobber=yes"]),
        vec![layout.mkf_gti()],
    )
    .stamped(
        stamp_path(&layout.mkf_gti()),
        format!("{} expr={}", screening(underonly, overonly), settings.screen_expr),
    )
}

pub fn copy_events_stage(layout: &ObservationLayout, underonly: &str, overonly: &str) -> Stage {
    let target = layout.analysis_dir().join(layout.cleaned_event_name());
    let stamp = stamp_path(&target);
    Stage::copy("copy cleaned events", layout.cleaned_events(), target)
        .stamped(stamp, screening(underonly, overonly))
}

pub fn extract_stage(
    layout: &ObservationLayout,
    settings: &ReductionSettings,
    underonly: &str,
    overonly: &str,
) -> Result<Stage> {
    let source = layout.analysis_dir().join(layout.cleaned_event_name());
    let output = layout.extracted_events(&range_upper(underonly)?, &range_upper(overonly)?);
    let stamp = format!(
        "{} PI={}:{} EVENT_FLAGS={}",
        screening(underonly, overonly),
        settings.pi_min,
        settings.pi_max,
        settings.event_flags
    );
    let stage = Stage::run(
        "niextract-events",
        ExternalCommand::new("niextract-events")
            .arg(format!(
                "filename={}[PI={}:{},EVENT_FLAGS={}]",
                source.display(),
                settings.pi_min,
                settings.pi_max,
                settings.event_flags
            ))
            .arg(format!("eventsout={}", output.display()))
            .arg(format!("timefile={}", layout.mkf_gti().display()))
            .args(["gti=GTI", "chatter=5"]),
        vec![output.clone()],
    )
    .stamped(stamp_path(&output), stamp);
    Ok(stage)
}

pub fn run<W: Workspace>(
    config: &Config,
    input: &mut dyn InputProvider,
    executor: &mut StageExecutor<W>,
    obs_id: &str,
) -> Result<()> {
    let layout = ObservationLayout::new(&config.data_path, obs_id);
    let settings = &config.reduction;

    if ask_yes_no(input, "Run nicerl2 for CALMERGE and MKF?", true)? {
        info!("CALMERGE merges the calibrated per-MPU event lists; MKF rebuilds the filter file.");
        executor.execute(&calmerge_stage(&layout))?;
    }

    let mut underonly = settings.underonly_range.clone();
    let mut overonly = settings.overonly_range.clone();
    if ask_yes_no(input, "Change the OVER_ONLY and UNDER_ONLY count ranges?", true)? {
        underonly = ask_range(input, "Enter new UNDER_ONLY range", &underonly)?;
        overonly = ask_range(input, "Enter new OVER_ONLY range", &overonly)?;
    }
    info!("Using UNDER_ONLY range: {underonly}");
    info!("Using OVER_ONLY range: {overonly}");
    // reject a bad range before anything is spawned
    range_upper(&underonly)?;
    range_upper(&overonly)?;

    let screen = screen_stage(&layout, &underonly, &overonly);
    if ask_yes_no(input, "Run nicerl2 with the SCREEN task?", false)? {
        executor.execute(&screen)?;
    } else if let Some(stamp) = &screen.stamp {
        if let Some(previous) = executor.workspace().read_stamp(&stamp.path) {
            if previous != stamp.content {
                warn!(
                    "{} was screened with {previous}, not {}",
                    layout.cleaned_events().display(),
                    stamp.content
                );
            }
        }
    }

    if ask_yes_no(input, "Filter by KP index and SUN_ANGLE?", true)? {
        executor.execute(&maketime_stage(&layout, settings, &underonly, &overonly))?;
    }

    if ask_yes_no(input, "Make the analysis directory?", true)? {
        let dir = layout.analysis_dir();
        executor.workspace_mut().create_dir_all(&dir)?;
        info!("Analysis directory: {}", dir.display());
    }

    if ask_yes_no(input, "Copy the cleaned event file to the analysis directory?", true)? {
        executor.execute(&copy_events_stage(&layout, &underonly, &overonly))?;
    }

    if ask_yes_no(input, "Run niextract-events?", true)? {
        executor.execute(&extract_stage(&layout, settings, &underonly, &overonly)?)?;
    }
    Ok(())
}
