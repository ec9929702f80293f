use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::config::Config;
use crate::energy::{
    calib_file_name, discover_band_files, ev_file_name, output_dir_name, partition,
    xselect_script, EnergyBand, XSELECT_SCRIPT,
};
use crate::error::{PipelineError, Result};
use crate::events::{CalibratedEventLoader, EventLoader};
use crate::fold::{EpochFolder, Folder, TimingParameters};
use crate::layout::{
    find_base_events, list_gti_folders, obs_id_gti, BaseName, GtiSelection, ObservationLayout,
};
use crate::plot::plot_pulse_profile;
use crate::profile::{reference_shift, AlignedProfile};
use crate::prompt::{ask_choice, ask_yes_no, InputProvider};
use crate::stage::{ExternalCommand, Stage, StageExecutor, Workspace};
use crate::ephemeris::load_timing_parameters;

/// Where one energy-resolved analysis reads and writes.
#[derive(Debug, Clone)]
pub struct AnalysisTarget {
    pub work_dir: PathBuf,
    pub gti: Option<GtiSelection>,
    pub base: BaseName,
    pub timing: TimingParameters,
}

/// Pick the GTI folder, look up its ephemeris and find the barycentred event list.
pub fn select_target(
    config: &Config,
    input: &mut dyn InputProvider,
    obs_id: &str,
) -> Result<AnalysisTarget> {
    let layout = ObservationLayout::new(&config.data_path, obs_id);
    let analysis_dir = layout.analysis_dir();
    let folders = list_gti_folders(&analysis_dir)?;

    let gti = if folders.is_empty() {
        info!("No GTI folders found. Proceeding with the default analysis directory.");
        None
    } else {
        info!("Available GTI folders:");
        match ask_choice(input, "Select a GTI folder by entering its number", &folders)? {
            Some(idx) => GtiSelection::from_folder(&folders[idx]),
            None => {
                warn!("Invalid GTI folder selection. Proceeding with the default analysis directory.");
                None
            }
        }
    };
    let work_dir = match &gti {
        Some(sel) => analysis_dir.join(&sel.folder),
        None => analysis_dir,
    };

    let timing_key = obs_id_gti(obs_id, gti.as_ref());
    let timing = load_timing_parameters(&config.timing_parameters_path(), &timing_key)?;
    info!(
        "Timing parameters for {timing_key}: tstart={} f={} fdot={}",
        timing.tstart, timing.frequency, timing.frequency_derivative
    );

    let base = find_base_events(&work_dir, obs_id, gti.as_ref())?;
    info!("Base event file: {}", base.event_file());
    Ok(AnalysisTarget {
        work_dir,
        gti,
        base,
        timing,
    })
}

/// HENreadevents then HENcalibrate for `{stem}.evt` inside `dir`.
pub fn calibration_stages(dir: &Path, stem: &str, rmf_file: &str) -> [Stage; 2] {
    let evt = dir.join(format!("{stem}.evt"));
    let ev = dir.join(ev_file_name(stem));
    let calib = dir.join(calib_file_name(stem));
    [
        Stage::run(
            format!("HENreadevents {stem}"),
            ExternalCommand::new("HENreadevents")
                .arg(evt.display().to_string())
                .current_dir(dir),
            vec![ev.clone()],
        ),
        Stage::run(
            format!("HENcalibrate {stem}"),
            ExternalCommand::new("HENcalibrate")
                .arg(ev.display().to_string())
                .args(["-r", rmf_file])
                .current_dir(dir),
            vec![calib],
        ),
    ]
}

/// Calibrate the full band and every band slice. A failing slice is logged and the
/// rest carry on; failures stay in the executor's report.
pub fn calibrate_all<W: Workspace>(
    executor: &mut StageExecutor<W>,
    dir: &Path,
    base: &str,
    bands: &[EnergyBand],
    rmf_file: &str,
) {
    let mut stems = vec![base.to_string()];
    stems.extend(bands.iter().map(|band| {
        let evt = band.event_file(base);
        evt.trim_end_matches(".evt").to_string()
    }));
    for stem in stems {
        for stage in calibration_stages(dir, &stem, rmf_file) {
            if let Err(e) = executor.execute(&stage) {
                error!("{}: {e}; skipping the rest of {stem}", stage.name);
                break;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct BandProfile {
    pub band: EnergyBand,
    pub aligned: AlignedProfile,
}

#[derive(Debug, Default)]
pub struct EnergyResolvedProfiles {
    pub shift: isize,
    pub profiles: Vec<BandProfile>,
    pub skipped: Vec<(EnergyBand, String)>,
}

/// Fold the full band for the reference shift, then every band with that shift.
/// A band whose file is missing or unusable is skipped with a diagnostic.
pub fn fold_energy_resolved(
    loader: &mut dyn EventLoader,
    folder: &dyn Folder,
    timing: &TimingParameters,
    nbin: usize,
    dir: &Path,
    base: &str,
    bands: &[EnergyBand],
) -> Result<EnergyResolvedProfiles> {
    let full_path = dir.join(calib_file_name(base));
    let full_events = loader.load(&full_path)?;
    let full = folder.fold(&full_events, timing, nbin)?;
    let shift = reference_shift(&full.profile)?;
    info!(
        "Full band: {} events, reference shift {shift} bins",
        full_events.len()
    );

    let mut result = EnergyResolvedProfiles {
        shift,
        ..EnergyResolvedProfiles::default()
    };
    for band in bands {
        let path = dir.join(band.calib_file(base));
        let folded = loader
            .load(&path)
            .and_then(|events| folder.fold(&events, timing, nbin))
            .and_then(|folded| AlignedProfile::from_folded(&folded.profile, &folded.error, shift));
        match folded {
            Ok(aligned) => result.profiles.push(BandProfile {
                band: *band,
                aligned,
            }),
            Err(PipelineError::InputNotFound { path }) => {
                warn!("File not found: {}", path.display());
                result
                    .skipped
                    .push((*band, format!("missing {}", path.display())));
            }
            Err(e) => {
                warn!("Skipping {}: {e}", band.label());
                result.skipped.push((*band, e.to_string()));
            }
        }
    }
    Ok(result)
}

pub fn render_band_profiles(
    config: &Config,
    profiles: &EnergyResolvedProfiles,
    base: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::new();
    for entry in &profiles.profiles {
        let label = entry.band.label();
        let path = out_dir.join(entry.band.plot_file());
        let title = format!("{}, {base}, Energy: {label}", config.source_name);
        match plot_pulse_profile(
            &entry.aligned.phase(),
            &entry.aligned.profile,
            &entry.aligned.error,
            &title,
            &label,
            &path,
        ) {
            Ok(()) => {
                info!("Wrote {}", path.display());
                written.push(path);
            }
            Err(e) => error!("Plot for {label} failed: {e}"),
        }
    }
    Ok(written)
}

pub fn run<W: Workspace>(
    config: &Config,
    input: &mut dyn InputProvider,
    executor: &mut StageExecutor<W>,
    obs_id: &str,
) -> Result<()> {
    let target = select_target(config, input, obs_id)?;
    if let Some(sel) = &target.gti {
        info!("GTI folder: {}", sel.folder);
    }
    let stem = target.base.stem();
    let bands = partition(&config.intervals)?;
    let energy_dir = target
        .work_dir
        .join(output_dir_name(&config.intervals, config.bin_count));
    executor.workspace_mut().create_dir_all(&energy_dir)?;
    info!("Energy-resolved directory: {}", energy_dir.display());

    let base_evt = target.base.event_file();
    executor.execute(&Stage::copy(
        "copy base events",
        target.work_dir.join(&base_evt),
        energy_dir.join(&base_evt),
    ))?;
    let rmf = &config.calibration.rmf_file;
    executor.execute(&Stage::copy(
        "copy RMF",
        config.calibration.rmf_path(),
        energy_dir.join(rmf),
    ))?;

    let script_path = energy_dir.join(XSELECT_SCRIPT);
    if ask_yes_no(input, "Generate the xselect script now?", false)? {
        fs::write(&script_path, xselect_script(&stem, &bands))?;
        info!("Created xselect script at: {}", script_path.display());
    } else {
        info!("xselect script generation skipped.");
    }

    if ask_yes_no(input, "Execute the xselect script now?", false)? {
        let outputs: Vec<PathBuf> = bands
            .iter()
            .map(|band| energy_dir.join(band.event_file(&stem)))
            .collect();
        let stage = Stage::run(
            "xselect energy slicing",
            ExternalCommand::new("xselect")
                .arg(format!("@{XSELECT_SCRIPT}"))
                .current_dir(&energy_dir),
            outputs,
        );
        if !executor.is_complete(&stage) && !script_path.exists() {
            return Err(PipelineError::input_not_found(script_path));
        }
        executor.execute(&stage)?;
    }

    if ask_yes_no(input, "Use HENDRICS to calibrate?", false)? {
        let sliced = discover_band_files(&energy_dir, &stem)?;
        info!("Band event files: {}", sliced.len());
        calibrate_all(executor, &energy_dir, &stem, &sliced, rmf);
    } else {
        info!("HENDRICS not executed.");
    }

    if ask_yes_no(input, "Plot pulse profiles now?", false)? {
        let mut loader = CalibratedEventLoader::new(executor, &config.tools.event_export);
        match fold_energy_resolved(
            &mut loader,
            &EpochFolder,
            &target.timing,
            config.bin_count,
            &energy_dir,
            &stem,
            &bands,
        ) {
            Ok(profiles) => {
                info!("Bands rotated by the full-band shift of {} bins", profiles.shift);
                let out_dir = energy_dir.join(&config.pulse_profile_dir);
                let written = render_band_profiles(config, &profiles, &stem, &out_dir)?;
                info!(
                    "{} profile(s) written, {} band(s) skipped",
                    written.len(),
                    profiles.skipped.len()
                );
            }
            Err(PipelineError::InputNotFound { path }) => {
                error!(
                    "Full-band reference not found: {}; no band can be aligned.",
                    path.display()
                );
            }
            Err(e) => return Err(e),
        }
    } else {
        info!("Pulse profiles not plotted.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{time_list_path, EventList};
    use crate::prompt::ScriptedInput;
    use crate::stage::testing::MemoryWorkspace;
    use std::collections::HashMap;
    use std::fs::{create_dir_all, File};
    use std::io::Write;
    use tempfile::tempdir;

    const BASE: &str = "ni3602020401_0mpu7_cl_uo500_oo30_GTI1_bary_scorr";

    struct MapLoader(HashMap<PathBuf, EventList>);

    impl EventLoader for MapLoader {
        fn load(&mut self, path: &Path) -> Result<EventList> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| PipelineError::input_not_found(path))
        }
    }

    fn timing() -> TimingParameters {
        TimingParameters {
            tstart: 0.0,
            frequency: 1.0,
            frequency_derivative: 0.0,
        }
    }

    /// Events spread over ten bins with a deficit in bin `dip`.
    fn events_with_dip(dip: usize) -> EventList {
        let mut times = Vec::new();
        for cycle in 0..20 {
            for bin in 0..10 {
                let per_bin = if bin == dip { 1 } else { 4 };
                for k in 0..per_bin {
                    times.push(cycle as f64 + (bin as f64 + 0.1 + 0.2 * k as f64) / 10.0);
                }
            }
        }
        EventList::new(times).unwrap()
    }

    #[test]
    fn calibration_stage_commands() {
        let [read, calib] = calibration_stages(Path::new("/e"), "base_E5_8", "x.rmf");
        assert_eq!(read.outputs, vec![PathBuf::from("/e/base_E5_8_nicer_xti_ev.nc")]);
        assert_eq!(
            calib.outputs,
            vec![PathBuf::from("/e/base_E5_8_nicer_xti_ev_calib.nc")]
        );
        let crate::stage::StageAction::Run(command) = &calib.action else {
            panic!("expected a command");
        };
        assert_eq!(
            command.args,
            vec!["/e/base_E5_8_nicer_xti_ev.nc", "-r", "x.rmf"]
        );
    }

    #[test]
    fn failing_band_does_not_stop_the_batch() {
        let dir = Path::new("/e");
        let bands = [EnergyBand::new(5, 8), EnergyBand::new(8, 14)];
        let mut workspace = MemoryWorkspace::default();
        for stem in ["base", "base_E5_8", "base_E8_14"] {
            workspace.produce("HENreadevents", dir.join(ev_file_name(stem)));
        }
        // full band and 8-14 calibrate; 5-8 produces nothing
        workspace.produce("HENcalibrate", dir.join(calib_file_name("base")));
        workspace.produce("HENcalibrate", dir.join("unrelated.nc"));
        workspace.produce("HENcalibrate", dir.join(calib_file_name("base_E8_14")));
        let mut executor = StageExecutor::new(workspace);

        calibrate_all(&mut executor, dir, "base", &bands, "x.rmf");

        assert_eq!(executor.workspace().invoked.len(), 6);
        assert_eq!(executor.report().failed(), 1);
        assert_eq!(executor.report().completed(), 5);
        assert!(executor
            .workspace()
            .exists(&dir.join(calib_file_name("base_E8_14"))));
    }

    #[test]
    fn rerun_with_calibrated_files_spawns_nothing() {
        let dir = Path::new("/e");
        let bands = [EnergyBand::new(5, 8)];
        let files: Vec<PathBuf> = ["base", "base_E5_8"]
            .iter()
            .flat_map(|stem| [dir.join(ev_file_name(stem)), dir.join(calib_file_name(stem))])
            .collect();
        let mut executor = StageExecutor::new(MemoryWorkspace::with_files(files));
        calibrate_all(&mut executor, dir, "base", &bands, "x.rmf");
        assert!(executor.workspace().invoked.is_empty());
        assert_eq!(executor.report().skipped(), 4);
    }

    #[test]
    fn bands_share_the_full_band_shift() {
        let dir = Path::new("/e");
        let bands = [
            EnergyBand::new(5, 8),
            EnergyBand::new(8, 14),
            EnergyBand::new(14, 100),
        ];
        let mut files = HashMap::new();
        files.insert(dir.join(calib_file_name(BASE)), events_with_dip(6));
        files.insert(dir.join(bands[0].calib_file(BASE)), events_with_dip(6));
        // a band whose own minimum differs still uses the reference shift
        files.insert(dir.join(bands[2].calib_file(BASE)), events_with_dip(3));
        let mut loader = MapLoader(files);

        let result = fold_energy_resolved(
            &mut loader,
            &EpochFolder,
            &timing(),
            10,
            dir,
            BASE,
            &bands,
        )
        .unwrap();

        assert_eq!(result.shift, 1 - 6);
        assert_eq!(result.profiles.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].0, bands[1]);

        let first = &result.profiles[0].aligned;
        assert_eq!(first.profile.len(), 30);
        assert!((first.period()[1] - 1.0 / 3.7).abs() < 1e-12);
        let third = &result.profiles[1].aligned;
        // dip moved from bin 3 to bin 3 - 5 (mod 10) = 8
        assert!((third.period()[8] - 1.0 / 3.7).abs() < 1e-12);
    }

    #[test]
    fn missing_reference_is_reported() {
        let mut loader = MapLoader(HashMap::new());
        let err = fold_energy_resolved(
            &mut loader,
            &EpochFolder,
            &timing(),
            10,
            Path::new("/e"),
            BASE,
            &[EnergyBand::new(5, 8)],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound { .. }));
    }

    #[test]
    fn target_selection_reads_gti_ephemeris_and_events() {
        let root = tempdir().unwrap();
        let analysis = root.path().join("3602020401/xti/analysis");
        create_dir_all(analysis.join("GTI1")).unwrap();
        create_dir_all(analysis.join("GTI2")).unwrap();
        File::create(analysis.join("GTI1").join(format!("{BASE}.evt"))).unwrap();
        let mut table = File::create(root.path().join("timing_parameters.txt")).unwrap();
        writeln!(table, "obs_id_gti,tstart,fr,frdot").unwrap();
        writeln!(table, "3602020401_GTI1,1000.0,0.8077,1e-10").unwrap();

        let config = Config {
            data_path: root.path().to_path_buf(),
            ..Config::default()
        };
        let mut input = ScriptedInput::new(["1"]);
        let target = select_target(&config, &mut input, "3602020401").unwrap();

        assert_eq!(target.work_dir, analysis.join("GTI1"));
        assert_eq!(target.base.stem(), BASE);
        assert_eq!(target.timing.frequency, 0.8077);
        assert_eq!(target.gti.unwrap().number, "1");
    }

    const OBS: &str = "3602020401";
    const ROOT_BASE: &str = "ni3602020401_0mpu7_cl_uo500_oo30_bary_scorr";

    /// Observation tree with a base event list, no GTI folders and a 1 Hz ephemeris.
    struct Tree {
        _root: tempfile::TempDir,
        config: Config,
        analysis: PathBuf,
        energy_dir: PathBuf,
    }

    impl Tree {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let analysis = root.path().join("3602020401/xti/analysis");
            create_dir_all(&analysis).unwrap();
            File::create(analysis.join(format!("{ROOT_BASE}.evt"))).unwrap();
            let mut table = File::create(root.path().join("timing_parameters.txt")).unwrap();
            writeln!(table, "obs_id_gti,tstart,fr,frdot").unwrap();
            writeln!(table, "3602020401,0.0,1.0,0.0").unwrap();

            let mut config = Config {
                data_path: root.path().to_path_buf(),
                bin_count: 10,
                ..Config::default()
            };
            config.calibration.rmf_dir = root.path().join("rmf");
            let energy_dir = analysis.join(output_dir_name(&config.intervals, config.bin_count));
            create_dir_all(&energy_dir).unwrap();
            Tree {
                _root: root,
                config,
                analysis,
                energy_dir,
            }
        }

        fn bands(&self) -> Vec<EnergyBand> {
            partition(&self.config.intervals).unwrap()
        }

        fn stems(&self) -> Vec<String> {
            let mut stems = vec![ROOT_BASE.to_string()];
            stems.extend(
                self.bands()
                    .iter()
                    .map(|band| band.event_file(ROOT_BASE).trim_end_matches(".evt").to_string()),
            );
            stems
        }

        /// Workspace where only the inputs of the analysis exist.
        fn inputs(&self) -> MemoryWorkspace {
            MemoryWorkspace::with_files([
                self.analysis.join(format!("{ROOT_BASE}.evt")),
                self.config.calibration.rmf_path(),
            ])
        }
    }

    struct RecordingInput {
        answers: ScriptedInput,
        asked: Vec<String>,
    }

    impl InputProvider for RecordingInput {
        fn read_line(&mut self, prompt: &str) -> Result<String> {
            self.asked.push(prompt.to_string());
            self.answers.read_line(prompt)
        }
    }

    #[test]
    fn missing_rmf_stops_after_the_base_copy() {
        let tree = Tree::new();
        let workspace =
            MemoryWorkspace::with_files([tree.analysis.join(format!("{ROOT_BASE}.evt"))]);
        let mut executor = StageExecutor::new(workspace);
        let mut input = ScriptedInput::new(Vec::<String>::new());

        let err = run(&tree.config, &mut input, &mut executor, OBS).unwrap_err();

        match err {
            PipelineError::InputNotFound { path } => {
                assert_eq!(path, tree.config.calibration.rmf_path())
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(executor
            .workspace()
            .exists(&tree.energy_dir.join(format!("{ROOT_BASE}.evt"))));
        assert!(executor.workspace().invoked.is_empty());
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn xselect_without_script_is_input_not_found() {
        let tree = Tree::new();
        let mut executor = StageExecutor::new(tree.inputs());
        let mut input = ScriptedInput::new(["no", "yes"]);

        let err = run(&tree.config, &mut input, &mut executor, OBS).unwrap_err();

        match err {
            PipelineError::InputNotFound { path } => {
                assert_eq!(path, tree.energy_dir.join(XSELECT_SCRIPT))
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(executor.workspace().invoked.is_empty());
        assert_eq!(executor.report().completed(), 2);
    }

    #[test]
    fn declined_steps_only_copy_inputs() {
        let tree = Tree::new();
        let mut executor = StageExecutor::new(tree.inputs());
        let mut input = RecordingInput {
            answers: ScriptedInput::new(["", "", "", ""]),
            asked: Vec::new(),
        };

        run(&tree.config, &mut input, &mut executor, OBS).unwrap();

        let questions: Vec<&str> = input
            .asked
            .iter()
            .map(|p| p.split(" [").next().unwrap_or(""))
            .collect();
        assert_eq!(
            questions,
            vec![
                "Generate the xselect script now?",
                "Execute the xselect script now?",
                "Use HENDRICS to calibrate?",
                "Plot pulse profiles now?",
            ]
        );
        assert!(executor.workspace().invoked.is_empty());
        assert!(executor
            .workspace()
            .exists(&tree.energy_dir.join(&tree.config.calibration.rmf_file)));
        assert!(!tree.energy_dir.join(XSELECT_SCRIPT).exists());
    }

    #[test]
    fn fresh_run_slices_then_calibrates_every_band() {
        let tree = Tree::new();
        let mut workspace = tree.inputs();
        let sliced: Vec<PathBuf> = tree
            .bands()
            .iter()
            .map(|band| tree.energy_dir.join(band.event_file(ROOT_BASE)))
            .collect();
        workspace
            .produces
            .entry("xselect".to_string())
            .or_default()
            .push_back(sliced.clone());
        for stem in tree.stems() {
            workspace.produce("HENreadevents", tree.energy_dir.join(ev_file_name(&stem)));
            workspace.produce("HENcalibrate", tree.energy_dir.join(calib_file_name(&stem)));
        }
        // band discovery reads the directory itself
        for path in &sliced {
            File::create(path).unwrap();
        }
        let mut executor = StageExecutor::new(workspace);
        let mut input = ScriptedInput::new(["yes", "yes", "yes", "no"]);

        run(&tree.config, &mut input, &mut executor, OBS).unwrap();

        let script = fs::read_to_string(tree.energy_dir.join(XSELECT_SCRIPT)).unwrap();
        assert!(script.starts_with(&format!("xsel1\nread events {ROOT_BASE}.evt\n")));
        let invoked = &executor.workspace().invoked;
        assert_eq!(invoked[0].program, "xselect");
        assert_eq!(invoked[0].args, vec![format!("@{XSELECT_SCRIPT}")]);
        let calibration: Vec<&str> = invoked[1..].iter().map(|c| c.program.as_str()).collect();
        assert_eq!(calibration.len(), 2 * tree.stems().len());
        assert!(calibration
            .chunks(2)
            .all(|pair| pair == ["HENreadevents", "HENcalibrate"]));
        assert_eq!(executor.report().failed(), 0);
        assert_eq!(executor.report().completed(), 3 + 2 * tree.stems().len());
    }

    #[test]
    fn rerun_of_finished_analysis_spawns_nothing_and_plots() {
        let tree = Tree::new();
        let energy_dir = &tree.energy_dir;
        let mut workspace = tree.inputs();
        workspace.files.insert(energy_dir.join(format!("{ROOT_BASE}.evt")));
        workspace
            .files
            .insert(energy_dir.join(&tree.config.calibration.rmf_file));
        for band in tree.bands() {
            let path = energy_dir.join(band.event_file(ROOT_BASE));
            File::create(&path).unwrap();
            workspace.files.insert(path);
        }
        let events = events_with_dip(6);
        for stem in tree.stems() {
            let calib = energy_dir.join(calib_file_name(&stem));
            let times = time_list_path(&calib);
            let mut file = File::create(&times).unwrap();
            for t in events.times() {
                writeln!(file, "{t}").unwrap();
            }
            workspace.files.insert(energy_dir.join(ev_file_name(&stem)));
            workspace.files.insert(calib);
            workspace.files.insert(times);
        }
        let mut executor = StageExecutor::new(workspace);
        let mut input = ScriptedInput::new(["no", "yes", "yes", "yes"]);

        run(&tree.config, &mut input, &mut executor, OBS).unwrap();

        assert!(executor.workspace().invoked.is_empty());
        let stems = tree.stems().len();
        // two copies, xselect, two HENDRICS steps and one export per stem
        assert_eq!(executor.report().skipped(), 3 + 3 * stems);
        assert_eq!(executor.report().completed(), 0);
        for band in tree.bands() {
            let png = energy_dir
                .join(&tree.config.pulse_profile_dir)
                .join(band.plot_file());
            let bytes = fs::read(&png).unwrap();
            assert_eq!(&bytes[..4], b"\x89PNG");
        }
    }

    #[test]
    fn target_without_timing_row_fails() {
        let root = tempdir().unwrap();
        create_dir_all(root.path().join("3602020401/xti/analysis")).unwrap();
        let mut table = File::create(root.path().join("timing_parameters.txt")).unwrap();
        writeln!(table, "obs_id_gti,tstart,fr,frdot").unwrap();
        let config = Config {
            data_path: root.path().to_path_buf(),
            ..Config::default()
        };
        let mut input = ScriptedInput::new(Vec::<String>::new());
        assert!(matches!(
            select_target(&config, &mut input, "3602020401"),
            Err(PipelineError::TimingParametersNotFound(_))
        ));
    }
}
