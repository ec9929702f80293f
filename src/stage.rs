use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, error, info, warn};

use crate::error::{PipelineError, Result};

/// One blocking invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdout_log: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdout_log: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdout_to(mut self, log: impl Into<PathBuf>) -> Self {
        self.stdout_log = Some(log.into());
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        if let Some(log) = &self.stdout_log {
            write!(f, " > {}", log.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    Run(ExternalCommand),
    Copy { from: PathBuf, to: PathBuf },
}

/// Text file recording the parameters the outputs were built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub path: PathBuf,
    pub content: String,
}

/// `{product}.stamp` beside the product.
pub fn stamp_path(product: &Path) -> PathBuf {
    let mut name = product.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".stamp");
    product.with_file_name(name)
}

/// Complete when every output exists and the stamp, if any, matches.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub action: StageAction,
    pub outputs: Vec<PathBuf>,
    pub stamp: Option<Stamp>,
}

impl Stage {
    pub fn run(name: impl Into<String>, command: ExternalCommand, outputs: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            action: StageAction::Run(command),
            outputs,
            stamp: None,
        }
    }

    pub fn copy(name: impl Into<String>, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        let to = to.into();
        Self {
            name: name.into(),
            action: StageAction::Copy {
                from: from.into(),
                to: to.clone(),
            },
            outputs: vec![to],
            stamp: None,
        }
    }

    pub fn stamped(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.stamp = Some(Stamp {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    fn tool_name(&self) -> &str {
        match &self.action {
            StageAction::Run(command) => &command.program,
            StageAction::Copy { .. } => "copy",
        }
    }
}

/// Filesystem and process access used by stages.
pub trait Workspace {
    fn exists(&self, path: &Path) -> bool;
    /// Run to completion; `Ok(Some(code))` for a non-zero exit, `Ok(None)` on success.
    fn run(&mut self, command: &ExternalCommand) -> Result<Option<i32>>;
    fn copy(&mut self, from: &Path, to: &Path) -> Result<()>;
    fn create_dir_all(&mut self, path: &Path) -> Result<()>;
    fn read_stamp(&self, path: &Path) -> Option<String>;
    fn write_stamp(&mut self, path: &Path, content: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct LocalWorkspace;

impl Workspace for LocalWorkspace {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn run(&mut self, command: &ExternalCommand) -> Result<Option<i32>> {
        let mut process = Command::new(&command.program);
        process.args(&command.args);
        if let Some(dir) = &command.cwd {
            process.current_dir(dir);
        }
        if let Some(log) = &command.stdout_log {
            process.stdout(Stdio::from(File::create(log)?));
        }
        let status = process.status().map_err(|e| {
            PipelineError::tool(&command.program, format!("could not be started: {e}"))
        })?;
        if status.success() {
            Ok(None)
        } else {
            // Killed by a signal reports no code.
            Ok(Some(status.code().unwrap_or(-1)))
        }
    }

    fn copy(&mut self, from: &Path, to: &Path) -> Result<()> {
        if !from.exists() {
            return Err(PipelineError::input_not_found(from));
        }
        fs::copy(from, to)?;
        Ok(())
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn read_stamp(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok().map(|s| s.trim_end().to_string())
    }

    fn write_stamp(&mut self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, format!("{content}\n"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Skipped,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct StageReport {
    pub records: Vec<StageRecord>,
}

impl StageReport {
    fn count(&self, pred: impl Fn(&StageStatus) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|s| *s == StageStatus::Completed)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == StageStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, StageStatus::Failed(_)))
    }

    pub fn log_summary(&self) {
        info!(
            "Stages: {} ran, {} skipped, {} failed",
            self.completed(),
            self.skipped(),
            self.failed()
        );
        for record in &self.records {
            if let StageStatus::Failed(reason) = &record.status {
                let outputs: Vec<String> = record.outputs.iter().map(|p| display_name(p)).collect();
                warn!("  {}: {} (expected {})", record.name, reason, outputs.join(", "));
            }
        }
    }
}

pub struct StageExecutor<W: Workspace> {
    workspace: W,
    report: StageReport,
}

impl<W: Workspace> StageExecutor<W> {
    pub fn new(workspace: W) -> Self {
        Self {
            workspace,
            report: StageReport::default(),
        }
    }

    pub fn workspace(&self) -> &W {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut W {
        &mut self.workspace
    }

    pub fn report(&self) -> &StageReport {
        &self.report
    }

    fn outputs_exist(&self, stage: &Stage) -> bool {
        !stage.outputs.is_empty() && stage.outputs.iter().all(|p| self.workspace.exists(p))
    }

    fn stamp_matches(&self, stage: &Stage) -> bool {
        match &stage.stamp {
            Some(stamp) => {
                self.workspace.read_stamp(&stamp.path).as_deref() == Some(stamp.content.as_str())
            }
            None => true,
        }
    }

    pub fn is_complete(&self, stage: &Stage) -> bool {
        self.outputs_exist(stage) && self.stamp_matches(stage)
    }

    pub fn execute(&mut self, stage: &Stage) -> Result<StageOutcome> {
        let result = self.execute_inner(stage);
        let status = match &result {
            Ok(StageOutcome::Skipped) => StageStatus::Skipped,
            Ok(StageOutcome::Completed) => StageStatus::Completed,
            Err(e) => StageStatus::Failed(e.to_string()),
        };
        self.report.records.push(StageRecord {
            name: stage.name.clone(),
            status,
            outputs: stage.outputs.clone(),
        });
        result
    }

    fn execute_inner(&mut self, stage: &Stage) -> Result<StageOutcome> {
        if self.is_complete(stage) {
            let names: Vec<String> = stage.outputs.iter().map(|p| display_name(p)).collect();
            info!("{} already exists, skipping {}.", names.join(", "), stage.name);
            return Ok(StageOutcome::Skipped);
        }
        if self.outputs_exist(stage) {
            warn!("{} outputs were built with other parameters, rerunning.", stage.name);
        }

        match &stage.action {
            StageAction::Run(command) => {
                info!("Running {}: {}", stage.name, command);
                if let Some(code) = self.workspace.run(command)? {
                    error!("{} exited with status {}", command.program, code);
                    return Err(PipelineError::tool(
                        &command.program,
                        format!("exit status {code}"),
                    ));
                }
            }
            StageAction::Copy { from, to } => {
                debug!("Copying {} -> {}", from.display(), to.display());
                self.workspace.copy(from, to)?;
            }
        }

        if let Some(missing) = stage.outputs.iter().find(|p| !self.workspace.exists(p)) {
            return Err(PipelineError::tool(
                stage.tool_name(),
                format!("finished but {} was not produced", missing.display()),
            ));
        }
        if let Some(stamp) = &stage.stamp {
            self.workspace.write_stamp(&stamp.path, &stamp.content)?;
        }
        info!("{} done.", stage.name);
        Ok(StageOutcome::Completed)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryWorkspace;
    use super::*;

    fn calibrate_stage() -> Stage {
        Stage::run(
            "HENcalibrate",
            ExternalCommand::new("HENcalibrate")
                .arg("a_nicer_xti_ev.nc")
                .args(["-r", "x.rmf"]),
            vec![PathBuf::from("/w/a_nicer_xti_ev_calib.nc")],
        )
    }

    #[test]
    fn existing_outputs_skip_without_spawning() {
        let workspace = MemoryWorkspace::with_files(["/w/a_nicer_xti_ev_calib.nc"]);
        let mut executor = StageExecutor::new(workspace);
        let outcome = executor.execute(&calibrate_stage()).unwrap();
        assert_eq!(outcome, StageOutcome::Skipped);
        assert!(executor.workspace().invoked.is_empty());
        assert_eq!(executor.report().skipped(), 1);
    }

    #[test]
    fn missing_output_runs_command() {
        let mut workspace = MemoryWorkspace::default();
        workspace.produce("HENcalibrate", "/w/a_nicer_xti_ev_calib.nc");
        let mut executor = StageExecutor::new(workspace);
        assert_eq!(
            executor.execute(&calibrate_stage()).unwrap(),
            StageOutcome::Completed
        );
        assert_eq!(executor.workspace().invoked.len(), 1);
        // second pass is a no-op
        assert_eq!(
            executor.execute(&calibrate_stage()).unwrap(),
            StageOutcome::Skipped
        );
        assert_eq!(executor.workspace().invoked.len(), 1);
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut workspace = MemoryWorkspace::default();
        workspace.failing.insert("HENcalibrate".to_string());
        let mut executor = StageExecutor::new(workspace);
        let err = executor.execute(&calibrate_stage()).unwrap_err();
        assert!(matches!(err, PipelineError::ExternalToolFailure { .. }));
        assert_eq!(executor.report().failed(), 1);
    }

    #[test]
    fn success_without_output_is_a_failure() {
        let mut executor = StageExecutor::new(MemoryWorkspace::default());
        let err = executor.execute(&calibrate_stage()).unwrap_err();
        assert!(err.to_string().contains("was not produced"));
    }

    #[test]
    fn copy_of_missing_source_fails() {
        let mut executor = StageExecutor::new(MemoryWorkspace::default());
        let stage = Stage::copy("copy events", "/a/x.evt", "/b/x.evt");
        assert!(matches!(
            executor.execute(&stage),
            Err(PipelineError::InputNotFound { .. })
        ));
    }

    #[test]
    fn stale_stamp_forces_a_rerun() {
        let stage = calibrate_stage().stamped("/w/a.stamp", "rmf=x.rmf");
        let mut workspace = MemoryWorkspace::with_files(["/w/a_nicer_xti_ev_calib.nc"]);
        workspace
            .stamps
            .insert(PathBuf::from("/w/a.stamp"), "rmf=old.rmf".to_string());
        let mut executor = StageExecutor::new(workspace);

        assert_eq!(executor.execute(&stage).unwrap(), StageOutcome::Completed);
        assert_eq!(executor.workspace().invoked.len(), 1);
        assert_eq!(
            executor.workspace().stamps.get(Path::new("/w/a.stamp")).map(String::as_str),
            Some("rmf=x.rmf")
        );
        // the fresh stamp makes the next pass a no-op
        assert_eq!(executor.execute(&stage).unwrap(), StageOutcome::Skipped);
        assert_eq!(executor.workspace().invoked.len(), 1);
    }

    #[test]
    fn stamp_sits_beside_the_product() {
        assert_eq!(
            stamp_path(Path::new("/d/xti/event_cl/ni1_0mpu7_cl.evt")),
            PathBuf::from("/d/xti/event_cl/ni1_0mpu7_cl.evt.stamp")
        );
    }

    #[test]
    fn failed_run_leaves_no_stamp() {
        let stage = calibrate_stage().stamped("/w/a.stamp", "rmf=x.rmf");
        let mut executor = StageExecutor::new(MemoryWorkspace::default());
        assert!(executor.execute(&stage).is_err());
        assert!(executor.workspace().stamps.is_empty());
    }

    #[test]
    fn local_stamp_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.stamp");
        let mut workspace = LocalWorkspace;
        assert_eq!(workspace.read_stamp(&path), None);
        workspace.write_stamp(&path, "underonly_range=0-200").unwrap();
        assert_eq!(
            workspace.read_stamp(&path).as_deref(),
            Some("underonly_range=0-200")
        );
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let command = ExternalCommand::new("nimaketime")
            .arg("expr=SUN_ANGLE>60 && KP<5")
            .arg("chatter=5")
            .stdout_to("/tmp/log");
        assert_eq!(
            command.to_string(),
            "nimaketime \"expr=SUN_ANGLE>60 && KP<5\" chatter=5 > /tmp/log"
        );
    }
}
