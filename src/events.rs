use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{PipelineError, Result};
use crate::stage::{ExternalCommand, Stage, StageExecutor, Workspace};

/// Photon arrival times in seconds, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct EventList {
    times: Vec<f64>,
}

impl EventList {
    pub fn new(mut times: Vec<f64>) -> Result<Self> {
        if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
            return Err(PipelineError::Data(format!("non-finite event time {bad}")));
        }
        times.sort_by(|a, b| a.total_cmp(b));
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

pub trait EventLoader {
    fn load(&mut self, path: &Path) -> Result<EventList>;
}

/// Reads one arrival time per line (first column of whitespace or comma separated rows).
#[derive(Debug, Default)]
pub struct TextEventLoader;

impl EventLoader for TextEventLoader {
    fn load(&mut self, path: &Path) -> Result<EventList> {
        read_time_list(path)
    }
}

pub fn read_time_list(path: &Path) -> Result<EventList> {
    if !path.exists() {
        return Err(PipelineError::input_not_found(path));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut times = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let first = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .find(|s| !s.is_empty())
            .unwrap_or("");
        match first.parse::<f64>() {
            Ok(t) => times.push(t),
            // column header such as "TIME"
            Err(_) if times.is_empty() => continue,
            Err(e) => {
                return Err(PipelineError::Data(format!(
                    "{}:{}: bad event time '{first}': {e}",
                    path.display(),
                    line_no + 1
                )))
            }
        }
    }
    debug!("Loaded {} events from {}", times.len(), path.display());
    EventList::new(times)
}

/// Loads HENDRICS calibrated files by exporting their TIME column to a text list
/// first. The export is itself an idempotent stage.
pub struct CalibratedEventLoader<'a, W: Workspace> {
    executor: &'a mut StageExecutor<W>,
    template: &'a [String],
}

impl<'a, W: Workspace> CalibratedEventLoader<'a, W> {
    pub fn new(executor: &'a mut StageExecutor<W>, template: &'a [String]) -> Self {
        Self { executor, template }
    }
}

/// `{dir}/{stem}_times.txt` beside a calibrated event file.
pub fn time_list_path(calibrated: &Path) -> PathBuf {
    let stem = calibrated
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    calibrated.with_file_name(format!("{stem}_times.txt"))
}

pub fn export_command(template: &[String], input: &Path, output: &Path) -> Result<ExternalCommand> {
    let (program, rest) = template
        .split_first()
        .ok_or_else(|| PipelineError::Config("empty event export command".into()))?;
    let input = input.display().to_string();
    let output = output.display().to_string();
    Ok(ExternalCommand::new(program.clone()).args(
        rest.iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output)),
    ))
}

impl<W: Workspace> EventLoader for CalibratedEventLoader<'_, W> {
    fn load(&mut self, path: &Path) -> Result<EventList> {
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if is_text {
            return TextEventLoader.load(path);
        }
        if !self.executor.workspace().exists(path) {
            return Err(PipelineError::input_not_found(path));
        }
        let output = time_list_path(path);
        let stage = Stage::run(
            "event export",
            export_command(self.template, path, &output)?,
            vec![output.clone()],
        );
        self.executor.execute(&stage)?;
        read_time_list(&output)
    }
}
