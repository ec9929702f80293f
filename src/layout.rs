use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{PipelineError, Result};

/// ```text
/// {data}/{obs}/auxil/ni{obs}.mkf
/// {data}/{obs}/xti/event_cl/ni{obs}_0mpu7_cl.evt
/// {data}/{obs}/xti/analysis/[GTI{n}/]ni{obs}_0mpu7_cl_uo{U}_oo{O}[_GTI{n}]_bary_scorr.evt
/// ```
#[derive(Debug, Clone)]
pub struct ObservationLayout {
    pub data_path: PathBuf,
    pub obs_id: String,
}

impl ObservationLayout {
    pub fn new(data_path: impl Into<PathBuf>, obs_id: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            obs_id: obs_id.into(),
        }
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.data_path.join(&self.obs_id)
    }

    pub fn xti_dir(&self) -> PathBuf {
        self.dataset_dir().join("xti")
    }

    pub fn event_cl_dir(&self) -> PathBuf {
        self.xti_dir().join("event_cl")
    }

    pub fn auxil_dir(&self) -> PathBuf {
        self.dataset_dir().join("auxil")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.xti_dir().join("analysis")
    }

    pub fn cleaned_event_name(&self) -> String {
        format!("ni{}_0mpu7_cl.evt", self.obs_id)
    }

    pub fn cleaned_events(&self) -> PathBuf {
        self.event_cl_dir().join(self.cleaned_event_name())
    }

    pub fn mkf(&self) -> PathBuf {
        self.auxil_dir().join(format!("ni{}.mkf", self.obs_id))
    }

    pub fn mkf_gti(&self) -> PathBuf {
        self.auxil_dir().join(format!("ni{}.mkf_gti1", self.obs_id))
    }

    pub fn nicerl2_log(&self) -> PathBuf {
        self.data_path.join(format!("{}nicerl2.log", self.obs_id))
    }

    /// niextract-events output for the chosen under/over-only upper limits.
    pub fn extracted_events(&self, underonly: &str, overonly: &str) -> PathBuf {
        self.analysis_dir().join(format!(
            "ni{}_0mpu7_cl_uo{underonly}_oo{overonly}.evt",
            self.obs_id
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtiSelection {
    pub folder: String,
    pub number: String,
}

impl GtiSelection {
    pub fn from_folder(folder: &str) -> Option<Self> {
        let re = Regex::new(r"GTI(\d+)").ok()?;
        let caps = re.captures(folder)?;
        Some(Self {
            folder: folder.to_string(),
            number: caps[1].to_string(),
        })
    }
}

/// Key into the timing parameter table.
pub fn obs_id_gti(obs_id: &str, gti: Option<&GtiSelection>) -> String {
    match gti {
        Some(sel) => format!("{obs_id}_GTI{}", sel.number),
        None => obs_id.to_string(),
    }
}

/// Sorted names of `GTI*` directories inside `analysis_dir`.
pub fn list_gti_folders(analysis_dir: &Path) -> Result<Vec<String>> {
    if !analysis_dir.is_dir() {
        return Err(PipelineError::input_not_found(analysis_dir));
    }
    let mut folders = Vec::new();
    for entry in fs::read_dir(analysis_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("GTI") && entry.path().is_dir() {
            folders.push(name);
        }
    }
    folders.sort();
    Ok(folders)
}

/// Stem of the barycentred, scattering-corrected event list an analysis starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseName {
    pub obs_id: String,
    pub underonly: String,
    pub overonly: String,
    pub gti_folder: Option<String>,
}

impl BaseName {
    pub fn stem(&self) -> String {
        match &self.gti_folder {
            Some(gti) => format!(
                "ni{}_0mpu7_cl_uo{}_oo{}_{gti}_bary_scorr",
                self.obs_id, self.underonly, self.overonly
            ),
            None => format!(
                "ni{}_0mpu7_cl_uo{}_oo{}_bary_scorr",
                self.obs_id, self.underonly, self.overonly
            ),
        }
    }

    pub fn event_file(&self) -> String {
        format!("{}.evt", self.stem())
    }
}

/// Find the first barycentred event list in `dir` for the given GTI selection.
pub fn find_base_events(
    dir: &Path,
    obs_id: &str,
    gti: Option<&GtiSelection>,
) -> Result<BaseName> {
    let gti_fragment = match gti {
        Some(sel) => format!("_GTI{}_", sel.number),
        None => "_".to_string(),
    };
    let pattern = Regex::new(&format!(
        r"^ni\d+_0mpu7_cl_uo(\d+)_oo(\d+){}bary_scorr\.evt$",
        regex::escape(&gti_fragment)
    ))
    .map_err(|e| PipelineError::Data(format!("bad event pattern: {e}")))?;

    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| pattern.is_match(name))
        .collect();
    names.sort();

    let first = names.first().ok_or_else(|| {
        PipelineError::input_not_found(dir.join(format!(
            "ni{obs_id}_0mpu7_cl_uo*_oo*{gti_fragment}bary_scorr.evt"
        )))
    })?;
    let caps = pattern
        .captures(first)
        .ok_or_else(|| PipelineError::Data(format!("unexpected event file name {first}")))?;
    Ok(BaseName {
        obs_id: obs_id.to_string(),
        underonly: caps[1].to_string(),
        overonly: caps[2].to_string(),
        gti_folder: gti.map(|sel| sel.folder.clone()),
    })
}

/// Observation ID and GTI label embedded in an event file name, for plot titles.
pub fn describe_event_file(name: &str) -> (Option<String>, Option<String>) {
    let obs = Regex::new(r"ni(\d{10})")
        .ok()
        .and_then(|re| re.captures(name).map(|c| c[1].to_string()));
    let gti = Regex::new(r"(GTI\d?)")
        .ok()
        .and_then(|re| re.captures(name).map(|c| c[1].to_string()));
    (obs, gti)
}
