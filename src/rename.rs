use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{PipelineError, Result};

pub fn short_name(name: &str) -> Option<String> {
    if !name.contains("underonly") && !name.contains("overonly") {
        return None;
    }
    Some(name.replace("underonly", "uo").replace("overonly", "oo"))
}

/// Rename every entry of `dir` carrying a long threshold tag. Existing targets are
/// left alone. Returns the `(from, to)` pairs actually renamed, sorted by name.
pub fn rename_threshold_tags(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !dir.is_dir() {
        return Err(PipelineError::input_not_found(dir));
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut renamed = Vec::new();
    for name in names {
        let Some(new_name) = short_name(&name) else {
            continue;
        };
        let from = dir.join(&name);
        let to = dir.join(&new_name);
        if to.exists() {
            warn!("{new_name} already exists, not renaming {name}");
            continue;
        }
        fs::rename(&from, &to)?;
        info!("Renamed: {name} -> {new_name}");
        renamed.push((from, to));
    }
    Ok(renamed)
}
