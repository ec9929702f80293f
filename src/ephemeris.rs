use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::debug;

use crate::error::{PipelineError, Result};
use crate::fold::TimingParameters;

fn parse_field(raw: &str, name: &str, path: &Path, line_no: u64) -> Result<f64> {
    raw.parse::<f64>().map_err(|e| {
        PipelineError::Data(format!(
            "{}:{}: bad {name} '{raw}': {e}",
            path.display(),
            line_no
        ))
    })
}

/// Look up `obs_id_gti` (e.g. `3602020401_GTI1`) in a timing parameter table.
///
/// The table is comma separated with one header line:
/// `obs_id_gti,tstart,fr,frdot`.
pub fn load_timing_parameters(path: &Path, obs_id_gti: &str) -> Result<TimingParameters> {
    if !path.exists() {
        return Err(PipelineError::input_not_found(path));
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::Data(format!("{}: {e}", path.display())))?;

    for record in reader.records() {
        let record =
            record.map_err(|e| PipelineError::Data(format!("{}: {e}", path.display())))?;
        if record.get(0) != Some(obs_id_gti) {
            continue;
        }
        let line_no = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() < 4 {
            return Err(PipelineError::Data(format!(
                "{}:{}: expected 4 columns, found {}",
                path.display(),
                line_no,
                record.len()
            )));
        }
        let params = TimingParameters {
            tstart: parse_field(&record[1], "tstart", path, line_no)?,
            frequency: parse_field(&record[2], "fr", path, line_no)?,
            frequency_derivative: parse_field(&record[3], "frdot", path, line_no)?,
        };
        debug!("Timing parameters for {obs_id_gti}: {params:?}");
        return Ok(params);
    }
    Err(PipelineError::TimingParametersNotFound(obs_id_gti.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "obs_id_gti,tstart,fr,frdot").unwrap();
        writeln!(file, "3602020401,2.5e8,0.80775,-1.2e-9").unwrap();
        writeln!(file, "# second interval refit").unwrap();
        writeln!(file, "3602020401_GTI1, 250001000.0, 0.80776, 3e-10").unwrap();
        file
    }

    #[test]
    fn finds_row_by_observation_and_gti() {
        let file = table();
        let plain = load_timing_parameters(file.path(), "3602020401").unwrap();
        assert_eq!(plain.tstart, 2.5e8);
        assert_eq!(plain.frequency, 0.80775);
        assert_eq!(plain.frequency_derivative, -1.2e-9);

        let gti = load_timing_parameters(file.path(), "3602020401_GTI1").unwrap();
        assert_eq!(gti.tstart, 250001000.0);
        assert_eq!(gti.frequency_derivative, 3e-10);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let file = table();
        assert!(matches!(
            load_timing_parameters(file.path(), "3602021501"),
            Err(PipelineError::TimingParametersNotFound(_))
        ));
    }

    #[test]
    fn header_is_never_matched() {
        let file = table();
        assert!(load_timing_parameters(file.path(), "obs_id_gti").is_err());
    }

    #[test]
    fn quoted_fields_are_unquoted() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\"obs_id_gti\",\"tstart\",\"fr\",\"frdot\"").unwrap();
        writeln!(file, "\"3602020401_GTI1\",1,0.8,0").unwrap();
        let params = load_timing_parameters(file.path(), "3602020401_GTI1").unwrap();
        assert_eq!(params.tstart, 1.0);
        assert_eq!(params.frequency, 0.8);
    }

    #[test]
    fn short_row_is_data_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "obs_id_gti,tstart,fr,frdot").unwrap();
        writeln!(file, "3602020401,1.0").unwrap();
        assert!(matches!(
            load_timing_parameters(file.path(), "3602020401"),
            Err(PipelineError::Data(_))
        ));
    }

    #[test]
    fn malformed_number_is_data_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,tstart,fr,frdot").unwrap();
        writeln!(file, "x,abc,1,0").unwrap();
        assert!(matches!(
            load_timing_parameters(file.path(), "x"),
            Err(PipelineError::Data(_))
        ));
    }
}
