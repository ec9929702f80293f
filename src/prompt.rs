use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::{debug, warn};

use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Attempts per question before giving up on bad answers.
pub const MAX_ATTEMPTS: usize = 5;

pub trait InputProvider {
    fn read_line(&mut self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Default)]
pub struct StdinInput;

impl InputProvider for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(PipelineError::InvalidUserInput(format!(
                "end of input while waiting for: {}",
                prompt.trim()
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Pre-recorded answers, one per prompt.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }

    /// One answer per line; an empty line accepts the default.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::input_not_found(path));
        }
        let content = fs::read_to_string(path)?;
        let input = Self::new(content.lines().map(|l| l.trim().to_string()));
        debug!("{} scripted answers loaded", input.remaining());
        Ok(input)
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InputProvider for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let answer = self.answers.pop_front().ok_or_else(|| {
            PipelineError::InvalidUserInput(format!(
                "no scripted answer left for: {}",
                prompt.trim()
            ))
        })?;
        println!("{prompt}{answer}");
        Ok(answer)
    }
}

/// Answers every prompt with its default.
#[derive(Debug, Default)]
pub struct DefaultsInput;

impl InputProvider for DefaultsInput {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        println!("{prompt}");
        Ok(String::new())
    }
}

fn give_up(what: &str) -> PipelineError {
    PipelineError::InvalidUserInput(format!("no valid {what} after {MAX_ATTEMPTS} attempts"))
}

pub fn ask_yes_no(input: &mut dyn InputProvider, question: &str, default: bool) -> Result<bool> {
    let hint = if default { "yes" } else { "no" };
    for _ in 0..MAX_ATTEMPTS {
        let answer = input.read_line(&format!("{question} [yes/no] (default: {hint}): "))?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            other => warn!("Please answer yes or no (got '{other}')."),
        }
    }
    Err(give_up("yes/no answer"))
}

/// Map an index such as `4` to the full ID `3602020401`.
pub fn observation_id_from_index(answer: &str, config: &Config) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() || !answer.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let index: u32 = answer.parse().ok()?;
    if index < 1 || index > config.obs_index_max {
        return None;
    }
    Some(format!(
        "{}{:02}{}",
        config.obs_id_prefix, index, config.obs_id_suffix
    ))
}

pub fn ask_observation_id(input: &mut dyn InputProvider, config: &Config) -> Result<String> {
    let max = config.obs_index_max;
    for _ in 0..MAX_ATTEMPTS {
        let answer = input.read_line(&format!("What is the observation ID? (01 to {max:02}): "))?;
        if let Some(obs_id) = observation_id_from_index(&answer, config) {
            return Ok(obs_id);
        }
        warn!("Invalid input. Please enter a number between 01 and {max:02}.");
    }
    Err(give_up("observation ID"))
}

/// Validate a `low-high` range with `low < high`.
pub fn parse_range(text: &str) -> std::result::Result<(f64, f64), String> {
    let parts: Vec<&str> = text.trim().split('-').collect();
    if parts.len() != 2 {
        return Err("Range must include two numbers separated by a dash.".into());
    }
    let low: f64 = parts[0]
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number: {e}", parts[0].trim()))?;
    let high: f64 = parts[1]
        .trim()
        .parse()
        .map_err(|e| format!("'{}' is not a number: {e}", parts[1].trim()))?;
    if low >= high {
        return Err("The first number must be less than the second number.".into());
    }
    Ok((low, high))
}

/// Ask for a range, falling back to `default` on an empty answer.
pub fn ask_range(input: &mut dyn InputProvider, question: &str, default: &str) -> Result<String> {
    for _ in 0..MAX_ATTEMPTS {
        let answer = input.read_line(&format!("{question} [{default}]: "))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default.to_string());
        }
        match parse_range(answer) {
            Ok(_) => return Ok(answer.to_string()),
            Err(reason) => warn!("Invalid range. Error: {reason}"),
        }
    }
    Err(give_up("range"))
}

/// Pick one of `options` by 1-based number. Empty or out-of-range answers yield `None`.
pub fn ask_choice(
    input: &mut dyn InputProvider,
    question: &str,
    options: &[String],
) -> Result<Option<usize>> {
    for (idx, option) in options.iter().enumerate() {
        println!("{}: {}", idx + 1, option);
    }
    for _ in 0..MAX_ATTEMPTS {
        let answer = input.read_line(&format!("{question}: "))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => return Ok(Some(n - 1)),
            Ok(_) => return Ok(None),
            Err(_) => warn!("'{answer}' is not a number."),
        }
    }
    Err(give_up("selection"))
}
