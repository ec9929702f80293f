mod args;
mod config;
mod energy;
mod energy_resolved;
mod ephemeris;
mod error;
mod events;
mod fold;
mod layout;
mod plot;
mod profile;
mod prompt;
mod pulse_plot;
mod reduce;
mod rename;
mod stage;
mod utils;

use std::io::Write;

use clap::{CommandFactory, Parser};
use log::{error, info, LevelFilter};

use args::{parse_timing, Args, Command};
use config::Config;
use energy::{output_dir_name, partition};
use error::PipelineError;
use events::CalibratedEventLoader;
use fold::EpochFolder;
use prompt::{
    ask_observation_id, observation_id_from_index, DefaultsInput, InputProvider, ScriptedInput,
    StdinInput,
};
use pulse_plot::ProfileRequest;
use stage::{LocalWorkspace, StageExecutor};
use utils::DynError;

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}",
                record.level().as_str().to_ascii_lowercase(),
                record.args()
            )
        })
        .init();
}

fn load_config(args: &Args) -> Result<Config, DynError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    if let Some(data) = &args.data {
        config.data_path = data.clone();
    }
    if let Some(nbin) = args.nbin {
        config.bin_count = nbin;
    }
    config.validate()?;
    Ok(config)
}

fn input_provider(args: &Args) -> Result<Box<dyn InputProvider>, DynError> {
    if let Some(path) = &args.answers {
        info!("Answering prompts from {}", path.display());
        return Ok(Box::new(ScriptedInput::from_file(path)?));
    }
    if args.yes {
        return Ok(Box::new(DefaultsInput));
    }
    Ok(Box::new(StdinInput))
}

fn observation_id(
    obs: Option<&str>,
    input: &mut dyn InputProvider,
    config: &Config,
) -> Result<String, DynError> {
    let obs_id = match obs {
        Some(index) => observation_id_from_index(index, config).ok_or_else(|| {
            PipelineError::InvalidUserInput(format!(
                "--obs must be a number between 1 and {}, received '{index}'",
                config.obs_index_max
            ))
        })?,
        None => ask_observation_id(input, config)?,
    };
    info!("Observation ID: {obs_id}");
    Ok(obs_id)
}

fn finish(executor: &StageExecutor<LocalWorkspace>) -> Result<(), DynError> {
    let report = executor.report();
    report.log_summary();
    if report.failed() > 0 {
        return Err(format!("{} stage(s) failed", report.failed()).into());
    }
    Ok(())
}

fn print_bands(config: &Config, base: Option<&str>) -> Result<(), DynError> {
    let bands = partition(&config.intervals)?;
    println!(
        "Output directory: {}",
        output_dir_name(&config.intervals, config.bin_count)
    );
    for band in &bands {
        let (pi_lo, pi_hi) = band.pi_bounds();
        match base {
            Some(base) => println!(
                "{:>10}  PI {pi_lo}:{pi_hi}  {}  {}",
                band.label(),
                band.event_file(base),
                band.plot_file()
            ),
            None => println!("{:>10}  PI {pi_lo}:{pi_hi}  {}", band.label(), band.plot_file()),
        }
    }
    Ok(())
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = Args::parse();
    init_logging(args.verbose);
    let config = load_config(&args)?;

    match &args.command {
        Command::Reduce { obs } => {
            let mut input = input_provider(&args)?;
            let obs_id = observation_id(obs.as_deref(), input.as_mut(), &config)?;
            let mut executor = StageExecutor::new(LocalWorkspace);
            let result = reduce::run(&config, input.as_mut(), &mut executor, &obs_id);
            if let Err(e) = &result {
                error!("Reduction stopped: {e}");
            }
            finish(&executor)?;
            result?;
        }
        Command::Energy { obs } => {
            let mut input = input_provider(&args)?;
            let obs_id = observation_id(obs.as_deref(), input.as_mut(), &config)?;
            let mut executor = StageExecutor::new(LocalWorkspace);
            let result = energy_resolved::run(&config, input.as_mut(), &mut executor, &obs_id);
            if let Err(e) = &result {
                error!("Energy-resolved analysis stopped: {e}");
            }
            finish(&executor)?;
            result?;
        }
        Command::Profile {
            events,
            frequency,
            frequency_derivative,
            tstart,
            timing_id,
            label,
            output,
        } => {
            let request = ProfileRequest {
                events: events.clone(),
                timing: parse_timing(
                    *frequency,
                    *frequency_derivative,
                    *tstart,
                    timing_id.clone(),
                )?,
                label: label.clone(),
                output: output.clone(),
            };
            let mut executor = StageExecutor::new(LocalWorkspace);
            let mut loader = CalibratedEventLoader::new(&mut executor, &config.tools.event_export);
            let result = pulse_plot::run(&config, &request, &mut loader, &EpochFolder);
            if let Err(e) = &result {
                error!("Pulse profile stopped: {e}");
            }
            finish(&executor)?;
            result?;
        }
        Command::Rename { dir } => {
            let renamed = rename::rename_threshold_tags(dir)?;
            info!("{} file(s) renamed in {}", renamed.len(), dir.display());
        }
        Command::Bands { base } => print_bands(&config, base.as_deref())?,
    }
    Ok(())
}
