#![deny(unused_must_use)]
use std::{panic, path::PathBuf, process::ExitCode, rc::Rc};

use clap::Parser;
use colored::Colorize;
use mcscript::{
    compile,
    config::{Config, ConfigError},
    data::EngineData,
    error::ErrorDisplay,
    source::ScriptSource,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Compiles mcscript source into scoreboard commands")]
struct Args {
    /// Script to compile
    file: PathBuf,
    /// JSON file with namespace, objective and storage names
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file with the known block ids
    #[arg(long)]
    data: Option<PathBuf>,
    /// Print the functions as one JSON object
    #[arg(long)]
    json: bool,
    #[arg(long)]
    no_optimize: bool,
}

fn load<T: Default>(
    path: Option<&PathBuf>,
    f: impl FnOnce(&std::path::Path) -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match path {
        Some(path) => f(path.as_path()),
        None => Ok(T::default()),
    }
}

fn run(args: &Args) -> ExitCode {
    let config = load(args.config.as_ref(), Config::load).map(|mut c| {
        c.optimize &= !args.no_optimize;
        c
    });
    let data = load(args.data.as_ref(), EngineData::load);
    let (config, data) = match (config, data) {
        (Ok(c), Ok(d)) => (c, d),
        (Err(err), _) | (_, Err(err)) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let src = match ScriptSource::load(args.file.clone()) {
        Ok(src) => Rc::new(src),
        Err(err) => {
            error!(file = %args.file.display(), "{}", err);
            return ExitCode::FAILURE;
        }
    };

    let output = compile(&src, &config, &data, |phase, fraction, _| {
        debug!(phase, progress = fraction, "compiling");
    });
    let output = match output {
        Ok(output) => output,
        Err(err) => {
            err.into_display().display();
            return ExitCode::FAILURE;
        }
    };

    for warning in output.warnings {
        ErrorDisplay::from(warning).display();
    }

    if args.json {
        match serde_json::to_string_pretty(&output.functions) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                error!("{}", err);
                return ExitCode::FAILURE;
            }
        }
    } else {
        for (name, commands) in &output.functions {
            println!(
                "{}",
                format!("# {}:{}", config.namespace, name).bright_green().bold()
            );
            println!("{}", commands);
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match panic::catch_unwind(|| run(&args)) {
        Ok(code) => code,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error!(file = %args.file.display(), "the compiler crashed: {}", msg);
            ExitCode::from(101)
        }
    }
}
