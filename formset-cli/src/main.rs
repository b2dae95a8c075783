//! Runs a JSON form description through a form group and prints the state
//! of every field after each step.

mod error;
mod form;

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use simplelog::{Config, LevelFilter, WriteLogger};

use formset_lib::GroupConfig;

use crate::error::CliError;
use crate::form::FormDescription;

#[derive(Parser)]
#[command(name = "formset-cli")]
#[command(about = "Validate a form description and print each field's state")]
struct Cli {
    /// Form description (JSON)
    form: PathBuf,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,

    /// Do not prefix messages with the field name
    #[arg(long)]
    no_full_messages: bool,
}

fn init_logging(cli: &Cli) -> Result<(), CliError> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    match &cli.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| CliError::LogFile {
                path: path.clone(),
                source,
            })?;
            WriteLogger::init(level, Config::default(), file)?;
        }
        None => WriteLogger::init(level, Config::default(), std::io::stderr())?,
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    init_logging(&cli)?;

    let text = std::fs::read_to_string(&cli.form).map_err(|source| CliError::Read {
        path: cli.form.clone(),
        source,
    })?;
    let form: FormDescription = serde_json::from_str(&text)?;
    log::debug!("Loaded {} fields from {}", form.fields.len(), cli.form.display());

    let config = GroupConfig::default().with_full_messages(!cli.no_full_messages);
    for step in form.run(config).await? {
        println!("{}", serde_json::to_string_pretty(&step)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
