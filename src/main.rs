use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod evaluation;
mod features;
mod models;
mod output;
mod runner;
mod scorer;
mod store;

use crate::config::Config;
use crate::output::OutputFormat;
use crate::runner::Runner;
use crate::store::{JsonStore, PostgresStore, ResponseStore};

/// LLM error-explanation benchmark - score stored model responses and rank the models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file (built-in defaults when omitted)
    config: Option<PathBuf>,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every scored response
    #[arg(short, long)]
    verbose: bool,

    /// Read responses from a JSON export instead of PostgreSQL
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Do not write the summary back to the store
    #[arg(long)]
    no_write_back: bool,

    /// Report file path
    #[arg(long)]
    report: Option<String>,

    /// Results JSON file path
    #[arg(long)]
    results: Option<String>,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("llm_error_bench=debug,info")
        } else {
            EnvFilter::new("llm_error_bench=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let config = Config::default();
            config.validate()?;
            config
        }
    };
    if args.no_write_back {
        config.output.write_back = false;
    }
    if let Some(report) = args.report {
        config.output.report_path = report;
    }
    if let Some(results) = args.results {
        config.output.results_path = results;
    }

    let mut store: Box<dyn ResponseStore> = match &args.input {
        Some(path) => Box::new(JsonStore::open(path)?),
        None => Box::new(PostgresStore::connect(&config.database).await?),
    };

    let runner = Runner::new(config);
    let outcome = runner.run(store.as_mut()).await?;

    output::print_results(&outcome.result, outcome.evaluated_at, args.output);

    Ok(())
}
