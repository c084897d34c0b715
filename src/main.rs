//! # stratalog
//!
//! Evaluate a program document and print the query's relation.
//!
//! ## Usage
//!
//! ```bash
//! stratalog program.json
//! stratalog program.json --query reach --json
//! stratalog program.json --config ./stratalog.toml --pattern bf
//! ```
//!
//! Log output goes to stderr; level and format come from the `[logging]`
//! config section, overridden by `STRATALOG_LOG` or `RUST_LOG`.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use stratalog::adornment::Adornment;
use stratalog::config::LoggingConfig;
use stratalog::{Config, Evaluator, ProgramDocument};

#[derive(Parser, Debug)]
#[command(name = "stratalog", version, about = "Stratified Datalog evaluator")]
struct Args {
    /// Program document (JSON: query, facts, rules)
    program: PathBuf,

    /// Configuration file; defaults to stratalog.toml + stratalog.local.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Query to evaluate instead of the document's
    #[arg(long)]
    query: Option<String>,

    /// Binding pattern for the query head, e.g. `bf`
    #[arg(long)]
    pattern: Option<String>,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load().context("loading configuration")?,
    };
    init_tracing(&config.logging)?;

    let program = ProgramDocument::from_path(&args.program)?;
    let evaluator = Evaluator::from_config(&config);
    let query = args.query.as_deref().unwrap_or(&program.query);

    let result = match &args.pattern {
        Some(suffix) => {
            let Some(pattern) = Adornment::from_suffix(suffix) else {
                bail!("invalid binding pattern '{suffix}': use only 'b' and 'f'");
            };
            let edb = program.edb()?;
            evaluator.eval_with_pattern(query, &pattern, &program.rule_set(), &edb)?
        }
        None => program.run(&evaluator, Some(query))?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.sorted_rows())?);
    } else {
        print!("{result}");
    }
    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) -> Result<()> {
    // Environment variables take precedence over config file values
    let level = env::var("STRATALOG_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| logging_config.level.clone());

    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if logging_config.is_json() {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
