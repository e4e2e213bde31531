//! Requery CLI
//!
//! LLM-based query reformulation experiments: reformulate, retrieve,
//! evaluate, or run the whole grid in one go.

use clap::Parser;
use requery_core::RequeryError;

mod app;
mod commands;
mod progress;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Reformulate(args) => commands::reformulate::run(args).await,
        Commands::Retrieve(args) => commands::retrieve::run(args).await,
        Commands::Evaluate(args) => commands::evaluate::run(args).await,
        Commands::Pipeline(args) => commands::pipeline::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<RequeryError>()
            .map(RequeryError::exit_code)
            .unwrap_or(requery_core::error::exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}
