//! LRS CLI - live reload development server.
//!
//! Serves the current directory (or `--web-root`) and refreshes connected
//! browsers when watched files change. Settings come from `livereload.toml`,
//! `LIVERELOAD_*` environment variables and command-line flags.

mod commands;
mod error;
mod output;

use clap::Parser;
use lrs_server::REQUEST_LOG_TARGET;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use commands::ServeArgs;
use output::Output;

/// Application version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LRS - live reload development server.
#[derive(Parser)]
#[command(name = "lrs", version, about)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN.
    // Request lines are always let through; they are only emitted with ShowUrls.
    let mut filter = if cli.serve.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
    };
    if let Ok(directive) = format!("{REQUEST_LOG_TARGET}=info").parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = tokio::runtime::Runtime::new()
        .map_err(error::CliError::from)
        .and_then(|rt| rt.block_on(cli.serve.execute(VERSION)));

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
