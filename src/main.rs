//! Synthetics CI - trigger synthetic tests from CI and gate the build on them
//!
//! Configuration is merged from defaults, a JSON config file, environment
//! variables, and CLI flags, then the selected tests run as one batch.

use clap::Parser;
use synthetics::commands::Commands;
use synthetics::common::logging;
use synthetics::config::EnvSnapshot;

#[derive(Parser)]
#[command(name = "synthetics", about = "Run synthetic tests from CI")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    let env = EnvSnapshot::capture();
    match synthetics::cli::dispatch(cli.command, &env).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
