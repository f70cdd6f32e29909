//! capsec CLI entry point.

use capsec_cli::{init_logging, load_config, run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logging settings come from the config file, so load it first
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging);

    // Run the command
    run(cli, config).await
}
