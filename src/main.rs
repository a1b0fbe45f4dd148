//! cc2olx CLI entrypoint

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cc2olx::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG overrides the --loglevel argument.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.loglevel.env_filter_directive())),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    cli.execute()
}
