//! taskscope - workshop task analysis CLI
//!
//! Runs the analysis pipeline in-process over local documents and manages
//! the response cache shared with `taskscope-server`.

use anyhow::{Context, Result};
use clap::Parser;
use taskscope_core::auth::AccessToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("taskscope={}", level).parse()?)
                .add_directive(format!("taskscope_core={}", level).parse()?),
        )
        .init();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args, &config).await,
        Commands::Extract(args) => commands::extract::execute(args).await,
        Commands::Cache(cmd) => commands::cache::execute(cmd, &config).await,
        Commands::Token => {
            let token = AccessToken::read_from_file(&config.token_file).with_context(|| {
                format!(
                    "no access token at {} (start taskscope-server first)",
                    config.token_file.display()
                )
            })?;
            println!("{}", token.encoded());
            Ok(())
        }
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("taskscope {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
