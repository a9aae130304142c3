mod acquire;
mod analyze;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "adintel")]
#[command(about = "Competitive ad intelligence from public ad libraries")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover a page's creatives and derive every report facet
    Acquire(acquire::AcquireArgs),
    /// Recompute report facets from a stored JSON snapshot
    Analyze(analyze::AnalyzeArgs),
}

/// `RUST_LOG` wins; otherwise the configured level. Logs go to stderr so
/// stdout stays machine-readable.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = adintel_core::load_app_config_from_env()?;
    init_tracing(&config.log_level);
    tracing::debug!(env = %config.env, "configuration loaded");

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Acquire(args)) => acquire::run_acquire(&config, args).await,
        Some(Commands::Analyze(args)) => analyze::run_analyze(&config, &args),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
