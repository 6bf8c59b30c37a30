use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckConfigArgs, RunArgs};

#[derive(Parser)]
#[command(name = "crossarb")]
#[command(about = "Crossed order book arbitrage trader for SFOX", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream order books and trade every configured pair
    Run(RunArgs),
    /// Load and validate the configuration, then print per-pair limits
    CheckConfig(CheckConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run(args).await?,
        Commands::CheckConfig(args) => commands::check_config(&args)?,
    }

    Ok(())
}
