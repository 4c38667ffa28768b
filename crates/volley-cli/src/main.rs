use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use volley_execution::LogFormat;
use volley_execution::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "volley", version)]
#[command(about = "Batch and streaming inference against OpenAI-compatible engines", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/volley/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format on stderr
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt collection through the engine and write the results
    Batch(commands::batch::BatchArgs),
    /// Start an interactive streaming chat
    Chat(commands::chat::ChatArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the REPL readable unless RUST_LOG asks for more.
    let default_level = match cli.command {
        Commands::Batch(_) => "info",
        Commands::Chat(_) => "warn",
    };
    telemetry::init(cli.log_format, default_level)?;

    let config = commands::load_config(cli.config)?;
    match cli.command {
        Commands::Batch(args) => commands::batch::run(args, config).await?,
        Commands::Chat(args) => commands::chat::run(args, config).await?,
    }

    Ok(())
}
