//! TokenGuard CLI - Main entry point

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokenguard_rpc::{commands, AppConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokenguard")]
#[command(about = "TokenGuard - compliance risk evaluation and alerting for tokenized assets", long_about = None)]
struct Cli {
    /// Configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, env = "TOKENGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket alert gateway
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long, env = "TOKENGUARD_BIND")]
        bind: Option<String>,
        /// Replay a JSONL file of transaction events while serving
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Evaluate a single request file
    Evaluate {
        /// ActionRequest JSON, or a bare transfer / corporate action
        request: PathBuf,
    },

    /// Replay a JSONL file of transaction events
    Replay {
        events: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, events } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            commands::serve(config, events.as_deref()).await?;
        }

        Commands::Evaluate { request } => {
            commands::evaluate(config, &request).await?;
        }

        Commands::Replay { events } => {
            commands::replay(config, &events).await?;
        }

        Commands::Config => {
            commands::show_config(&config)?;
        }
    }

    Ok(())
}
