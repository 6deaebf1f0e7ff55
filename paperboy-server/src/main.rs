mod config;
mod server;

use clap::{Parser, Subcommand};
use config::Config;
use server::run_server;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "paperboy")]
#[command(about = "Self-hosted peer messaging fabric node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a fabric node
    Start {
        /// Path to configuration file
        #[arg(long = "conf", default_value = "config.yaml")]
        conf: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperboy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { conf } => {
            tracing::info!("Starting Paperboy node with config: {}", conf);

            let cfg = match Config::from_file(&conf) {
                Ok(c) => c,
                Err(error) => {
                    tracing::error!("Failed to load config: {}", error);
                    std::process::exit(1);
                }
            };

            if let Err(error) = run_server(cfg).await {
                tracing::error!("Server error: {}", error);
                std::process::exit(1);
            }
        }
    }
}
