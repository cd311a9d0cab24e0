//! Warmup: account warm-up daemon
//!
//! Main binary with subcommands:
//! - `daemon`: scan loop, worker pool and the control API
//! - `connect`, `start`, `pause`, `resume`, `stop`, `karma`: account control
//! - `stats`, `report`: read-only views

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod control;
mod daemon;

use client::ControlClient;

#[derive(Parser)]
#[command(name = "warmup")]
#[command(about = "Account warm-up daemon", long_about = None)]
struct Cli {
    /// Control API of a running daemon
    #[arg(
        long,
        global = true,
        env = "WARMUP_CONTROL_URL",
        default_value = "http://127.0.0.1:8790"
    )]
    control_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (scan loop, workers, control API)
    Daemon {
        /// Directory for persisted accounts and jobs
        #[arg(long, env = "WARMUP_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Social gateway URL
        #[arg(long, env = "WARMUP_GATEWAY_URL")]
        gateway_url: String,

        /// Content generation service URL
        #[arg(long, env = "WARMUP_CONTENT_URL")]
        content_url: String,

        /// Control API port
        #[arg(long, env = "WARMUP_PORT", default_value = "8790")]
        port: u16,
    },

    /// Register an account for warm-up
    Connect {
        id: String,

        /// Community to act in (repeatable; defaults apply when omitted)
        #[arg(long = "subreddit")]
        subreddits: Vec<String>,
    },

    /// Start warm-up and schedule the first jobs now
    Start { id: String },

    /// Pause scheduling for an account
    Pause { id: String },

    /// Resume a paused account at its current phase
    Resume { id: String },

    /// Stop warm-up and reset the account's window
    Stop { id: String },

    /// Record an observed karma value
    Karma { id: String, karma: i64 },

    /// Show account counts by status and queue counts
    Stats,

    /// Show one account with today's progress and pending jobs
    Report { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "warmup=info,warmup_engine=info,warmup_queue=info".to_string()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let client = ControlClient::new(&cli.control_url);
    let result = match cli.command {
        Commands::Daemon {
            data_dir,
            gateway_url,
            content_url,
            port,
        } => {
            return daemon::run(daemon::DaemonConfig {
                data_dir,
                gateway_url,
                content_url,
                port,
            })
            .await;
        }

        Commands::Connect { id, subreddits } => {
            client
                .post(
                    &["accounts"],
                    Some(json!({ "id": id, "targetSubreddits": subreddits })),
                )
                .await?
        }
        Commands::Start { id } => client.post(&["accounts", id.as_str(), "start"], None).await?,
        Commands::Pause { id } => client.post(&["accounts", id.as_str(), "pause"], None).await?,
        Commands::Resume { id } => client.post(&["accounts", id.as_str(), "resume"], None).await?,
        Commands::Stop { id } => client.post(&["accounts", id.as_str(), "stop"], None).await?,
        Commands::Karma { id, karma } => {
            client
                .post(&["accounts", id.as_str(), "karma"], Some(json!({ "karma": karma })))
                .await?
        }
        Commands::Stats => client.get(&["stats"]).await?,
        Commands::Report { id } => client.get(&["accounts", id.as_str()]).await?,
    };

    let pretty = serde_json::to_string_pretty(&result).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", pretty);
    Ok(())
}
