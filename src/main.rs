//! surreal-rpc — command-line client for the SurrealDB WebSocket RPC endpoint
//!
//! Usage:
//!   surreal-rpc query "SELECT * FROM user"                  # Default ws://127.0.0.1:8000/rpc
//!   surreal-rpc --user root --pass root select user:tobie   # Sign in first
//!   surreal-rpc --namespace test --database test live user  # Print notifications until Ctrl+C

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use surreal_client::{Client, Credentials, LiveNotification};
use surreal_transport::ConnectOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "surreal-rpc", about = "SurrealDB RPC client over a multiplexed WebSocket")]
struct Cli {
    /// Server RPC endpoint (ws:// or wss://)
    #[arg(long, default_value = "ws://127.0.0.1:8000/rpc")]
    url: String,

    /// Namespace to use after connecting
    #[arg(long)]
    namespace: Option<String>,

    /// Database to use after connecting
    #[arg(long)]
    database: Option<String>,

    /// Sign in as this user
    #[arg(long, requires = "pass")]
    user: Option<String>,

    /// Password for --user
    #[arg(long, requires = "user")]
    pass: Option<String>,

    /// Per-request response timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Heartbeat ping interval in milliseconds (0 disables)
    #[arg(long, default_value = "3000")]
    heartbeat_ms: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.surreal-rpc/logs/client.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one or more statements and print each statement's result
    Query {
        sql: String,

        /// Bound variables as a JSON object
        #[arg(long)]
        vars: Option<String>,
    },

    /// Select a whole table or a single record
    Select { thing: String },

    /// Start a live query and print notifications until Ctrl+C
    Live { table: String },

    /// Print the server version
    Version,
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(ref log_file_arg) = cli.log_file {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from(&home).join(".surreal-rpc/logs/client.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn print_json(raw: &str) -> Result<()> {
    let value: Value = serde_json::from_str(raw).context("Server returned invalid JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let options = ConnectOptions::default()
        .with_response_timeout(Duration::from_millis(cli.timeout_ms))
        .with_heartbeat_interval(Duration::from_millis(cli.heartbeat_ms))
        .on_drop(|reason| {
            if let Some(reason) = reason {
                warn!("Connection lost: {reason}");
            }
        });

    let client = Client::connect(&cli.url, options)
        .await
        .with_context(|| format!("Failed to connect to {}", cli.url))?;

    if let (Some(user), Some(pass)) = (&cli.user, &cli.pass) {
        client
            .signin(&Credentials::user(user.as_str(), pass.as_str()))
            .await
            .context("Sign in failed")?;
        info!("Signed in as {user}");
    }

    match (&cli.namespace, &cli.database) {
        (Some(namespace), Some(database)) => {
            client.use_ns(namespace, database).await.context("Failed to select namespace")?;
        }
        (None, None) => {}
        _ => warn!("--namespace and --database must be given together; ignoring"),
    }

    let outcome = run(&client, cli.command).await;
    client.close().await.ok();
    outcome
}

async fn run(client: &Client, command: Command) -> Result<()> {
    match command {
        Command::Query { sql, vars } => {
            let vars: Value = match vars {
                Some(vars) => serde_json::from_str(&vars).context("--vars must be a JSON object")?,
                None => Value::Null,
            };
            let response = client.query(&sql, vars).await?;
            for (index, statement) in response.statements().iter().enumerate() {
                println!("-- statement {index} ({:?})", statement.time);
                print_json(statement.result_text())?;
            }
        }

        Command::Select { thing } => {
            let rows: Value = client.select(&thing).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Command::Live { table } => {
            let id = client
                .live(&table, |n: LiveNotification| println!("{} {}", n.action, n.result_text()))
                .await?;
            info!("Live query {id} started on {table}; press Ctrl+C to stop");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    client.kill(&id).await?;
                }
                _ = client.connection().closed() => {}
            }
        }

        Command::Version => {
            println!("{}", client.version().await?);
        }
    }
    Ok(())
}
