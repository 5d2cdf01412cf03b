use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docent::config::DocentConfig;
use docent::{cli, server};

#[derive(Parser)]
#[command(name = "docent", version, about = "Documentation chat server with teach-back roleplay")]
struct Cli {
    /// Config file (defaults to ~/.docent/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Chunk, embed, and store documentation files (txt, md)
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the passages a query would retrieve
    Search { query: String },
    /// Show logged interactions for a user, newest first
    History {
        user_id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show document store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DocentConfig::load_from(path)?,
        None => DocentConfig::load()?,
    };

    // stdout is reserved for command output; logs go to stderr.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Ingest { files } => cli::ingest::ingest(&config, &files).await?,
        Command::Search { query } => cli::search::search(&config, &query).await?,
        Command::History { user_id, limit } => cli::history::history(&config, &user_id, limit)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
