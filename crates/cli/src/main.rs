//! Node Collector CLI
//!
//! A command-line tool for reading a node collector's history and live
//! stream, and for posting test events to its ingest surface.

mod client;
mod commands;
mod output;
mod sse;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{ingest, query};

/// Node Collector CLI
#[derive(Parser)]
#[command(name = "nodectl")]
#[command(author, version, about = "CLI for the Node Collector", long_about = None)]
pub struct Cli {
    /// Query surface URL (can also be set via NODECTL_QUERY_URL env var)
    #[arg(long, env = "NODECTL_QUERY_URL", default_value = "http://localhost:3100")]
    pub query_url: String,

    /// Ingest surface URL (can also be set via NODECTL_INGEST_URL env var)
    #[arg(long, env = "NODECTL_INGEST_URL", default_value = "http://localhost:3101")]
    pub ingest_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// History selector, mirrors the collector's `scope` parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    /// Resource samples
    Stats,
    /// Ingested events
    #[default]
    Events,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Stats => "stats",
            Scope::Events => "events",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the collector is alive
    Ping,

    /// Show the retained history
    History {
        /// Which history to read
        #[arg(long, short, value_enum, default_value_t = Scope::Events)]
        scope: Scope,

        /// Only show the newest N entries
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Follow the live stream of newest entries
    Stream {
        /// Which history to follow
        #[arg(long, short, value_enum, default_value_t = Scope::Events)]
        scope: Scope,

        /// Stop after N frames
        #[arg(long, short)]
        count: Option<usize>,
    },

    /// Post a single event to the ingest surface
    Emit {
        /// Event type
        kind: String,

        /// Extra fields as key=value (value parsed as JSON when possible)
        #[arg(long = "field", value_parser = ingest::parse_field)]
        fields: Vec<(String, serde_json::Value)>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ping => {
            let client = client::ApiClient::new(&cli.query_url)?;
            query::ping(&client).await?;
        }
        Commands::History { scope, limit } => {
            let client = client::ApiClient::new(&cli.query_url)?;
            query::show_history(&client, scope, limit, cli.format).await?;
        }
        Commands::Stream { scope, count } => {
            let client = client::ApiClient::new(&cli.query_url)?;
            query::follow_stream(&client, scope, count, cli.format).await?;
        }
        Commands::Emit { kind, fields } => {
            let client = client::ApiClient::new(&cli.ingest_url)?;
            ingest::emit_event(&client, &kind, fields).await?;
        }
    }

    Ok(())
}
