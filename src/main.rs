//! # Writer Helper CLI (`writer-helper`)
//!
//! ## Usage
//!
//! ```bash
//! writer-helper --config ./config/writer-helper.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `writer-helper serve` | Start the HTTP server |
//! | `writer-helper chat [--document FILE]` | Chat in the terminal |
//!
//! Credentials come from `OPENAI_API_KEY` / `OPENAI_API_BASE`, optionally
//! via a `.env` file in the working directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use writer_helper::config::{self, Credentials};
use writer_helper::dispatch::Dispatcher;
use writer_helper::embedding::create_provider;
use writer_helper::llm::OpenAIClient;
use writer_helper::{repl, server};

/// Writer Helper: document chat and writing feedback on a hosted LLM.
#[derive(Parser)]
#[command(name = "writer-helper", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/writer-helper.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Chat in the terminal, one line per turn.
    Chat {
        /// PDF or text file to load before the first turn.
        #[arg(long)]
        document: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,writer_helper=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let credentials = Credentials::from_env();
    tracing::debug!(?credentials, "loaded credentials");

    let llm = OpenAIClient::new(
        credentials.clone(),
        Duration::from_secs(cfg.llm.timeout_secs),
    )
    .context("failed to build LLM client")?;
    let embedder = create_provider(&cfg.embedding, &credentials)?;

    let bind = cfg.server.bind.clone();
    let dispatcher = Dispatcher::new(Arc::new(cfg), Arc::new(llm), embedder);

    match cli.command {
        Commands::Serve { bind: override_bind } => {
            server::run_server(override_bind.as_deref().unwrap_or(&bind), dispatcher).await?;
        }
        Commands::Chat { document } => {
            repl::run_chat(&dispatcher, document.as_deref()).await?;
        }
    }

    Ok(())
}
