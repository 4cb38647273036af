//! # Document Concierge CLI (`concierge`)
//!
//! Chat with an indexed set of internal documents and web pages.
//!
//! ## Usage
//!
//! ```bash
//! concierge --config ./config/concierge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `concierge sources` | Show the configured source root and URLs |
//! | `concierge index [--dry-run]` | Build the index once and print counts |
//! | `concierge ask "<question>"` | Answer one question and exit |
//! | `concierge chat` | Interactive session (`:mode`, `:history`, `:quit`) |
//!
//! The API key is read from `OPENAI_API_KEY`; a `.env` file in the working
//! directory is loaded first.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use doc_concierge::config::LoggingConfig;
use doc_concierge::models::AnswerMode;
use doc_concierge::{chat, config, ingest, logging, sources};

#[derive(Parser)]
#[command(
    name = "concierge",
    about = "Document Concierge: retrieval-augmented chat over internal documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/concierge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured sources and whether they are reachable.
    Sources,

    /// Load, chunk and embed every source once, then print counts.
    Index {
        /// Only load and chunk; no embedding calls, no API key needed.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// `search` points at documents, `inquiry` answers from them.
        #[arg(long, default_value = "search")]
        mode: AnswerMode,
    },

    /// Start an interactive chat session on stdin.
    Chat {
        #[arg(long, default_value = "search")]
        mode: AnswerMode,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            logging::init(&LoggingConfig::default());
            error!(config = %cli.config.display(), "invalid configuration: {:#}", e);
            logging::shutdown();
            return Err(e);
        }
    };
    logging::init(&cfg.logging);
    info!(config = %cli.config.display(), "concierge starting");

    let result = match cli.command {
        Commands::Sources => {
            sources::list_sources(&cfg.sources);
            Ok(())
        }
        Commands::Index { dry_run } => ingest::run_index(&cfg, dry_run)
            .await
            .map_err(anyhow::Error::from),
        Commands::Ask { question, mode } => chat::run_ask(&cfg, &question, mode).await,
        Commands::Chat { mode } => chat::run_chat(&cfg, mode).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    logging::shutdown();
    result
}
