//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP API |
//! | `docchat chunk <file>` | Show how a file is split into chunks |
//! | `docchat search "<query>" --file F` | Rank chunks of the given files |
//! | `docchat ask "<query>" --file F` | Answer a question from the given files |
//!
//! ## Examples
//!
//! ```bash
//! docchat chunk report.pdf
//! docchat search "quarterly revenue" --file report.pdf --file notes.docx --top-k 3
//! GEMINI_API_KEY=... docchat ask "What changed in Q3?" --file report.pdf --variant hybrid
//! docchat serve --config ./config/docchat.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::rag::RagVariant;
use docchat::{commands, config, server};

/// docchat: ask questions about your documents.
///
/// A missing config file is not an error; built-in defaults are used.
/// See `config/docchat.example.toml` for every setting.
#[derive(Parser)]
#[command(name = "docchat", version, about = "Chat with PDFs, Word files, and images")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Extract and chunk one file, printing each chunk's span and length.
    Chunk {
        file: PathBuf,
    },

    /// Ingest files and print the chunks that best match a query.
    Search {
        query: String,

        /// File to ingest (repeatable).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Maximum hits (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ingest files and answer a question from them.
    Ask {
        query: String,

        /// File to ingest (repeatable).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Retrieval strategy: basic, knowledge_graph, or hybrid.
        #[arg(long, default_value = "basic")]
        variant: RagVariant,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "docchat=debug,tower_http=debug"
    } else {
        "docchat=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chunk { file } => {
            commands::run_chunk(&cfg, &file).await?;
        }
        Commands::Search {
            query,
            files,
            top_k,
        } => {
            commands::run_search(&cfg, &query, &files, top_k).await?;
        }
        Commands::Ask {
            query,
            files,
            variant,
        } => {
            commands::run_ask(&cfg, &query, &files, variant).await?;
        }
    }

    Ok(())
}
