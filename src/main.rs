//! # ragmill CLI
//!
//! The `ragmill` binary drives the engine from the command line and
//! hosts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! ragmill --config ./config/ragmill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragmill init` | Create the store directory and schema |
//! | `ragmill sync` | Ingest documents from the data root |
//! | `ragmill ask "<question>"` | Answer a question from the indexed corpus |
//! | `ragmill status` | Show document count and readiness |
//! | `ragmill reset` | Delete and recreate the persisted store |
//! | `ragmill serve` | Start the HTTP server |

mod chunk;
mod config;
mod context;
mod embedding;
mod error;
mod generate;
mod ids;
mod ingest;
mod lifecycle;
mod loader;
mod models;
mod retrieval;
mod server;
mod store;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::load_config;
use crate::context::EngineContext;

/// ragmill — a document synchronization and retrieval-augmented
/// answering engine.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/ragmill.example.toml`.
#[derive(Parser)]
#[command(
    name = "ragmill",
    about = "ragmill — a document synchronization and retrieval-augmented answering engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the store directory and schema.
    ///
    /// Opens the initial store generation, creating the database file
    /// and tables. Idempotent; running it multiple times is safe.
    Init,

    /// Ingest documents into the store.
    ///
    /// Loads documents from the data root (or `--path`), chunks them
    /// deterministically, and inserts only fragments whose ids are not
    /// yet persisted. Re-running over an unchanged corpus adds nothing.
    Sync {
        /// Ingest a specific file or directory instead of the
        /// configured data root.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Show document and fragment counts without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the indexed corpus.
    ///
    /// Retrieves the top-k most similar fragments, assembles a bounded
    /// context, and invokes the configured generation provider.
    Ask {
        /// The question text.
        query: String,

        /// Number of fragments to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show store status: document count and readiness.
    Status,

    /// Delete all persisted entries and recreate an empty store.
    ///
    /// Irreversible. Retries removal a bounded number of times if file
    /// handles linger, then falls back to a forceful delete once.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Start the HTTP server.
    ///
    /// Exposes `/ingest`, `/query`, `/status`, `/reset`, and `/health`
    /// on the configured bind address.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,ragmill=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let ctx = EngineContext::from_config(config).await?;
            let count = ctx.lifecycle.count().await?;
            println!("ragmill initialized");
            println!("  store: {}", ctx.config.store.path.display());
            println!("  documents: {}", count);
        }

        Commands::Sync { path, dry_run } => {
            let ctx = EngineContext::from_config(config).await?;
            let report = ingest::run_ingest(&ctx, path.as_deref(), dry_run).await?;

            if dry_run {
                println!("sync (dry-run)");
                println!("  documents loaded: {}", report.documents);
                println!("  fragments: {}", report.fragments);
                return Ok(());
            }

            // run_ingest only omits the outcome on dry runs
            let outcome = report
                .outcome
                .ok_or_else(|| anyhow::anyhow!("ingest produced no sync outcome"))?;
            println!("sync");
            println!("  documents loaded: {}", report.documents);
            println!("  fragments: {}", report.fragments);
            println!("  added: {}", outcome.added);
            println!("  skipped (already persisted): {}", outcome.skipped);
            println!("  total in store: {}", outcome.total);
            println!("ok");
        }

        Commands::Ask { query, top_k } => {
            let ctx = EngineContext::from_config(config).await?;
            let store = ctx.lifecycle.current().await?;
            let result = retrieval::answer(
                &query,
                top_k.unwrap_or(ctx.config.retrieval.top_k),
                ctx.config.retrieval.max_context_chars,
                store.as_ref(),
                ctx.generator.as_ref(),
            )
            .await?;

            println!("{}", result.text);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &result.sources {
                    println!("  {}", source);
                }
            }
        }

        Commands::Status => {
            let ctx = EngineContext::from_config(config).await?;
            let ready = ctx.lifecycle.is_ready().await;
            let count = ctx.lifecycle.count().await.unwrap_or(0);
            println!("ragmill status");
            println!("  store: {}", ctx.config.store.path.display());
            println!("  ready: {}", ready);
            println!("  documents: {}", count);
            println!("  generation model: {}", ctx.generator.model_name());
        }

        Commands::Reset { yes } => {
            if !yes {
                println!(
                    "This will delete every entry in {}. Re-run with --yes to confirm.",
                    config.store.path.display()
                );
                return Ok(());
            }

            let ctx = EngineContext::from_config(config).await?;
            ctx.lifecycle.reset().await?;
            println!("store reset; documents: {}", ctx.lifecycle.count().await?);
        }

        Commands::Serve => {
            let ctx = Arc::new(EngineContext::from_config(config).await?);
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
