use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portfolio_rag::Result;
use portfolio_rag::commands::{build_index, detect_project, run_query, show_config, show_status};
use portfolio_rag::config::default_base_dir;

#[derive(Parser)]
#[command(name = "portfolio-rag")]
#[command(about = "Retrieval engine for portfolio Q&A: builds and queries a local vector index over markdown documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the index artifacts
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector index from the document root
    Build,
    /// Retrieve context for a query
    Query {
        /// The question to retrieve context for
        query: String,
        /// Fixed number of chunks to return; intent-based when omitted
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Check whether a query mentions a known project
    Detect {
        /// The question to test against the project catalog
        query: String,
    },
    /// Show index and catalog status
    Status,
    /// Show the resolved configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => default_base_dir().map_err(|e| portfolio_rag::RagError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Build => {
            build_index(&base_dir)?;
        }
        Commands::Query { query, top_k } => {
            run_query(&base_dir, &query, top_k)?;
        }
        Commands::Detect { query } => {
            detect_project(&base_dir, &query)?;
        }
        Commands::Status => {
            show_status(&base_dir)?;
        }
        Commands::Config => {
            show_config(&base_dir)?;
        }
    }

    Ok(())
}
