use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brain::config::BrainConfig;
use brain::index::pipeline::EmbedProjectOptions;
use brain::search::{SearchMode, SearchOptions};
use brain::{cli, server};

#[derive(Parser)]
#[command(
    name = "brain",
    version,
    about = "Knowledge-graph memory MCP server for AI coding assistants"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport by default)
    Serve {
        /// Serve over Streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Chunk and embed notes into the vector index
    Embed {
        /// Re-embed notes that already have embeddings
        #[arg(long)]
        force: bool,
        /// Process at most this many notes
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search notes from the command line
    Search {
        /// The query text
        query: String,
        /// Search mode: auto, semantic, keyword, or hybrid
        #[arg(long, default_value = "auto")]
        mode: SearchMode,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Minimum similarity threshold (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,
        /// Follow wiki-links this many hops
        #[arg(long, default_value_t = 0)]
        depth: usize,
        /// Restrict results to this folder prefix (repeatable)
        #[arg(long = "folder")]
        folders: Vec<String>,
        /// Include full note content in results
        #[arg(long)]
        full_content: bool,
        /// Project (notes subdirectory) to search in
        #[arg(long)]
        project: Option<String>,
    },
    /// Show index coverage and backend health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BrainConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Embed { force, limit } => {
            let state = server::setup_shared_state(config)?;
            let options = EmbedProjectOptions {
                force,
                limit: limit.unwrap_or(0),
            };
            cli::embed::run(&state, options).await?;
        }
        Command::Search {
            query,
            mode,
            limit,
            threshold,
            depth,
            folders,
            full_content,
            project,
        } => {
            let options = SearchOptions {
                limit: limit.unwrap_or(config.search.default_limit),
                threshold: threshold.unwrap_or(config.search.default_threshold),
                mode,
                depth,
                folders,
                full_content,
                project,
            };
            let state = server::setup_shared_state(config)?;
            cli::search::run(&state, &query, options).await?;
        }
        Command::Status => {
            let state = server::setup_shared_state(config)?;
            cli::status::run(&state).await?;
        }
    }

    Ok(())
}
