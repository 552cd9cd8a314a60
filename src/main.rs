use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hearth::config::Config;
use hearth::paths;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Personal semantic memory: store text chunks, retrieve them by meaning", long_about = None)]
struct Cli {
    /// Config file (default: ~/.hearth/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overrides [store].path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and create/migrate the database
    Init,

    /// Run the memory service daemon
    Serve {
        /// Host to bind for TCP (default: Unix socket only)
        #[arg(long)]
        host: Option<String>,

        /// TCP port (default: [serve].port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Embed and store one chunk
    Store {
        /// Source document path
        source_path: String,

        /// Chunk text (read from stdin if omitted)
        text: Option<String>,

        /// Category, e.g. journal or knowledge
        #[arg(short, long)]
        kind: String,

        /// Position of the chunk within its source
        #[arg(short, long, default_value_t = 0)]
        index: i64,

        /// normal | high
        #[arg(short, long)]
        priority: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the chunks closest to a query
    Query {
        /// Query text
        query: String,

        /// Number of results (1-50)
        #[arg(short = 'k', long, default_value_t = 5)]
        topk: i64,

        /// Only return chunks of this kind
        #[arg(long)]
        kind: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show database and index status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    match cli.command {
        Commands::Init => {
            let config_path = cli.config.unwrap_or_else(paths::config_path);
            commands::init::execute(&config_path, &config)?;
        }
        Commands::Serve { host, port } => {
            let options = commands::serve::ServeOptions {
                host,
                port: port.unwrap_or(config.serve.port),
            };
            commands::serve::execute(options, &config)?;
        }
        Commands::Store {
            source_path,
            text,
            kind,
            index,
            priority,
            json,
        } => {
            commands::store::execute(
                commands::store::StoreOptions {
                    source_path,
                    kind,
                    chunk_index: index,
                    text,
                    priority,
                    json,
                },
                &config,
            )?;
        }
        Commands::Query {
            query,
            topk,
            kind,
            json,
        } => {
            commands::query::execute(
                commands::query::QueryOptions {
                    query,
                    topk,
                    kind,
                    json,
                },
                &config,
            )?;
        }
        Commands::Status { json } => {
            commands::status::execute(&config, json)?;
        }
    }

    Ok(())
}
