//! Command-line arguments.
//!
//! Every global flag can also be set through the environment (or a `.env`
//! file, loaded before parsing).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use noteweave_rag::{ProviderKind, SimilarityMetric};

/// Default location of the persisted knowledge base.
pub const DEFAULT_STORE_PATH: &str = "noteweave-store.json";

#[derive(Debug, Parser)]
#[command(name = "noteweave")]
#[command(version)]
#[command(
    about = "Search and question your notes with retrieval-augmented generation",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, env = "NOTEWEAVE_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "NOTEWEAVE_JSON_LOGS", global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Knowledge-base settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// JSON file the knowledge base is stored in
    #[arg(long, env = "NOTEWEAVE_STORE", default_value = DEFAULT_STORE_PATH, global = true)]
    pub store: PathBuf,

    /// Provider answering questions (ollama, openai, anthropic, mistral, lmstudio, mock)
    #[arg(short, long, env = "NOTEWEAVE_PROVIDER", default_value = "ollama", global = true)]
    pub provider: ProviderKind,

    /// Provider embedding notes and questions; defaults to --provider
    #[arg(long, env = "NOTEWEAVE_EMBEDDING_PROVIDER", global = true)]
    pub embedding_provider: Option<ProviderKind>,

    /// Embedding dimension; defaults to the embedding provider's
    #[arg(long, env = "NOTEWEAVE_DIMENSION", global = true)]
    pub dimension: Option<usize>,

    /// Similarity metric (cosine, euclid, innerProduct)
    #[arg(long, env = "NOTEWEAVE_METRIC", default_value = "cosine", global = true)]
    pub metric: SimilarityMetric,

    /// Seconds allowed for each provider call
    #[arg(long, env = "NOTEWEAVE_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// The provider used for embeddings.
    pub fn embedding_kind(&self) -> ProviderKind {
        self.embedding_provider.unwrap_or(self.provider)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add markdown files or directories to the knowledge base
    Add {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Ask a question answered from your notes
    Ask {
        /// The question
        question: String,

        /// Number of notes to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Add a short insight summary
        #[arg(long)]
        summary: bool,

        /// Highlight key terms in the sources
        #[arg(long)]
        highlight: bool,

        /// Print the overall confidence score
        #[arg(long)]
        confidence: bool,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Semantic search without generating an answer
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show notes related to a stored note
    Related {
        /// Id of the note
        id: String,

        /// Minimum relationship strength (0-1)
        #[arg(long)]
        min_strength: Option<f32>,

        /// Maximum number of related notes
        #[arg(long)]
        max: Option<usize>,
    },

    /// Remove a note and its chunks
    Remove {
        /// Note id, or the source path with --by-source
        id: String,

        /// Treat the argument as a source path
        #[arg(long)]
        by_source: bool,
    },

    /// List the stored notes
    List,

    /// Show knowledge-base statistics
    Stats,

    /// Write a backup of the knowledge base
    Export {
        /// Backup file to write
        path: PathBuf,
    },

    /// Replace the knowledge base with a backup
    Import {
        /// Backup file to read
        path: PathBuf,
    },

    /// Show which providers are available
    Providers,
}
