use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::optimizer::Strategy;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "haste")]
#[command(
    about = "Query-driven, token-budgeted selection of the symbols in a source file that matter"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress summaries and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select the symbols of one file relevant to a query
    Select(SelectArgs),

    /// Run many selections from a JSON Lines job file
    Batch(BatchArgs),

    /// Initialize a haste.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Per-run overrides of the loaded configuration
#[derive(Args, Debug, Clone, Default)]
pub struct SelectorOverrides {
    /// Seeds taken from the ranked pool
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Size of the lexical candidate pool
    #[arg(long)]
    pub prefilter: Option<usize>,

    /// Expansion hops over the call graph
    #[arg(long)]
    pub bfs_depth: Option<usize>,

    /// Maximum symbols added by expansion
    #[arg(long)]
    pub max_add: Option<usize>,

    /// Rerank candidates with embeddings (hybrid retrieval)
    #[arg(long)]
    pub semantic: bool,

    /// Selection strategy
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Output token limit
    #[arg(long)]
    pub hard_cap: Option<usize>,

    /// Advisory output token limit
    #[arg(long)]
    pub soft_cap: Option<usize>,

    /// GPT model or encoding for token counting (e.g., gpt-4o, o200k_base)
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SelectArgs {
    /// Source file to select from
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// What the caller is looking for
    #[arg(short, long)]
    pub query: String,

    /// Token budget; overrides the configured hard cap
    #[arg(long)]
    pub max_tokens: Option<usize>,

    #[command(flatten)]
    pub overrides: SelectorOverrides,

    /// Emit JSON (content plus metrics) instead of plain text
    #[arg(long)]
    pub json: bool,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// JSON Lines file; each line is {"file": .., "query": .., "max_tokens": ..}
    #[arg(value_name = "JOBS")]
    pub jobs: PathBuf,

    #[command(flatten)]
    pub overrides: SelectorOverrides,

    /// Emit one JSON result per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
