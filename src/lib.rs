//! **haste** - Query-driven, token-budgeted symbol selection for LLM code context
//!
//! Parses one source file into a symbol graph, ranks symbols against a query with
//! BM25 (optionally blended with embeddings), grows the best seeds along the call
//! graph and renders them back under a hard token cap.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Command handlers behind the CLI subcommands
pub mod cli_ext {
    /// `haste select`: one file, one query
    pub mod select_cmd;
    pub use select_cmd::run as select_run;

    /// `haste batch`: JSON Lines jobs fanned out with rayon
    pub mod batch_cmd;
    pub use batch_cmd::run as batch_run;
}

/// Selection engine - parse, score, expand, assemble
pub mod core {
    /// Error taxonomy (parse / optimizer / configuration) with miette diagnostics
    pub mod error;
    pub use error::{HasteError, Result, Stage};

    /// Symbol records and the per-file call graph (petgraph)
    pub mod graph;
    pub use graph::{Reference, Symbol, SymbolGraph, SymbolId, SymbolKind};

    /// Language detection and the graph builder registry
    pub mod symbols;
    pub use symbols::{GraphBuilder, Language, get_builder};

    /// BM25 candidate pool
    pub mod lexical;
    pub use lexical::{LexicalScorer, ScoredCandidate};

    /// Embedding rerank and the hashing embedder
    pub mod semantic;
    pub use semantic::{EmbedError, Embedder, HashingEmbedder, ScoreWeights, SemanticScorer};

    /// Bounded BFS over callers and callees
    pub mod expand;
    pub use expand::{Origin, SelectionSet, expand};

    /// Token counting with tiktoken and moka caching
    pub mod budgeter;
    pub use budgeter::{TiktokenCounter, TokenCounter};

    /// Source-order rendering under hard and soft caps
    pub mod assemble;
    pub use assemble::{Assembler, Assembly, Caps};

    /// Compression ratio, latency and stage timings
    pub mod metrics;
    pub use metrics::{Metrics, OptimizedContext, RetrievalMode, StageTimings};

    /// Strategy dispatch behind one `optimize`
    pub mod optimizer;
    pub use optimizer::{OptimizeRequest, Optimizer, Strategy};
}

/// Language processing - tree-sitter graph builders
pub mod parsers {
    /// Rust items, impl/trait methods and path references
    pub mod rust_parser;
    pub use rust_parser::RustGraphBuilder;

    /// Python functions, classes, methods and statement runs
    pub mod python_parser;
    pub use python_parser::PythonGraphBuilder;

    // Re-export common builder interface
    pub use crate::core::symbols::{GraphBuilder, get_builder};
}

/// Infrastructure - Configuration, I/O, logging and utilities
pub mod infra {
    /// Layered configuration (file + HASTE_* environment) and validation
    pub mod config;
    pub use config::{SelectorConfig, init as config_init, load_config};

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// tracing-subscriber setup for the binary
    pub mod logging;

    /// Utility functions and helpers for common operations
    pub mod utils;
    // Keep utils private - not part of the public API
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use cli_ext::{batch_run, select_run};
pub use infra::{SelectorConfig, load_config};

// Core types for external consumers
pub use core::{
    HasteError, OptimizeRequest, OptimizedContext, Optimizer, Strategy, TiktokenCounter,
    TokenCounter,
};
