use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::{AppContext, InitArgs};
use crate::core::error::HasteError;
use crate::core::optimizer::Strategy;

/// Config files looked up in priority order; the first one found wins
pub const CONFIG_FILES: [&str; 4] = ["haste.toml", "haste.yaml", "haste.json", ".haste.toml"];

/// Prefix of environment overrides, e.g. `HASTE_TOP_K=3`
pub const ENV_PREFIX: &str = "HASTE";

/// Parameters of the selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig
{
    /// Seeds taken from the ranked pool
    pub top_k: usize,

    /// Size of the lexical candidate pool
    pub prefilter: usize,

    /// Expansion hops over the call graph
    pub bfs_depth: usize,

    /// Maximum symbols added by expansion
    pub max_add: usize,

    /// Rerank the pool with embeddings
    pub semantic_enabled: bool,

    /// Output token limit
    pub hard_cap: usize,

    /// Advisory output token limit
    pub soft_cap: usize,

    /// Model whose tokenizer counts the budget
    pub target_model: String,

    pub strategy: Strategy,

    /// Weight of the normalized BM25 score in the blend
    pub lexical_weight: f64,

    /// Weight of the normalized cosine score in the blend
    pub semantic_weight: f64,

    /// Vector size of the built-in hashing embedder
    pub embedding_dim: usize,
}

impl Default for SelectorConfig
{
    fn default() -> Self
    {
        Self {
            top_k: 6,
            prefilter: 300,
            bfs_depth: 1,
            max_add: 12,
            semantic_enabled: false,
            hard_cap: 1200,
            soft_cap: 1800,
            target_model: "gpt-4o".to_string(),
            strategy: Strategy::Haste,
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            embedding_dim: 256,
        }
    }
}

impl SelectorConfig
{
    /// Whether any path of this configuration calls an embedder
    pub fn needs_embedder(&self) -> bool
    {
        self.semantic_enabled || self.strategy == Strategy::Semantic
    }

    /// Reject parameter combinations before any work starts
    pub fn validate(
        &self,
        has_embedder: bool,
    ) -> Result<(), HasteError>
    {
        if self.top_k == 0
        {
            return Err(HasteError::config("top_k must be at least 1"));
        }
        if self.prefilter < self.top_k
        {
            return Err(HasteError::config(format!(
                "prefilter ({}) must be at least top_k ({})",
                self.prefilter, self.top_k
            )));
        }
        if self.hard_cap == 0
        {
            return Err(HasteError::config("hard_cap must be at least 1"));
        }
        if self.target_model.trim().is_empty()
        {
            return Err(HasteError::config("target_model must not be empty"));
        }

        let weights = [self.lexical_weight, self.semantic_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(HasteError::config("score weights must be finite and non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0
        {
            return Err(HasteError::config("score weights must not both be zero"));
        }

        if self.needs_embedder()
        {
            if !has_embedder
            {
                return Err(HasteError::config(
                    "semantic scoring is enabled but no embedder is configured",
                ));
            }
            if self.embedding_dim == 0
            {
                return Err(HasteError::config("embedding_dim must be at least 1"));
            }
        }

        Ok(())
    }

    /// `max_tokens` replaces the hard cap when given
    pub fn effective_hard_cap(
        &self,
        max_tokens: Option<usize>,
    ) -> Result<usize, HasteError>
    {
        match max_tokens
        {
            Some(0) => Err(HasteError::config("max_tokens must be at least 1")),
            Some(n) => Ok(n),
            None => Ok(self.hard_cap),
        }
    }
}

/// Load configuration from the working directory and the environment
pub fn load_config() -> Result<SelectorConfig, HasteError>
{
    load_config_from(Path::new("."))
}

/// Load configuration from `dir` and the environment.
///
/// Values that do not fit their type (a negative `max_add`, a word
/// where a number belongs) are configuration errors.
pub fn load_config_from(dir: &Path) -> Result<SelectorConfig, HasteError>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    if let Some(path) = find_config_file(dir)
    {
        debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(config::File::from(path));
    }

    // Environment variables with HASTE_ prefix
    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .map_err(|e| HasteError::config(format!("failed to load configuration: {e}")))?;
    cfg.try_deserialize()
        .map_err(|e| HasteError::config(format!("failed to parse configuration: {e}")))
}

fn find_config_file(dir: &Path) -> Option<PathBuf>
{
    CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("haste.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = SelectorConfig::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
