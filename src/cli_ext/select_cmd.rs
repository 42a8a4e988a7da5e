//! CLI handler for `haste select`.
//!
//! Loads layered configuration, applies flag overrides, builds the
//! optimizer and prints the selected source (or JSON with metrics).

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use crate::cli::{AppContext, SelectArgs, SelectorOverrides};
use crate::core::budgeter::TiktokenCounter;
use crate::core::metrics::OptimizedContext;
use crate::core::optimizer::{OptimizeRequest, Optimizer};
use crate::core::semantic::{Embedder, HashingEmbedder};
use crate::infra::config::{SelectorConfig, load_config};
use crate::infra::io::read_file_smart;

/// Fold command-line overrides into a loaded configuration
pub fn apply_overrides(
    mut cfg: SelectorConfig,
    o: &SelectorOverrides,
) -> SelectorConfig
{
    if let Some(v) = o.top_k
    {
        cfg.top_k = v;
    }
    if let Some(v) = o.prefilter
    {
        cfg.prefilter = v;
    }
    if let Some(v) = o.bfs_depth
    {
        cfg.bfs_depth = v;
    }
    if let Some(v) = o.max_add
    {
        cfg.max_add = v;
    }
    if o.semantic
    {
        cfg.semantic_enabled = true;
    }
    if let Some(v) = o.strategy
    {
        cfg.strategy = v;
    }
    if let Some(v) = o.hard_cap
    {
        cfg.hard_cap = v;
    }
    if let Some(v) = o.soft_cap
    {
        cfg.soft_cap = v;
    }
    if let Some(v) = &o.model
    {
        cfg.target_model = v.clone();
    }
    cfg
}

/// Config + overrides -> ready optimizer with the built-in collaborators
pub fn build_optimizer(overrides: &SelectorOverrides) -> Result<Optimizer>
{
    let cfg = apply_overrides(load_config()?, overrides);
    debug!(?cfg, "effective configuration");

    let embedder: Option<Arc<dyn Embedder>> = cfg
        .needs_embedder()
        .then(|| Arc::new(HashingEmbedder::new(cfg.embedding_dim)) as Arc<dyn Embedder>);

    Ok(Optimizer::new(cfg, Arc::new(TiktokenCounter::new()), embedder)?)
}

#[instrument(skip_all, fields(file = %args.file.display()))]
pub fn run(
    args: SelectArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let optimizer = build_optimizer(&args.overrides)?;

    let content = read_file_smart(&args.file)?;
    let result = optimizer.optimize(OptimizeRequest {
        context: content.as_ref(),
        query: &args.query,
        file_path: &args.file,
        max_tokens: args.max_tokens,
    })?;

    let rendered = if args.json
    {
        serde_json::to_string_pretty(&result).context("serialize result")?
    }
    else
    {
        result
            .content
            .clone()
    };

    match &args.output
    {
        Some(path) =>
        {
            fs::write(path, rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }

    if !ctx.quiet
    {
        eprintln!("{}", summary_line(&result, ctx.no_color));
    }
    Ok(())
}

/// One-line human summary for stderr
pub fn summary_line(
    result: &OptimizedContext,
    no_color: bool,
) -> String
{
    let m = &result.metrics;
    let body = format!(
        "{} symbols, {} -> {} tokens ({:.1}x, {}) in {:.1} ms",
        m.chunks_retrieved,
        m.original_tokens,
        m.compressed_tokens,
        m.compression_ratio,
        m.retrieval_mode,
        m.latency_ms
    );

    if no_color
    {
        format!("✓ {body}")
    }
    else
    {
        format!("{} {}", "✓".green(), body.dimmed())
    }
}
