//! End-to-end selection scenarios through `Optimizer::optimize`.

mod util;

use std::path::Path;
use std::sync::Arc;

use haste::core::budgeter::TiktokenCounter;
use haste::core::error::{HasteError, Stage};
use haste::core::graph::SymbolGraph;
use haste::core::lexical::LexicalScorer;
use haste::core::metrics::RetrievalMode;
use haste::core::optimizer::{OptimizeRequest, Optimizer, Strategy};
use haste::core::semantic::Embedder;
use haste::core::symbols::{Language, get_builder};
use haste::infra::config::SelectorConfig;
use util::{FailingEmbedder, KeywordEmbedder, fixture, optimizer, request};

fn narrow() -> SelectorConfig
{
    SelectorConfig { top_k: 1, bfs_depth: 1, max_add: 5, ..SelectorConfig::default() }
}

fn keywords() -> Arc<dyn Embedder>
{
    Arc::new(KeywordEmbedder { vocabulary: vec!["cache", "config", "render"] })
}

#[test]
fn seed_brings_its_callee_and_nothing_unrelated() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let path = Path::new("pipeline.py");

    let out = optimizer(narrow(), None)?.optimize(request(&src, "load config", path))?;

    assert_eq!(out.metrics.selected, ["parse_toml", "load_config"]);
    assert!(out.content.starts_with("def parse_toml(text):"));
    assert!(out.content.contains("\n\ndef load_config(path):"));
    assert!(!out.content.contains("render_page"));
    assert!(!out.content.contains("class Cache"));
    assert_eq!(out.metrics.retrieval_mode, RetrievalMode::Bm25);
    assert_eq!(out.metrics.chunks_retrieved, 2);
    assert!(out.metrics.compression_ratio > 1.0);
    Ok(())
}

#[test]
fn hard_cap_below_top_seed_is_an_assemble_error() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let cfg = SelectorConfig { hard_cap: 5, ..narrow() };

    let err = optimizer(cfg, None)?
        .optimize(request(&src, "load config", Path::new("pipeline.py")))
        .unwrap_err();

    match err
    {
        HasteError::Optimizer { stage, symbol, .. } =>
        {
            assert_eq!(stage, Stage::Assemble);
            assert_eq!(symbol.as_deref(), Some("load_config"));
        }
        other => panic!("expected optimizer error, got {other}"),
    }
    Ok(())
}

#[test]
fn max_tokens_evicts_expansion_first() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    // load_config alone is 11 whitespace tokens
    let out = optimizer(narrow(), None)?.optimize(OptimizeRequest {
        max_tokens: Some(11),
        ..request(&src, "load config", Path::new("pipeline.py"))
    })?;

    assert_eq!(out.metrics.selected, ["load_config"]);
    assert_eq!(out.metrics.compressed_tokens, 11);
    Ok(())
}

#[test]
fn self_calls_connect_methods() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let out = optimizer(narrow(), None)?.optimize(request(&src, "put", Path::new("pipeline.py")))?;

    assert_eq!(out.metrics.selected, ["Cache.put", "Cache.evict"]);
    assert!(out.content.starts_with("def put(self, key, value):"));
    assert!(!out.content.contains("class Cache"));
    Ok(())
}

#[test]
fn lexical_only_scores_are_not_blended()
{
    let src = fixture("pipeline.py");
    let graph: SymbolGraph = get_builder(Language::Python)
        .and_then(|b| b.build(&src, Path::new("pipeline.py")))
        .expect("fixture parses");

    let pool = LexicalScorer::new(300).rank(&graph, "cache entries evict");
    assert!(!pool.is_empty());
    for c in &pool
    {
        assert!(c.semantic.is_none());
        assert_eq!(c.combined, c.lexical);
    }
}

#[test]
fn repeated_calls_give_identical_output() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let opt = optimizer(SelectorConfig::default(), None)?;
    let req = request(&src, "cache get put", Path::new("pipeline.py"));

    let first = opt.optimize(req)?;
    let second = opt.optimize(req)?;

    assert_eq!(first.content, second.content);
    assert_eq!(first.metrics.selected, second.metrics.selected);
    assert_eq!(first.metrics.compressed_tokens, second.metrics.compressed_tokens);
    assert_eq!(first.metrics.original_tokens, second.metrics.original_tokens);
    Ok(())
}

#[test]
fn hybrid_mode_keeps_the_lexical_winner() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let cfg = SelectorConfig { semantic_enabled: true, ..narrow() };

    let out =
        optimizer(cfg, Some(keywords()))?.optimize(request(&src, "load config", Path::new("pipeline.py")))?;

    assert_eq!(out.metrics.retrieval_mode, RetrievalMode::Hybrid);
    assert_eq!(out.metrics.selected, ["parse_toml", "load_config"]);
    Ok(())
}

#[test]
fn semantic_strategy_ranks_by_embedding_alone() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let cfg = SelectorConfig { strategy: Strategy::Semantic, top_k: 1, ..SelectorConfig::default() };

    let out = optimizer(cfg, Some(keywords()))?.optimize(request(&src, "cache", Path::new("pipeline.py")))?;

    assert_eq!(out.metrics.retrieval_mode, RetrievalMode::Semantic);
    assert_eq!(out.metrics.selected, ["Cache"]);
    assert!(out.content.starts_with("class Cache:"));
    Ok(())
}

#[test]
fn embedder_failure_surfaces_in_score_stage() -> anyhow::Result<()>
{
    let src = fixture("pipeline.py");
    let cfg = SelectorConfig { semantic_enabled: true, ..narrow() };

    let err = optimizer(cfg, Some(Arc::new(FailingEmbedder)))?
        .optimize(request(&src, "load config", Path::new("pipeline.py")))
        .unwrap_err();

    assert!(matches!(err, HasteError::Optimizer { stage: Stage::Score, .. }));
    assert!(err.to_string().contains("connection refused"));
    Ok(())
}

#[test]
fn syntax_errors_report_location()
{
    let err = optimizer(SelectorConfig::default(), None)
        .and_then(|o| o.optimize(request("def broken(:\n    pass\n", "broken", Path::new("bad.py"))))
        .unwrap_err();

    match err
    {
        HasteError::Parse { path, line, .. } =>
        {
            assert_eq!(path, "bad.py");
            assert_eq!(line, 1);
        }
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn rust_sources_follow_free_function_callers() -> anyhow::Result<()>
{
    let src = fixture("callgraph.rs");
    let out = optimizer(narrow(), None)?.optimize(request(&src, "checksum", Path::new("callgraph.rs")))?;

    assert!(out.metrics.selected.iter().any(|id| id == "checksum"));
    assert!(out.metrics.selected.iter().any(|id| id.ends_with("summary")));
    assert!(out.content.contains("pub fn checksum(values: &[i64]) -> i64"));
    assert!(!out.content.contains("unrelated_banner"));
    Ok(())
}

#[test]
fn tiktoken_counts_the_target_function_fixture() -> anyhow::Result<()>
{
    let src = fixture("scaledown.py");
    let cfg = SelectorConfig { top_k: 2, ..SelectorConfig::default() };
    let opt = Optimizer::new(cfg, Arc::new(TiktokenCounter::new()), None)?;

    let out = opt.optimize(request(&src, "target_function", Path::new("scaledown.py")))?;

    assert!(out.content.contains("def target_function"));
    assert!(out.content.contains("def dependency"));
    assert!(out.metrics.original_tokens > 0);
    assert!(out.metrics.compressed_tokens <= 1200);
    assert_eq!(out.metrics.target_model, "gpt-4o");
    Ok(())
}
