//! Filepath: src/core/optimizer.rs
//! One `optimize` entry point over the selection strategies.
//!
//! `haste` runs the whole pipeline: parse, BM25 pool, optional
//! embedding rerank, seed selection, call-graph expansion and budgeted
//! assembly. `semantic` ranks every symbol by embedding similarity
//! alone and skips expansion.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::assemble::{Assembler, Caps};
use crate::core::budgeter::TokenCounter;
use crate::core::error::{HasteError, Result, Stage};
use crate::core::expand::{SelectionSet, expand};
use crate::core::graph::{SymbolGraph, SymbolId};
use crate::core::lexical::{LexicalScorer, ScoredCandidate};
use crate::core::metrics::{
    Metrics, OptimizedContext, RetrievalMode, StageClock, compression_ratio,
};
use crate::core::semantic::{Embedder, ScoreWeights, SemanticScorer};
use crate::core::symbols::{Language, get_builder};
use crate::infra::config::SelectorConfig;

/// Selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Lexical pool, optional rerank, call-graph expansion
    #[default]
    Haste,
    /// Embedding similarity only, no expansion
    Semantic,
}

/// Input of one `optimize` call
#[derive(Debug, Clone, Copy)]
pub struct OptimizeRequest<'a> {
    /// Full text of the file
    pub context: &'a str,
    pub query: &'a str,
    /// Picks the grammar and labels errors
    pub file_path: &'a Path,
    /// Overrides the configured hard cap
    pub max_tokens: Option<usize>,
}

/// Full pipeline optimizer
pub struct HasteOptimizer {
    config: SelectorConfig,
    counter: Arc<dyn TokenCounter>,
    semantic: Option<SemanticScorer>,
}

/// Embedding-only optimizer
pub struct SemanticOptimizer {
    config: SelectorConfig,
    counter: Arc<dyn TokenCounter>,
    scorer: SemanticScorer,
}

/// Closed set of strategies behind one `optimize`
pub enum Optimizer {
    Haste(HasteOptimizer),
    Semantic(SemanticOptimizer),
}

impl Optimizer {
    /// Validate `config` and build the strategy it names.
    ///
    /// Fails with a configuration error before any work when the
    /// strategy or `semantic_enabled` needs an embedder and none is given.
    pub fn new(
        config: SelectorConfig,
        counter: Arc<dyn TokenCounter>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self> {
        config.validate(embedder.is_some())?;
        let weights = ScoreWeights {
            lexical: config.lexical_weight,
            semantic: config.semantic_weight,
        };

        let strategy = config.strategy;
        match strategy {
            Strategy::Haste => {
                let semantic = if config.semantic_enabled {
                    embedder.map(|e| SemanticScorer::new(e, weights))
                } else {
                    None
                };
                Ok(Optimizer::Haste(HasteOptimizer {
                    config,
                    counter,
                    semantic,
                }))
            }
            Strategy::Semantic => {
                let embedder = embedder.ok_or_else(|| {
                    HasteError::config("the semantic strategy requires an embedder")
                })?;
                Ok(Optimizer::Semantic(SemanticOptimizer {
                    config,
                    counter,
                    scorer: SemanticScorer::new(embedder, weights),
                }))
            }
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        match self {
            Optimizer::Haste(o) => &o.config,
            Optimizer::Semantic(o) => &o.config,
        }
    }

    pub fn retrieval_mode(&self) -> RetrievalMode {
        match self {
            Optimizer::Haste(o) if o.semantic.is_some() => RetrievalMode::Hybrid,
            Optimizer::Haste(_) => RetrievalMode::Bm25,
            Optimizer::Semantic(_) => RetrievalMode::Semantic,
        }
    }

    /// Select the symbols of `req.context` relevant to `req.query`
    #[instrument(level = "info", skip_all, fields(file = %req.file_path.display(), mode = %self.retrieval_mode()))]
    pub fn optimize(&self, req: OptimizeRequest<'_>) -> Result<OptimizedContext> {
        let config = self.config();
        if req.query.trim().is_empty() {
            return Err(HasteError::config("query must not be empty"));
        }
        let caps = Caps {
            hard: config.effective_hard_cap(req.max_tokens)?,
            soft: config.soft_cap,
        };
        let mode = self.retrieval_mode();
        let model = config.target_model.as_str();

        if req.context.is_empty() {
            debug!("empty input");
            return Ok(OptimizedContext {
                content: String::new(),
                metrics: Metrics::empty(mode, model),
            });
        }

        let mut clock = StageClock::start();

        let language = Language::from_path(req.file_path);
        let graph = get_builder(language)?.build(req.context, req.file_path)?;
        clock.lap(Stage::Parse);
        debug!(
            language = language.label(),
            symbols = graph.len(),
            edges = graph.edge_count(),
            "graph built"
        );

        let (selection, scores) = match self {
            Optimizer::Haste(o) => o.select(&graph, req.query, &mut clock)?,
            Optimizer::Semantic(o) => o.select(&graph, req.query, &mut clock)?,
        };

        let counter = match self {
            Optimizer::Haste(o) => o.counter.as_ref(),
            Optimizer::Semantic(o) => o.counter.as_ref(),
        };
        let assembly =
            Assembler::new(&graph, req.context, counter, model).assemble(&selection, &scores, caps)?;
        clock.lap(Stage::Assemble);

        let original_tokens = counter.count_tokens(req.context, model).map_err(|e| {
            HasteError::optimizer(Stage::Assemble, format!("token counting failed: {e:#}"))
        })?;
        let (stage_timings, latency_ms) = clock.finish();

        let metrics = Metrics {
            original_tokens,
            compressed_tokens: assembly.tokens,
            compression_ratio: compression_ratio(original_tokens, assembly.tokens),
            chunks_retrieved: assembly.rendered.len(),
            latency_ms,
            retrieval_mode: mode,
            target_model: model.to_string(),
            selected: assembly
                .rendered
                .iter()
                .map(|id| graph.symbol(*id).id.clone())
                .collect(),
            stage_timings,
        };

        info!(
            original = metrics.original_tokens,
            compressed = metrics.compressed_tokens,
            chunks = metrics.chunks_retrieved,
            "selection assembled"
        );

        Ok(OptimizedContext {
            content: assembly.content,
            metrics,
        })
    }
}

/// Combined score per pool member
fn score_map(pool: &[ScoredCandidate]) -> HashMap<SymbolId, f64> {
    pool.iter().map(|c| (c.id, c.combined)).collect()
}

impl HasteOptimizer {
    fn select(
        &self,
        graph: &SymbolGraph,
        query: &str,
        clock: &mut StageClock,
    ) -> Result<(SelectionSet, HashMap<SymbolId, f64>)> {
        let mut pool = LexicalScorer::new(self.config.prefilter).rank(graph, query);
        if let Some(scorer) = &self.semantic {
            pool = scorer.rerank(graph, pool, query)?;
        }
        clock.lap(Stage::Score);

        let seeds: Vec<SymbolId> = pool.iter().take(self.config.top_k).map(|c| c.id).collect();
        let selection = expand(graph, &seeds, self.config.bfs_depth, self.config.max_add);
        clock.lap(Stage::Expand);

        Ok((selection, score_map(&pool)))
    }
}

impl SemanticOptimizer {
    fn select(
        &self,
        graph: &SymbolGraph,
        query: &str,
        clock: &mut StageClock,
    ) -> Result<(SelectionSet, HashMap<SymbolId, f64>)> {
        let ranked = self.scorer.score_all(graph, query)?;
        clock.lap(Stage::Score);

        let seeds: Vec<SymbolId> = ranked.iter().take(self.config.top_k).map(|c| c.id).collect();
        Ok((SelectionSet::from_seeds(&seeds), score_map(&ranked)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::semantic::HashingEmbedder;

    struct Words;

    impl TokenCounter for Words {
        fn count_tokens(&self, text: &str, _model: &str) -> anyhow::Result<usize> {
            Ok(text.split_whitespace().count())
        }
    }

    const SRC: &str = "\
def parse(text):
    return text.split()

def load(path):
    data = open(path).read()
    return parse(data)

def render(items):
    return ', '.join(items)
";

    fn request<'a>(query: &'a str) -> OptimizeRequest<'a> {
        OptimizeRequest {
            context: SRC,
            query,
            file_path: Path::new("mod.py"),
            max_tokens: None,
        }
    }

    fn optimizer(config: SelectorConfig, embedder: Option<Arc<dyn Embedder>>) -> Result<Optimizer> {
        Optimizer::new(config, Arc::new(Words), embedder)
    }

    #[test]
    fn seed_pulls_in_its_callee() -> Result<()> {
        let config = SelectorConfig {
            top_k: 1,
            max_add: 5,
            ..SelectorConfig::default()
        };
        let out = optimizer(config, None)?.optimize(request("load"))?;
        assert_eq!(out.metrics.selected, ["parse", "load"]);
        assert_eq!(out.metrics.retrieval_mode, RetrievalMode::Bm25);
        assert!(!out.content.contains("render"));
        assert_eq!(out.metrics.chunks_retrieved, 2);
        Ok(())
    }

    #[test]
    fn empty_query_is_rejected() -> Result<()> {
        let err = optimizer(SelectorConfig::default(), None)?
            .optimize(request("   "))
            .unwrap_err();
        assert!(matches!(err, HasteError::Configuration(_)));
        Ok(())
    }

    #[test]
    fn empty_file_yields_empty_output() -> Result<()> {
        let out = optimizer(SelectorConfig::default(), None)?.optimize(OptimizeRequest {
            context: "",
            ..request("load")
        })?;
        assert!(out.content.is_empty());
        assert_eq!(out.metrics.original_tokens, 0);
        assert_eq!(out.metrics.chunks_retrieved, 0);
        Ok(())
    }

    #[test]
    fn semantic_without_embedder_fails_up_front() {
        let config = SelectorConfig {
            semantic_enabled: true,
            ..SelectorConfig::default()
        };
        assert!(matches!(optimizer(config, None), Err(HasteError::Configuration(_))));

        let config = SelectorConfig {
            strategy: Strategy::Semantic,
            ..SelectorConfig::default()
        };
        assert!(matches!(optimizer(config, None), Err(HasteError::Configuration(_))));
    }

    #[test]
    fn modes_follow_configuration() -> Result<()> {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(64));

        let plain = optimizer(SelectorConfig::default(), Some(embedder.clone()))?;
        assert_eq!(plain.retrieval_mode(), RetrievalMode::Bm25);

        let hybrid = optimizer(
            SelectorConfig {
                semantic_enabled: true,
                ..SelectorConfig::default()
            },
            Some(embedder.clone()),
        )?;
        assert_eq!(hybrid.retrieval_mode(), RetrievalMode::Hybrid);

        let semantic = optimizer(
            SelectorConfig {
                strategy: Strategy::Semantic,
                top_k: 1,
                ..SelectorConfig::default()
            },
            Some(embedder),
        )?;
        let out = semantic.optimize(request("render items join"))?;
        assert_eq!(out.metrics.retrieval_mode, RetrievalMode::Semantic);
        assert_eq!(out.metrics.selected, ["render"]);
        assert_eq!(out.metrics.stage_timings.expand_ms, 0.0);
        Ok(())
    }

    #[test]
    fn max_tokens_overrides_hard_cap() -> Result<()> {
        let opt = optimizer(SelectorConfig::default(), None)?;
        let err = opt
            .optimize(OptimizeRequest {
                max_tokens: Some(2),
                ..request("load")
            })
            .unwrap_err();
        assert!(matches!(
            err,
            HasteError::Optimizer {
                stage: Stage::Assemble,
                ..
            }
        ));
        Ok(())
    }
}
