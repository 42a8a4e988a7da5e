//! Embedding-based reranking of the lexical candidate pool.
//!
//! The embedding backend is an injected capability. When no embedder is
//! configured, semantic scoring is off and the pipeline never calls
//! into this module.

use std::sync::Arc;

use tracing::{debug, instrument};
use xxhash_rust::xxh64::xxh64;

use crate::core::error::{HasteError, Result, Stage};
use crate::core::graph::SymbolGraph;
use crate::core::lexical::{ScoredCandidate, sort_candidates, tokenize};

/// Failure reported by an embedding backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding model `{0}` is unavailable")]
    Unavailable(String),

    #[error("embedding backend error: {0}")]
    Backend(String),
}

/// Turns text into a dense vector.
///
/// Implementations must be safe to share across threads; the
/// optimizer holds one behind an `Arc` for many calls.
pub trait Embedder: Send + Sync {
    /// Label of the model, reported in errors and logs
    fn model(&self) -> &str;

    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError>;
}

/// Offline embedder using signed feature hashing over lexical terms.
///
/// Deterministic and dependency-free at runtime; useful when no model
/// server is reachable and as a stand-in during tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    label: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            label: format!("hashing-{dim}"),
        }
    }
}

impl Embedder for HashingEmbedder {
    fn model(&self) -> &str {
        &self.label
    }

    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
        if self.dim == 0 {
            return Err(EmbedError::Unavailable(self.label.clone()));
        }

        let mut v = vec![0.0f32; self.dim];
        for term in tokenize(text) {
            let h = xxh64(term.as_bytes(), 0);
            let bucket = (h % self.dim as u64) as usize;
            // Top bit picks the sign so collisions tend to cancel
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

/// Cosine similarity; zero vectors are orthogonal to everything.
/// None when lengths differ or a value is not finite.
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    if a.iter().chain(b).any(|x| !x.is_finite()) {
        return None;
    }

    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Some(0.0);
    }
    Some((dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0))
}

/// Relative weights of the two signals in the combined score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            lexical: 0.5,
            semantic: 0.5,
        }
    }
}

/// Reranks candidates by blending lexical and embedding similarity
#[derive(Clone)]
pub struct SemanticScorer {
    embedder: Arc<dyn Embedder>,
    weights: ScoreWeights,
}

impl SemanticScorer {
    pub fn new(embedder: Arc<dyn Embedder>, weights: ScoreWeights) -> Self {
        Self { embedder, weights }
    }

    /// Fill `semantic` and recompute `combined` for every candidate,
    /// then re-sort deterministically.
    #[instrument(level = "debug", skip_all, fields(model = self.embedder.model(), pool = candidates.len()))]
    pub fn rerank(
        &self,
        graph: &SymbolGraph,
        mut candidates: Vec<ScoredCandidate>,
        query: &str,
    ) -> Result<Vec<ScoredCandidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let sims = self.similarities(graph, &candidates, query)?;

        let max_lex = candidates
            .iter()
            .map(|c| c.lexical)
            .fold(0.0f64, f64::max);

        for (c, sim) in candidates.iter_mut().zip(sims) {
            let lex_norm = if max_lex > 0.0 { c.lexical / max_lex } else { 0.0 };
            let sem_norm = (sim + 1.0) / 2.0;
            c.semantic = Some(sim);
            c.combined = self.weights.lexical * lex_norm + self.weights.semantic * sem_norm;
        }

        sort_candidates(&mut candidates);
        debug!("semantic rerank done");
        Ok(candidates)
    }

    /// Score every symbol by cosine similarity alone
    pub fn score_all(&self, graph: &SymbolGraph, query: &str) -> Result<Vec<ScoredCandidate>> {
        let mut candidates: Vec<ScoredCandidate> = graph
            .ids()
            .map(|id| ScoredCandidate::lexical_only(id, 0.0))
            .collect();
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let sims = self.similarities(graph, &candidates, query)?;
        for (c, sim) in candidates.iter_mut().zip(sims) {
            c.semantic = Some(sim);
            c.combined = sim;
        }

        sort_candidates(&mut candidates);
        Ok(candidates)
    }

    fn similarities(
        &self,
        graph: &SymbolGraph,
        candidates: &[ScoredCandidate],
        query: &str,
    ) -> Result<Vec<f64>> {
        let model = self.embedder.model();
        let query_vec = self
            .embedder
            .embed(query)
            .map_err(|e| HasteError::optimizer(Stage::Score, format!("embed query: {e}")))?;

        candidates
            .iter()
            .map(|c| {
                let sym = graph.symbol(c.id);
                let v = self
                    .embedder
                    .embed(&sym.text)
                    .map_err(|e| HasteError::optimizer_at(Stage::Score, &sym.id, e.to_string()))?;
                cosine(&query_vec, &v).ok_or_else(|| {
                    HasteError::optimizer_at(
                        Stage::Score,
                        &sym.id,
                        format!(
                            "embedding from `{model}` is unusable (dims {} vs {})",
                            query_vec.len(),
                            v.len()
                        ),
                    )
                })
            })
            .collect()
    }
}
