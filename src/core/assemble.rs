//! Filepath: src/core/assemble.rs
//! Renders a selection back into source text under a token budget.
//!
//! Selected symbols are sliced from the original file and joined in
//! source order. When the rendered text is over the hard cap, whole
//! symbols are dropped one at a time (expansion symbols before seeds,
//! lowest score first) until it fits.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::core::budgeter::TokenCounter;
use crate::core::error::{HasteError, Result, Stage};
use crate::core::expand::SelectionSet;
use crate::core::graph::{Symbol, SymbolGraph, SymbolId};

/// Separator between rendered symbols
pub const SEPARATOR: &str = "\n\n";

/// Token limits for one assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    /// Output must not exceed this
    pub hard: usize,
    /// Advisory; exceeding it is only logged
    pub soft: usize,
}

/// Final rendered output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub content: String,
    pub tokens: usize,
    /// Symbols whose text appears in `content`, in source order
    pub rendered: Vec<SymbolId>,
}

pub struct Assembler<'a> {
    graph: &'a SymbolGraph,
    source: &'a str,
    counter: &'a dyn TokenCounter,
    model: &'a str,
}

impl<'a> Assembler<'a> {
    pub fn new(
        graph: &'a SymbolGraph,
        source: &'a str,
        counter: &'a dyn TokenCounter,
        model: &'a str,
    ) -> Self {
        Self {
            graph,
            source,
            counter,
            model,
        }
    }

    /// Render `selection`, evicting symbols until the hard cap holds.
    ///
    /// `scores` carries the combined score of every pool candidate;
    /// symbols missing from it rank below any scored symbol.
    #[instrument(level = "debug", skip_all, fields(selected = selection.len(), hard = caps.hard, soft = caps.soft))]
    pub fn assemble(
        &self,
        selection: &SelectionSet,
        scores: &HashMap<SymbolId, f64>,
        caps: Caps,
    ) -> Result<Assembly> {
        if selection.is_empty() {
            return Ok(Assembly::default());
        }

        let mut kept: Vec<SymbolId> = selection.in_source_order();
        let mut evictions = eviction_order(selection, scores).into_iter();

        loop {
            let (content, rendered) = self.render(&kept)?;
            let tokens = self
                .counter
                .count_tokens(&content, self.model)
                .map_err(|e| HasteError::optimizer(Stage::Assemble, format!("token counting failed: {e:#}")))?;

            if tokens <= caps.hard {
                if tokens > caps.soft {
                    debug!(tokens, soft_cap = caps.soft, "output above soft cap");
                }
                return Ok(Assembly {
                    content,
                    tokens,
                    rendered,
                });
            }

            match evictions.next() {
                Some(victim) => {
                    debug!(symbol = %self.graph.symbol(victim).id, tokens, "evicting");
                    kept.retain(|id| *id != victim);
                }
                None => {
                    // Only the top seed is left and it is still too large
                    let label = selection
                        .seeds()
                        .next()
                        .map(|id| self.graph.symbol(id).id.clone())
                        .unwrap_or_default();
                    return Err(HasteError::optimizer_at(
                        Stage::Assemble,
                        &label,
                        format!("{tokens} tokens exceed hard cap {}", caps.hard),
                    ));
                }
            }
        }
    }

    /// Join the text of `ids` (source order). A symbol lying inside an
    /// already rendered range is skipped.
    fn render(&self, ids: &[SymbolId]) -> Result<(String, Vec<SymbolId>)> {
        let mut parts: Vec<&str> = Vec::with_capacity(ids.len());
        let mut rendered = Vec::with_capacity(ids.len());
        let mut cover: Option<&Symbol> = None;

        for &id in ids {
            let sym = self.graph.symbol(id);
            if cover.is_some_and(|outer| outer.contains(sym)) {
                continue;
            }

            let slice = self.source.get(sym.byte_start..sym.byte_end).ok_or_else(|| {
                HasteError::optimizer_at(
                    Stage::Assemble,
                    &sym.id,
                    format!("byte range {}..{} is outside the source", sym.byte_start, sym.byte_end),
                )
            })?;
            parts.push(slice);
            rendered.push(id);
            cover = Some(sym);
        }

        Ok((parts.join(SEPARATOR), rendered))
    }
}

/// Everything but the top seed, in the order it should be dropped
fn eviction_order(selection: &SelectionSet, scores: &HashMap<SymbolId, f64>) -> Vec<SymbolId> {
    let top_seed = selection.seeds().next();

    let by_score = |a: &SymbolId, b: &SymbolId| -> Ordering {
        let sa = scores.get(a);
        let sb = scores.get(b);
        // Unscored first, then lowest score, then later in the file first
        match (sa, sb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.total_cmp(y),
        }
        .then(b.cmp(a))
    };

    let mut expansion: Vec<SymbolId> = selection
        .entries()
        .iter()
        .filter(|e| !e.is_seed())
        .map(|e| e.id)
        .collect();
    expansion.sort_by(by_score);

    let mut seeds: Vec<SymbolId> = selection.seeds().filter(|id| Some(*id) != top_seed).collect();
    seeds.sort_by(by_score);

    expansion.extend(seeds);
    expansion
}
