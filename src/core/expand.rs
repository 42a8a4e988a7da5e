//! Bounded breadth-first growth of the seed set along call edges.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::graph::{SymbolGraph, SymbolId};

/// How a symbol entered the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "origin")]
pub enum Origin {
    Seed,
    Expansion { hop: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selected {
    pub id: SymbolId,
    #[serde(flatten)]
    pub origin: Origin,
}

impl Selected {
    pub fn is_seed(&self) -> bool {
        self.origin == Origin::Seed
    }
}

/// Symbols chosen for output, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionSet {
    entries: Vec<Selected>,
}

impl SelectionSet {
    /// Seeds only, duplicates dropped, order kept
    pub fn from_seeds(seeds: &[SymbolId]) -> Self {
        let mut seen = HashSet::new();
        let entries = seeds
            .iter()
            .filter(|id| seen.insert(**id))
            .map(|&id| Selected {
                id,
                origin: Origin::Seed,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Selected] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn seeds(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.entries.iter().filter(|e| e.is_seed()).map(|e| e.id)
    }

    /// Number of symbols added by expansion
    pub fn added(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_seed()).count()
    }

    /// Ids in source order, the order they are rendered in
    pub fn in_source_order(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.entries.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    fn push_expansion(&mut self, id: SymbolId, hop: usize) {
        self.entries.push(Selected {
            id,
            origin: Origin::Expansion { hop },
        });
    }
}

/// Grow `seeds` by BFS over callers and callees.
///
/// At most `bfs_depth` hops and `max_add` additions. Each hop's
/// frontier is visited in source order, so additions at the same
/// distance are taken earliest-in-file first. Seeds are never
/// re-added.
///
/// A hop collects its whole neighbour layer before `max_add` cuts it,
/// so the cost is O(frontier × degree) per hop rather than
/// O(seeds × max_add). Sorting the full layer is what makes the
/// truncation pick the earliest symbols in the file.
#[instrument(level = "debug", skip(graph, seeds), fields(seeds = seeds.len()))]
pub fn expand(
    graph: &SymbolGraph,
    seeds: &[SymbolId],
    bfs_depth: usize,
    max_add: usize,
) -> SelectionSet {
    let mut selection = SelectionSet::from_seeds(seeds);
    let mut visited: HashSet<SymbolId> = selection.seeds().collect();
    let mut frontier: Vec<SymbolId> = selection.seeds().collect();
    let mut added = 0usize;

    'hops: for hop in 1..=bfs_depth {
        if added >= max_add || frontier.is_empty() {
            break;
        }

        // Next layer, ordered by source position
        let mut layer: BTreeSet<SymbolId> = BTreeSet::new();
        for &id in &frontier {
            for n in graph.neighbors(id) {
                if !visited.contains(&n) {
                    layer.insert(n);
                }
            }
        }

        let mut next = Vec::with_capacity(layer.len());
        for id in layer {
            if added >= max_add {
                break 'hops;
            }
            visited.insert(id);
            selection.push_expansion(id, hop);
            next.push(id);
            added += 1;
        }
        frontier = next;
    }

    debug!(added, total = selection.len(), "expansion done");
    selection
}
