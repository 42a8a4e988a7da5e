//! Symbol graph for one parsed file.
//!
//! Nodes are symbols inserted in ascending byte order, so a `SymbolId`
//! doubles as the source-order rank used for every deterministic
//! tie-break downstream. Edges point from caller to callee and never
//! leave the file.

use std::collections::HashMap;

use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Position of a symbol in source order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub usize);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0
    }

    fn node(self) -> NodeIndex {
        NodeIndex::new(self.0)
    }
}

/// Normalized symbol kinds across languages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Free-standing function
    Function,

    /// Function owned by a class, impl or trait
    Method,

    /// Python class
    Class,

    /// Rust struct
    Struct,

    /// Rust enum
    Enum,

    /// Rust trait
    Trait,

    /// Rust impl block
    Impl,

    /// Type alias
    TypeAlias,

    /// Rust inline module
    Module,

    /// Const or static item
    Constant,

    /// Run of top-level statements that are not definitions
    Statement,
}

/// A name mentioned inside a symbol body, resolved after extraction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    /// Bare name, resolved against top-level definitions
    Name(String),

    /// Member reached through `self`/`cls`/`Self`, resolved against the owner
    Member { owner: String, name: String },
}

/// A named code unit extracted from the file
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Unique qualified identifier
    pub id: String,

    /// Simple declared name
    pub name: String,

    /// Normalized kind
    pub kind: SymbolKind,

    /// Owning class/impl/trait for methods
    pub owner: Option<String>,

    /// Start byte in the file
    pub byte_start: usize,

    /// End byte in the file (exclusive)
    pub byte_end: usize,

    /// 1-based start line
    pub start_line: usize,

    /// 1-based end line
    pub end_line: usize,

    /// Raw source text of the symbol
    pub text: String,

    /// Names referenced from this symbol's own body
    pub references: Vec<Reference>,
}

impl Symbol {
    /// Whether bare-name references may resolve to this symbol
    fn is_top_level_definition(&self) -> bool {
        self.owner.is_none() && self.kind != SymbolKind::Statement
    }

    /// Whether `other` lies entirely inside this symbol's byte range
    pub fn contains(&self, other: &Symbol) -> bool {
        self.byte_start <= other.byte_start
            && other.byte_end <= self.byte_end
            && (self.byte_start, self.byte_end) != (other.byte_start, other.byte_end)
    }
}

/// Call/reference graph of one file
#[derive(Debug, Clone)]
pub struct SymbolGraph {
    /// Node weights are symbols, node index == source order
    graph: DiGraph<Symbol, ()>,

    /// Identifier lookup, kept in source order
    by_id: IndexMap<String, SymbolId>,
}

impl SymbolGraph {
    /// Assemble a graph from extracted symbols.
    ///
    /// Symbols are sorted into source order, duplicate ids are suffixed
    /// (`name#2`, `name#3`, ...) and references are resolved to edges.
    /// Unresolvable references are dropped.
    pub fn from_symbols(mut symbols: Vec<Symbol>) -> Self {
        // Outer symbols first when two ranges start together
        symbols.sort_by(|a, b| {
            a.byte_start
                .cmp(&b.byte_start)
                .then(b.byte_end.cmp(&a.byte_end))
        });
        disambiguate_ids(&mut symbols);

        let edges = resolve_edges(&symbols);

        let mut graph = DiGraph::with_capacity(symbols.len(), edges.len());
        let mut by_id = IndexMap::with_capacity(symbols.len());
        for sym in symbols {
            let id = sym.id.clone();
            let idx = graph.add_node(sym);
            by_id.insert(id, SymbolId(idx.index()));
        }
        for (from, to) in edges {
            graph.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
        }

        Self { graph, by_id }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Symbol by position; ids handed out by this graph are always valid
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.graph[id.node()]
    }

    /// Look up a symbol by its qualified identifier
    pub fn find(&self, ident: &str) -> Option<SymbolId> {
        self.by_id.get(ident).copied()
    }

    /// All symbols in source order
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.graph
            .node_indices()
            .map(move |ix| (SymbolId(ix.index()), &self.graph[ix]))
    }

    pub fn ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.graph.node_indices().map(|ix| SymbolId(ix.index()))
    }

    /// Caller -> callee pairs
    pub fn edges(&self) -> impl Iterator<Item = (SymbolId, SymbolId)> + '_ {
        self.graph.raw_edges().iter().map(|e| {
            (
                SymbolId(e.source().index()),
                SymbolId(e.target().index()),
            )
        })
    }

    pub fn callees(&self, id: SymbolId) -> Vec<SymbolId> {
        self.sorted_neighbors(id, Direction::Outgoing)
    }

    pub fn callers(&self, id: SymbolId) -> Vec<SymbolId> {
        self.sorted_neighbors(id, Direction::Incoming)
    }

    /// Callers and callees together, in source order, without duplicates
    pub fn neighbors(&self, id: SymbolId) -> Vec<SymbolId> {
        self.graph
            .neighbors_undirected(id.node())
            .map(|ix| SymbolId(ix.index()))
            .sorted_unstable()
            .dedup()
            .collect()
    }

    fn sorted_neighbors(&self, id: SymbolId, dir: Direction) -> Vec<SymbolId> {
        self.graph
            .neighbors_directed(id.node(), dir)
            .map(|ix| SymbolId(ix.index()))
            .sorted_unstable()
            .collect()
    }
}

/// Suffix repeated ids in source order, keeping the first plain
fn disambiguate_ids(symbols: &mut [Symbol]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for sym in symbols.iter_mut() {
        let n = seen.entry(sym.id.clone()).or_insert(0);
        *n += 1;
        if *n > 1 {
            sym.id = format!("{}#{}", sym.id, n);
        }
    }
}

/// Resolve references to (caller, callee) index pairs.
///
/// A later definition of a name shadows an earlier one, matching how
/// the module namespace ends up at runtime. Member references prefer
/// the method declared in the referencing symbol's own class or impl
/// body, so a redefined class keeps its `self.` calls local.
fn resolve_edges(symbols: &[Symbol]) -> Vec<(usize, usize)> {
    let scopes = enclosing_scopes(symbols);
    let mut top_level: HashMap<&str, usize> = HashMap::new();
    let mut members: HashMap<(&str, &str), Vec<usize>> = HashMap::new();

    for (i, sym) in symbols.iter().enumerate() {
        if sym.is_top_level_definition() {
            top_level.insert(sym.name.as_str(), i);
        }
        if let Some(owner) = sym.owner.as_deref()
            && sym.kind == SymbolKind::Method
        {
            members
                .entry((owner, sym.name.as_str()))
                .or_default()
                .push(i);
        }
    }

    let mut edges = Vec::new();
    for (i, sym) in symbols.iter().enumerate() {
        for r in &sym.references {
            let target = match r {
                Reference::Name(name) => top_level.get(name.as_str()).copied(),
                Reference::Member { owner, name } => members
                    .get(&(owner.as_str(), name.as_str()))
                    .and_then(|candidates| {
                        candidates
                            .iter()
                            .copied()
                            .find(|&j| scopes[i].is_some() && scopes[j] == scopes[i])
                            .or_else(|| candidates.last().copied())
                    }),
            };
            if let Some(j) = target
                && j != i
            {
                edges.push((i, j));
            }
        }
    }
    edges.into_iter().sorted_unstable().dedup().collect()
}

/// Innermost class, impl or trait body holding each symbol (itself
/// included). Relies on outer-first source order.
fn enclosing_scopes(symbols: &[Symbol]) -> Vec<Option<usize>> {
    let mut open: Vec<usize> = Vec::new();
    let mut scopes = Vec::with_capacity(symbols.len());

    for (i, sym) in symbols.iter().enumerate() {
        while let Some(&top) = open.last()
            && !symbols[top].contains(sym)
        {
            open.pop();
        }
        if matches!(sym.kind, SymbolKind::Class | SymbolKind::Impl | SymbolKind::Trait) {
            open.push(i);
        }
        scopes.push(open.last().copied());
    }
    scopes
}
