//! BM25 ranking of the symbols of one file against a query.
//!
//! The corpus is the current file's symbol set, rebuilt on every call.
//! Identifiers are counted several times so a name hit outranks a
//! passing mention in some other body.
//!
//! # BM25 Parameters
//!
//! - k1 = 1.2 (term frequency saturation)
//! - b = 0.75 (document length normalization)

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::graph::{SymbolGraph, SymbolId};

/// BM25 parameters
const K1: f64 = 1.2;
const B: f64 = 0.75;

/// How many times identifier terms are counted per occurrence
pub const NAME_WEIGHT: usize = 3;

/// A symbol with its relevance scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub id: SymbolId,
    pub lexical: f64,
    pub semantic: Option<f64>,
    pub combined: f64,
}

impl ScoredCandidate {
    pub fn lexical_only(id: SymbolId, lexical: f64) -> Self {
        Self {
            id,
            lexical,
            semantic: None,
            combined: lexical,
        }
    }
}

/// Deterministic ranking: combined score desc, then source order asc
pub fn sort_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.combined.total_cmp(&a.combined).then(a.id.cmp(&b.id)));
}

/// BM25 scorer bounded by a candidate pool size
#[derive(Debug, Clone, Copy)]
pub struct LexicalScorer {
    prefilter: usize,
}

impl LexicalScorer {
    pub fn new(prefilter: usize) -> Self {
        Self { prefilter }
    }

    /// Top `prefilter` candidates, best first
    pub fn rank(&self, graph: &SymbolGraph, query: &str) -> Vec<ScoredCandidate> {
        let mut ranked = self.score_all(graph, query);
        ranked.truncate(self.prefilter);
        ranked
    }

    /// Every symbol of the graph, scored and sorted. Symbols with no
    /// overlapping term score 0 and are kept.
    #[instrument(level = "debug", skip_all, fields(symbols = graph.len()))]
    pub fn score_all(&self, graph: &SymbolGraph, query: &str) -> Vec<ScoredCandidate> {
        let query_terms: Vec<String> = {
            let mut seen = HashSet::new();
            tokenize(query)
                .into_iter()
                .filter(|t| seen.insert(t.clone()))
                .collect()
        };

        // Per-document term frequencies and lengths
        let docs: Vec<(SymbolId, HashMap<String, usize>, usize)> = graph
            .symbols()
            .map(|(id, sym)| {
                let mut tf: HashMap<String, usize> = HashMap::new();
                let mut len = 0usize;
                for term in tokenize(&sym.name) {
                    *tf.entry(term).or_insert(0) += NAME_WEIGHT;
                    len += NAME_WEIGHT;
                }
                for term in tokenize(&sym.text) {
                    *tf.entry(term).or_insert(0) += 1;
                    len += 1;
                }
                (id, tf, len)
            })
            .collect();

        let total_docs = docs.len() as f64;
        let avg_len = if docs.is_empty() {
            0.0
        } else {
            docs.iter().map(|(_, _, l)| *l as f64).sum::<f64>() / total_docs
        };

        // Document frequency of each query term
        let idf: Vec<f64> = query_terms
            .iter()
            .map(|term| {
                let df = docs.iter().filter(|(_, tf, _)| tf.contains_key(term)).count() as f64;
                ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
            })
            .collect();

        let mut out: Vec<ScoredCandidate> = docs
            .iter()
            .map(|(id, tf, len)| {
                let score = bm25(&query_terms, &idf, tf, *len as f64, avg_len);
                ScoredCandidate::lexical_only(*id, score)
            })
            .collect();

        sort_candidates(&mut out);
        debug!(
            query_terms = query_terms.len(),
            matched = out.iter().filter(|c| c.lexical > 0.0).count(),
            "lexical scoring done"
        );
        out
    }
}

fn bm25(
    query_terms: &[String],
    idf: &[f64],
    tf: &HashMap<String, usize>,
    doc_len: f64,
    avg_len: f64,
) -> f64 {
    if avg_len <= 0.0 {
        return 0.0;
    }
    query_terms
        .iter()
        .zip(idf)
        .filter_map(|(term, idf)| {
            let f = *tf.get(term)? as f64;
            let numerator = f * (K1 + 1.0);
            let denominator = f + K1 * (1.0 - B + B * doc_len / avg_len);
            Some(idf * numerator / denominator)
        })
        .sum()
}

/// Split text into lowercase search terms.
///
/// Words split on non-alphanumerics, then on camelCase and
/// letter/digit boundaries; the whole word is kept alongside its
/// pieces. Repeats are preserved so callers can count frequencies.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }

        let pieces = split_word(word);
        let whole = word.to_lowercase();
        let multi = pieces.len() > 1;

        for piece in pieces {
            push_term(&mut terms, piece.to_lowercase());
        }
        if multi {
            push_term(&mut terms, whole);
        }
    }

    terms
}

fn push_term(terms: &mut Vec<String>, term: String) {
    if term.chars().count() >= 2 && !is_stop_word(&term) {
        terms.push(term);
    }
}

/// `parseHTTPResponse2` -> `parse`, `HTTP`, `Response`, `2`
fn split_word(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (pos, c) = chars[i];
        let prev = chars[i - 1].1;
        let next = chars.get(i + 1).map(|(_, n)| *n);

        let boundary = (prev.is_lowercase() && c.is_uppercase())
            || (prev.is_alphabetic() && c.is_numeric())
            || (prev.is_numeric() && c.is_alphabetic())
            // End of an acronym: `HTTPResponse` splits before `R`
            || (prev.is_uppercase() && c.is_uppercase() && next.is_some_and(char::is_lowercase));

        if boundary {
            pieces.push(&word[start..pos]);
            start = pos;
        }
    }
    pieces.push(&word[start..]);
    pieces
}

/// Keywords and function words that carry no retrieval signal
fn is_stop_word(term: &str) -> bool {
    matches!(
        term,
        "the"
            | "an"
            | "and"
            | "or"
            | "of"
            | "to"
            | "in"
            | "on"
            | "for"
            | "is"
            | "it"
            | "be"
            | "as"
            | "at"
            | "by"
            | "with"
            | "from"
            | "this"
            | "that"
            | "def"
            | "class"
            | "self"
            | "cls"
            | "return"
            | "pass"
            | "none"
            | "true"
            | "false"
            | "if"
            | "else"
            | "elif"
            | "import"
            | "fn"
            | "let"
            | "mut"
            | "pub"
            | "impl"
            | "use"
            | "mod"
    )
}
