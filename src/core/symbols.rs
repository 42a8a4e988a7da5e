//! Filepath: src/core/symbols.rs
//! Language detection and the graph-builder registry.
//! Each supported grammar implements `GraphBuilder`; the
//! optimizer only ever sees this trait and the resulting
//! `SymbolGraph`.
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::{Parser, Tree};

use crate::{
    core::error::{HasteError, Result, Stage},
    core::graph::SymbolGraph,
    infra::utils::{TsNodeUtils, Utf8Utils},
    parsers::{PythonGraphBuilder, RustGraphBuilder},
};

/// Languages with a graph builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language
{
    Python,
    Rust,
}

impl Language
{
    /// Map a file extension to a language; unknown or missing
    /// extensions are treated as Python
    pub fn from_path(path: &Path) -> Self
    {
        // Lowercase extension, if any
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref()
        {
            Some("rs") => Language::Rust,
            _ => Language::Python,
        }
    }

    /// Canonical lowercase label
    pub fn label(self) -> &'static str
    {
        match self
        {
            Language::Python => "python",
            Language::Rust => "rust",
        }
    }
}

/// Parses one file into a symbol graph.
///
/// Implementations hold no per-call state, so a single builder can
/// serve concurrent `build` calls over different files.
pub trait GraphBuilder: Send + Sync
{
    fn language(&self) -> Language;

    /// Parse `source` and resolve its in-file references.
    /// `path` only labels diagnostics.
    fn build(
        &self,
        source: &str,
        path: &Path,
    ) -> Result<SymbolGraph>;
}

// Simple builder registry
pub fn get_builder(lang: Language) -> Result<Box<dyn GraphBuilder>>
{
    match lang
    {
        Language::Python => Ok(Box::new(PythonGraphBuilder::new()?)),
        Language::Rust => Ok(Box::new(RustGraphBuilder::new()?)),
    }
}

/// Parse with `language` and reject trees that contain
/// ERROR or MISSING nodes
pub fn parse_checked(
    language: &tree_sitter::Language,
    source: &str,
    path: &Path,
) -> Result<Tree>
{
    let label = path
        .display()
        .to_string();

    // Fresh parser per call; parsers are cheap and not shared
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| HasteError::optimizer(Stage::Parse, format!("load grammar: {e}")))?;

    // Parse the source; no tree means the parser gave up
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| HasteError::parse(&label, source, 0, 0, "parser produced no tree"))?;

    // Report the first syntax problem with its location
    if let Some(node) = TsNodeUtils::first_error(tree.root_node())
    {
        let message = if node.is_missing()
        {
            format!("missing `{}`", node.kind())
        }
        else
        {
            let text = Utf8Utils::node_text(source, node);
            let snippet: String = text
                .chars()
                .take(24)
                .collect();
            format!("unexpected `{}`", snippet.trim())
        };

        debug!(path = %label, %message, "rejecting source with syntax errors");
        return Err(HasteError::parse(
            &label,
            source,
            node.start_byte(),
            node.end_byte() - node.start_byte(),
            message,
        ));
    }

    Ok(tree)
}
