//! Typed failures surfaced by the selector.
//!
//! Every failure names the stage it came from and, where one is involved,
//! the symbol id. Parse failures also carry a labelled source span so the
//! CLI can render them with miette.

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;

/// Result alias used across the selection engine
pub type Result<T> = std::result::Result<T, HasteError>;

/// Pipeline stage an error or timing belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Score,
    Expand,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => write!(f, "parse"),
            Stage::Score => write!(f, "score"),
            Stage::Expand => write!(f, "expand"),
            Stage::Assemble => write!(f, "assemble"),
        }
    }
}

/// Error taxonomy of the selector
#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum HasteError {
    /// Source is not valid in the grammar of its language
    #[error("failed to parse {path} at {line}:{column}: {message}")]
    #[diagnostic(code(haste::parse))]
    Parse {
        path: String,
        line: usize,
        column: usize,
        message: String,

        #[source_code]
        src: NamedSource<String>,

        #[label("syntax error here")]
        span: SourceSpan,
    },

    /// Dependency failure or an unsatisfiable budget
    #[error("{stage} stage failed{}: {message}", symbol_suffix(.symbol))]
    #[diagnostic(code(haste::optimizer))]
    Optimizer {
        stage: Stage,
        symbol: Option<String>,
        message: String,
    },

    /// Invalid parameter combination, raised before any work starts
    #[error("invalid configuration: {0}")]
    #[diagnostic(
        code(haste::config),
        help("check haste.toml, HASTE_* environment variables and command-line flags")
    )]
    Configuration(String),
}

fn symbol_suffix(symbol: &Option<String>) -> String {
    match symbol {
        Some(id) => format!(" for symbol `{id}`"),
        None => String::new(),
    }
}

impl HasteError {
    /// Build a parse error pointing at `offset..offset + len` in `source`
    pub fn parse(
        path: &str,
        source: &str,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        let offset = offset.min(source.len());
        let prefix = &source[..floor_char_boundary(source, offset)];
        let line = prefix.matches('\n').count() + 1;
        let column = prefix.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;

        HasteError::Parse {
            path: path.to_string(),
            line,
            column,
            message: message.into(),
            src: NamedSource::new(path, source.to_string()),
            span: (offset, len).into(),
        }
    }

    /// Optimizer failure without a specific symbol
    pub fn optimizer(stage: Stage, message: impl Into<String>) -> Self {
        HasteError::Optimizer {
            stage,
            symbol: None,
            message: message.into(),
        }
    }

    /// Optimizer failure attributed to one symbol
    pub fn optimizer_at(stage: Stage, symbol: &str, message: impl Into<String>) -> Self {
        HasteError::Optimizer {
            stage,
            symbol: Some(symbol.to_string()),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        HasteError::Configuration(message.into())
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self {
            HasteError::Configuration(_) => 2,
            HasteError::Parse { .. } => 3,
            HasteError::Optimizer { .. } => 4,
        }
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_one_based_position() {
        let src = "def ok():\n    pass\ndef broken(:\n";
        let offset = src.find("(:").unwrap() + 1;
        let err = HasteError::parse("t.py", src, offset, 1, "unexpected token");

        match &err {
            HasteError::Parse { line, column, .. } => {
                assert_eq!(*line, 3);
                assert_eq!(*column, 12);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(err.to_string().contains("t.py at 3:12"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn optimizer_error_names_stage_and_symbol() {
        let err = HasteError::optimizer_at(Stage::Assemble, "Loader.run", "does not fit");
        assert_eq!(
            err.to_string(),
            "assemble stage failed for symbol `Loader.run`: does not fit"
        );

        let err = HasteError::optimizer(Stage::Score, "embedder unavailable");
        assert_eq!(err.to_string(), "score stage failed: embedder unavailable");
    }
}
