//! Shared test utilities for integration tests
//!
//! Provides fixture loading, a deterministic token counter and
//! optimizer construction used across multiple test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use haste::core::budgeter::TokenCounter;
use haste::core::optimizer::{OptimizeRequest, Optimizer};
use haste::core::semantic::{EmbedError, Embedder};
use haste::infra::config::SelectorConfig;

/// One token per whitespace-separated word, for exact arithmetic
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter
{
    fn count_tokens(
        &self,
        text: &str,
        _model: &str,
    ) -> anyhow::Result<usize>
    {
        Ok(text
            .split_whitespace()
            .count())
    }
}

/// Embeds text as keyword presence flags over a fixed vocabulary
pub struct KeywordEmbedder
{
    pub vocabulary: Vec<&'static str>,
}

impl Embedder for KeywordEmbedder
{
    fn model(&self) -> &str
    {
        "keywords"
    }

    fn embed(
        &self,
        text: &str,
    ) -> Result<Vec<f32>, EmbedError>
    {
        let lower = text.to_lowercase();
        Ok(self
            .vocabulary
            .iter()
            .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Always fails, like an unreachable model server
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder
{
    fn model(&self) -> &str
    {
        "offline"
    }

    fn embed(
        &self,
        _text: &str,
    ) -> Result<Vec<f32>, EmbedError>
    {
        Err(EmbedError::Backend("connection refused".into()))
    }
}

/// Absolute path of a file under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf
{
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Contents of a fixture file
pub fn fixture(name: &str) -> String
{
    std::fs::read_to_string(fixture_path(name)).expect("read fixture")
}

/// Optimizer over the whitespace counter
pub fn optimizer(
    config: SelectorConfig,
    embedder: Option<Arc<dyn Embedder>>,
) -> haste::core::error::Result<Optimizer>
{
    Optimizer::new(config, Arc::new(WhitespaceCounter), embedder)
}

/// Request against an in-memory source labelled with `path`
pub fn request<'a>(
    context: &'a str,
    query: &'a str,
    path: &'a Path,
) -> OptimizeRequest<'a>
{
    OptimizeRequest { context, query, file_path: path, max_tokens: None }
}
