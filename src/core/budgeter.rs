//! Filepath: src/core/budgeter.rs
//! Token counting for output budgets.

use std::sync::Arc;

use anyhow::{Context, Result};
use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

/// Encoding used when a model name is not recognized
pub const FALLBACK_ENCODING: &str = "cl100k_base";

/// Counts tokens of text for a named target model.
///
/// Implementations must be deterministic for a given (text, model)
/// and return 0 for empty text.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize>;
}

/// Token counter backed by tiktoken-rs with encoder and count caches
pub struct TiktokenCounter {
    /// Loaded encoders keyed by lowercase model name
    encoders: Cache<String, Arc<CoreBPE>>,

    /// Token count cache for fast repeated queries
    counts: Cache<u64, usize>,
}

impl Default for TiktokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TiktokenCounter {
    pub fn new() -> Self {
        Self {
            encoders: Cache::new(16),
            counts: Cache::new(100_000),
        }
    }

    /// Resolve the encoder for a model or encoding name.
    ///
    /// Model names such as "gpt-4o" map through tiktoken's model table;
    /// raw encoding names ("cl100k_base", "o200k_base") are accepted too.
    /// Anything else falls back to cl100k_base.
    pub fn encoder(&self, model: &str) -> Result<Arc<CoreBPE>> {
        let lower = model.to_ascii_lowercase();
        if let Some(bpe) = self.encoders.get(&lower) {
            return Ok(bpe);
        }

        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => {
                    debug!(model, fallback = FALLBACK_ENCODING, "unknown model, using fallback encoding");
                    cl100k_base().context("load cl100k_base")?
                }
            },
        };

        let bpe = Arc::new(bpe);
        self.encoders.insert(lower, bpe.clone());
        Ok(bpe)
    }

    /// Cache key over model and text, separated so ("ab","c") != ("a","bc")
    fn key(model: &str, text: &str) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.update(model.to_ascii_lowercase().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.digest()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }

        let key = Self::key(model, text);
        if let Some(t) = self.counts.get(&key) {
            return Ok(t);
        }

        let t = self.encoder(model)?.encode_ordinary(text).len();
        self.counts.insert(key, t);
        Ok(t)
    }
}
