//! Filepath: src/core/metrics.rs
//! Post-processing of a finished selection into reportable numbers.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::error::Stage;

/// Which scoring path produced the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Bm25,
    Hybrid,
    Semantic,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Bm25 => write!(f, "bm25"),
            RetrievalMode::Hybrid => write!(f, "hybrid"),
            RetrievalMode::Semantic => write!(f, "semantic"),
        }
    }
}

/// Wall-clock milliseconds spent per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub parse_ms: f64,
    pub score_ms: f64,
    pub expand_ms: f64,
    pub assemble_ms: f64,
}

impl StageTimings {
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        match stage {
            Stage::Parse => self.parse_ms += ms,
            Stage::Score => self.score_ms += ms,
            Stage::Expand => self.expand_ms += ms,
            Stage::Assemble => self.assemble_ms += ms,
        }
    }

    pub fn total_ms(&self) -> f64 {
        self.parse_ms + self.score_ms + self.expand_ms + self.assemble_ms
    }
}

/// Stopwatch that hands out per-stage laps
#[derive(Debug)]
pub struct StageClock {
    started: Instant,
    lap: Instant,
    timings: StageTimings,
}

impl Default for StageClock {
    fn default() -> Self {
        Self::start()
    }
}

impl StageClock {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap: now,
            timings: StageTimings::default(),
        }
    }

    /// Charge the time since the previous lap to `stage`
    pub fn lap(&mut self, stage: Stage) {
        let now = Instant::now();
        self.timings.record(stage, now - self.lap);
        self.lap = now;
    }

    /// Stage timings and total elapsed milliseconds
    pub fn finish(self) -> (StageTimings, f64) {
        (self.timings, self.started.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Numbers reported alongside optimized content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    pub compression_ratio: f64,
    /// Symbols rendered into the output
    pub chunks_retrieved: usize,
    pub latency_ms: f64,
    pub retrieval_mode: RetrievalMode,
    pub target_model: String,
    /// Ids of the rendered symbols, in source order
    pub selected: Vec<String>,
    pub stage_timings: StageTimings,
}

impl Metrics {
    /// Metrics for empty input
    pub fn empty(mode: RetrievalMode, model: &str) -> Self {
        Self {
            original_tokens: 0,
            compressed_tokens: 0,
            compression_ratio: 0.0,
            chunks_retrieved: 0,
            latency_ms: 0.0,
            retrieval_mode: mode,
            target_model: model.to_string(),
            selected: Vec::new(),
            stage_timings: StageTimings::default(),
        }
    }
}

/// `original / max(compressed, 1)`
pub fn compression_ratio(original_tokens: usize, compressed_tokens: usize) -> f64 {
    original_tokens as f64 / compressed_tokens.max(1) as f64
}

/// Selected content plus its metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedContext {
    pub content: String,
    pub metrics: Metrics,
}

impl fmt::Display for OptimizedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_division_by_zero() {
        assert_eq!(compression_ratio(100, 25), 4.0);
        assert_eq!(compression_ratio(100, 0), 100.0);
        assert_eq!(compression_ratio(0, 0), 0.0);
    }

    #[test]
    fn clock_charges_laps_to_stages() {
        let mut clock = StageClock::start();
        clock.lap(Stage::Parse);
        clock.lap(Stage::Score);
        let (timings, total) = clock.finish();
        assert!(timings.parse_ms >= 0.0 && timings.score_ms >= 0.0);
        assert_eq!(timings.expand_ms, 0.0);
        assert!(total >= timings.total_ms());
    }

    #[test]
    fn serializes_mode_in_snake_case() -> anyhow::Result<()> {
        let m = Metrics::empty(RetrievalMode::Hybrid, "gpt-4o");
        let v = serde_json::to_value(&m)?;
        assert_eq!(v["retrieval_mode"], "hybrid");
        assert_eq!(v["target_model"], "gpt-4o");
        assert_eq!(v["stage_timings"]["parse_ms"], 0.0);
        Ok(())
    }
}
