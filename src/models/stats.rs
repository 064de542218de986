// src/models/stats.rs - Per-run counters for the analysis pipeline
use serde::{Deserialize, Serialize};

/// Counters accumulated over one full analysis run. Every degrade path has
/// its own counter so the run summary accounts for all input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_rows: usize,
    pub skipped_samples: usize,
    pub skipped_empty_names: usize,
    pub classified_rows: usize,

    pub auto_accepted: usize,
    pub arbitrated: usize,
    pub fallback_top: usize,
    pub no_candidates: usize,

    pub approved: usize,
    pub price_higher: usize,
    pub price_lower: usize,
    pub needs_review: usize,
    pub missing_from_competitor: usize,

    pub oracle_batches: usize,
    pub oracle_items: usize,
    pub oracle_cache_hits: usize,
    pub oracle_failures: usize,

    pub avg_best_score: f64,
    pub elapsed_seconds: f64,
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self {
            total_rows: 0,
            skipped_samples: 0,
            skipped_empty_names: 0,
            classified_rows: 0,
            auto_accepted: 0,
            arbitrated: 0,
            fallback_top: 0,
            no_candidates: 0,
            approved: 0,
            price_higher: 0,
            price_lower: 0,
            needs_review: 0,
            missing_from_competitor: 0,
            oracle_batches: 0,
            oracle_items: 0,
            oracle_cache_hits: 0,
            oracle_failures: 0,
            avg_best_score: 0.0,
            elapsed_seconds: 0.0,
        }
    }
}
