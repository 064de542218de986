// src/utils/logging.rs - Run-scoped logging helpers for analysis passes
use log::{debug, error, info, warn};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Catalog,
    Missing,
}

#[derive(Clone)]
pub struct AnalysisLogger {
    kind_name: &'static str,
    emoji: &'static str,
    start_time: Instant,
}

impl AnalysisLogger {
    pub fn new(kind: RunKind) -> Self {
        let (kind_name, emoji) = match kind {
            RunKind::Catalog => ("CATALOG", "🧴"),
            RunKind::Missing => ("MISSING", "🔍"),
        };
        Self {
            kind_name,
            emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str, has_oracle: bool) {
        info!(
            "[{}] {} 🚀 Starting {} analysis (run ID: {}){}",
            self.kind_name,
            self.emoji,
            self.kind_name.to_lowercase(),
            run_id,
            if has_oracle { " with arbitration oracle" } else { " (no oracle configured)" }
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.kind_name, self.emoji, phase, details, elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.kind_name, self.emoji, phase, elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.kind_name, self.emoji, count, data_type
        );
    }

    pub fn log_completion(&self, classified: usize, matched: usize, avg_score: f64) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED: {} rows classified in {:.2?}",
            self.kind_name, self.emoji, classified, duration
        );
        info!(
            "[{}] {} 📊 Results: {} matched, avg best score: {:.1}",
            self.kind_name, self.emoji, matched, avg_score
        );
    }

    pub fn log_oracle_summary(&self, batches: usize, cache_hits: usize, failures: usize) {
        if batches > 0 || cache_hits > 0 {
            info!(
                "[{}] {} 🤖 Oracle: {} batch calls, {} cache hits",
                self.kind_name, self.emoji, batches, cache_hits
            );
        }
        if failures > 0 {
            warn!(
                "[{}] {} ⚠️  {} oracle batches fell back to the failure policy",
                self.kind_name, self.emoji, failures
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.kind_name, self.emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.kind_name, self.emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.kind_name, self.emoji, message);
    }

    pub fn get_elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
