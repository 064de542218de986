// src/matching/orchestrator.rs - Full catalog-vs-catalogs analysis run
//
// Drives one run end to end: per-item candidate retrieval across all
// competitor indices, auto-acceptance of unambiguous matches, oracle
// batching for the ambiguous band, price-decision assignment, progress
// reporting. Per merchant item the state machine is
//   Unscored -> CandidatesFound -> {AutoAccepted | PendingArbitration |
//   NoCandidates} -> Classified
// No per-item failure may terminate the run; every degrade path is tagged
// in the output via MatchSource.
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::arbitration::{
    cache_key, shared_lru_cache, ArbitrationOracle, ArbitrationQuery, ArbitrationVerdict,
    SharedOracleCache, ShortlistEntry,
};
use crate::config::{MatchingConfig, OracleFailurePolicy};
use crate::matching::attributes::is_sample;
use crate::matching::index::CandidateIndex;
use crate::matching::normalize::normalize;
use crate::models::core::{Attributes, ProductRecord};
use crate::models::matching::{
    AnalysisReport, CandidateMatch, ClassifiedRow, MatchSource, PriceDecision, RiskTier,
};
use crate::models::stats::AnalysisStats;
use crate::utils::logging::{AnalysisLogger, RunKind};
use crate::utils::progress::{report_progress, AtomicProgress, ProgressCallback};

/// Shortlists sent to the oracle never exceed this many candidates.
const ORACLE_SHORTLIST_CAP: usize = 5;

struct PreparedItem {
    record: ProductRecord,
    normalized: String,
    attributes: Attributes,
}

struct PendingItem {
    slot: usize,
    item_index: usize,
    shortlist: Vec<CandidateMatch>,
    competitor_count: usize,
    query: ArbitrationQuery,
    key: String,
}

pub struct MatchEngine {
    config: Arc<MatchingConfig>,
    oracle: Option<Arc<dyn ArbitrationOracle>>,
    cache: SharedOracleCache,
    progress: Arc<AtomicProgress>,
}

impl MatchEngine {
    pub fn new(config: Arc<MatchingConfig>) -> Self {
        Self {
            config,
            oracle: None,
            cache: shared_lru_cache(),
            progress: Arc::new(AtomicProgress::new()),
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ArbitrationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_cache(mut self, cache: SharedOracleCache) -> Self {
        self.cache = cache;
        self
    }

    /// The packed progress record; safe to poll from another thread while
    /// a run is in flight.
    pub fn progress(&self) -> Arc<AtomicProgress> {
        Arc::clone(&self.progress)
    }

    /// Classify every eligible merchant row against the competitor
    /// indices. Output rows are in merchant input order, one per eligible
    /// row; samples and empty names are skipped and counted.
    pub async fn run_full_analysis(
        &self,
        run_id: &str,
        merchant: &[ProductRecord],
        indices: &[CandidateIndex],
        progress_callback: Option<ProgressCallback>,
    ) -> Result<AnalysisReport> {
        let logger = AnalysisLogger::new(RunKind::Catalog);
        logger.log_start(run_id, self.oracle.is_some());
        let started = Instant::now();

        let mut stats = AnalysisStats::default();
        stats.total_rows = merchant.len();

        logger.log_phase("Preparing merchant catalog", Some("normalizing names and extracting attributes"));
        let mut prepared: Vec<PreparedItem> = Vec::with_capacity(merchant.len());
        for record in merchant {
            let normalized = normalize(&record.name, &self.config.synonyms);
            if normalized.is_empty() {
                stats.skipped_empty_names += 1;
                continue;
            }
            if is_sample(&normalized, &self.config) {
                stats.skipped_samples += 1;
                continue;
            }
            let attributes = Attributes::extract(&normalized, &self.config);
            prepared.push(PreparedItem {
                record: record.clone(),
                normalized,
                attributes,
            });
        }
        let total = prepared.len();
        logger.log_data_loaded(total, "eligible merchant");

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  🧴 [{elapsed_precise}] {bar:30.green/blue} {pos}/{len} Classifying products...")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        let mut rows: Vec<Option<ClassifiedRow>> = Vec::with_capacity(total);
        let mut pending: Vec<PendingItem> = Vec::new();
        let mut done = 0usize;
        let mut reported = 0usize;
        let mut score_sum = 0.0f64;
        let mut score_count = 0usize;

        logger.log_phase("Classifying", Some("retrieval, scoring and arbitration batching"));
        for (item_index, item) in prepared.iter().enumerate() {
            let (shortlist, competitor_count) = self.merged_shortlist(item, indices);

            if shortlist.is_empty() {
                stats.no_candidates += 1;
                stats.missing_from_competitor += 1;
                rows.push(Some(self.missing_row(item, Vec::new(), 0, "no competitor match found")));
                done += 1;
            } else if shortlist[0].score >= self.config.high_confidence_cutoff {
                stats.auto_accepted += 1;
                let best = shortlist[0].clone();
                score_sum += best.score;
                score_count += 1;
                rows.push(Some(self.matched_row(
                    item,
                    best,
                    shortlist,
                    competitor_count,
                    MatchSource::Auto,
                    &mut stats,
                )));
                done += 1;
            } else {
                let query = build_query(item, &shortlist);
                let key = cache_key(&query);
                let cached = { self.cache.lock().await.get(&key) };
                if let Some(verdict) = cached {
                    stats.oracle_cache_hits += 1;
                    let row = self.verdict_row(item, &shortlist, competitor_count, verdict, &mut stats);
                    if let Some(best) = &row.best_match {
                        score_sum += best.score;
                        score_count += 1;
                    }
                    rows.push(Some(row));
                    done += 1;
                } else {
                    pending.push(PendingItem {
                        slot: rows.len(),
                        item_index,
                        shortlist,
                        competitor_count,
                        query,
                        key,
                    });
                    rows.push(None);
                    if pending.len() >= self.config.oracle_batch_size {
                        let flushed = self
                            .flush_pending(&mut pending, &prepared, &mut rows, &mut stats, &logger, &mut score_sum, &mut score_count)
                            .await;
                        done += flushed;
                    }
                }
            }

            // The callback fires only once an item is fully classified;
            // batched items report after their flush.
            if done > reported {
                pb.set_position(done as u64);
                report_progress(&self.progress, &progress_callback, done, total);
                reported = done;
            }
        }

        if !pending.is_empty() {
            let flushed = self
                .flush_pending(&mut pending, &prepared, &mut rows, &mut stats, &logger, &mut score_sum, &mut score_count)
                .await;
            done += flushed;
            pb.set_position(done as u64);
            report_progress(&self.progress, &progress_callback, done, total);
        }
        pb.finish_with_message("Classification complete");

        let rows: Vec<ClassifiedRow> = rows.into_iter().flatten().collect();
        debug_assert_eq!(rows.len(), total);

        stats.classified_rows = rows.len();
        stats.avg_best_score = if score_count > 0 { score_sum / score_count as f64 } else { 0.0 };
        stats.elapsed_seconds = started.elapsed().as_secs_f64();

        logger.log_completion(stats.classified_rows, score_count, stats.avg_best_score);
        logger.log_oracle_summary(stats.oracle_batches, stats.oracle_cache_hits, stats.oracle_failures);

        Ok(AnalysisReport {
            run_id: run_id.to_string(),
            rows,
            stats,
        })
    }

    /// Top-K candidates across all competitor catalogs, best first; ties
    /// keep catalog order (stable sort over the per-catalog rankings).
    fn merged_shortlist(&self, item: &PreparedItem, indices: &[CandidateIndex]) -> (Vec<CandidateMatch>, usize) {
        let mut merged: Vec<CandidateMatch> = Vec::new();
        for index in indices {
            merged.extend(index.search(
                &item.normalized,
                &item.attributes,
                self.config.shortlist_size,
                &self.config,
            ));
        }
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(self.config.shortlist_size);

        let mut competitors: Vec<&str> = merged.iter().map(|m| m.competitor.as_str()).collect();
        competitors.sort_unstable();
        competitors.dedup();
        let competitor_count = competitors.len();
        (merged, competitor_count)
    }

    async fn flush_pending(
        &self,
        pending: &mut Vec<PendingItem>,
        prepared: &[PreparedItem],
        rows: &mut Vec<Option<ClassifiedRow>>,
        stats: &mut AnalysisStats,
        logger: &AnalysisLogger,
        score_sum: &mut f64,
        score_count: &mut usize,
    ) -> usize {
        if pending.is_empty() {
            return 0;
        }
        let queries: Vec<ArbitrationQuery> = pending.iter().map(|p| p.query.clone()).collect();
        stats.oracle_items += queries.len();
        debug!("Flushing arbitration batch of {} items", queries.len());

        let verdicts = if let Some(oracle) = &self.oracle {
            stats.oracle_batches += 1;
            match self.arbitrate_with_retry(oracle.as_ref(), &queries).await {
                Ok(verdicts) => Some(verdicts),
                Err(e) => {
                    stats.oracle_failures += 1;
                    logger.log_warning(&format!(
                        "Arbitration batch of {} failed after retries: {}; applying failure policy",
                        queries.len(),
                        e
                    ));
                    None
                }
            }
        } else {
            None
        };

        match verdicts {
            Some(verdicts) => {
                let mut cache = self.cache.lock().await;
                for (pending_item, verdict) in pending.iter().zip(verdicts.into_iter()) {
                    cache.put(pending_item.key.clone(), verdict);
                    let item = &prepared[pending_item.item_index];
                    let row = self.verdict_row(
                        item,
                        &pending_item.shortlist,
                        pending_item.competitor_count,
                        verdict,
                        stats,
                    );
                    if let Some(best) = &row.best_match {
                        *score_sum += best.score;
                        *score_count += 1;
                    }
                    rows[pending_item.slot] = Some(row);
                }
            }
            None => {
                for pending_item in pending.iter() {
                    let item = &prepared[pending_item.item_index];
                    let row = self.fallback_row(
                        item,
                        &pending_item.shortlist,
                        pending_item.competitor_count,
                        stats,
                    );
                    if let Some(best) = &row.best_match {
                        *score_sum += best.score;
                        *score_count += 1;
                    }
                    rows[pending_item.slot] = Some(row);
                }
            }
        }

        let flushed = pending.len();
        pending.clear();
        flushed
    }

    async fn arbitrate_with_retry(
        &self,
        oracle: &dyn ArbitrationOracle,
        batch: &[ArbitrationQuery],
    ) -> Result<Vec<ArbitrationVerdict>> {
        let attempts = self.config.oracle_retry_attempts.max(1);
        let mut last_error = anyhow!("oracle never invoked");
        for attempt in 0..attempts {
            if attempt > 0 {
                let base = 500u64 * (1u64 << (attempt - 1).min(4) as u32);
                let jitter = rand::thread_rng().gen_range(0..250);
                tokio::time::sleep(Duration::from_millis(base + jitter)).await;
            }
            match oracle.arbitrate(batch).await {
                Ok(verdicts) if verdicts.len() == batch.len() => return Ok(verdicts),
                Ok(verdicts) => {
                    last_error = anyhow!(
                        "oracle returned {} verdicts for {} queries",
                        verdicts.len(),
                        batch.len()
                    );
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Turn an oracle verdict into a classified row. Out-of-range indices
    /// fall back to the top candidate; an explicit none is a missing
    /// product, not an error.
    fn verdict_row(
        &self,
        item: &PreparedItem,
        shortlist: &[CandidateMatch],
        competitor_count: usize,
        verdict: ArbitrationVerdict,
        stats: &mut AnalysisStats,
    ) -> ClassifiedRow {
        match verdict.selected {
            None => {
                stats.missing_from_competitor += 1;
                self.missing_row(
                    item,
                    shortlist.to_vec(),
                    competitor_count,
                    "arbitration found no true competitor match",
                )
            }
            Some(index) => {
                let index = if index < shortlist.len() { index } else { 0 };
                stats.arbitrated += 1;
                self.matched_row(
                    item,
                    shortlist[index].clone(),
                    shortlist.to_vec(),
                    competitor_count,
                    MatchSource::Arbitrated,
                    stats,
                )
            }
        }
    }

    /// Oracle unreachable (or never configured): apply the failure policy.
    /// Ambiguity wins over price comparison unless take-top is configured
    /// and the candidate clears the review threshold.
    fn fallback_row(
        &self,
        item: &PreparedItem,
        shortlist: &[CandidateMatch],
        competitor_count: usize,
        stats: &mut AnalysisStats,
    ) -> ClassifiedRow {
        let top = shortlist[0].clone();
        stats.fallback_top += 1;
        let take_top = self.config.oracle_failure_policy == OracleFailurePolicy::TakeTop
            && top.score >= self.config.review_threshold;
        if take_top {
            self.matched_row(
                item,
                top,
                shortlist.to_vec(),
                competitor_count,
                MatchSource::FallbackTop,
                stats,
            )
        } else {
            stats.needs_review += 1;
            let (delta, _, _) = self.decide_price(item.record.price, top.price);
            let rationale = format!("ambiguous match ({:.1}%) pending review: {}", top.score, top.name);
            ClassifiedRow {
                name: item.record.name.clone(),
                price: item.record.price,
                attributes: item.attributes.clone(),
                match_score: top.score,
                best_match: Some(top),
                shortlist: shortlist.to_vec(),
                competitor_count,
                price_delta: delta,
                decision: PriceDecision::NeedsReview,
                risk: None,
                source: MatchSource::FallbackTop,
                rationale,
            }
        }
    }

    fn matched_row(
        &self,
        item: &PreparedItem,
        best: CandidateMatch,
        shortlist: Vec<CandidateMatch>,
        competitor_count: usize,
        source: MatchSource,
        stats: &mut AnalysisStats,
    ) -> ClassifiedRow {
        let (delta, decision, risk) = self.decide_price(item.record.price, best.price);
        match decision {
            PriceDecision::Approved => stats.approved += 1,
            PriceDecision::PriceHigher => stats.price_higher += 1,
            PriceDecision::PriceLower => stats.price_lower += 1,
            _ => {}
        }
        let rationale = format!(
            "{:.1}% match with {} | price delta {:+.2}",
            best.score, best.name, delta
        );
        ClassifiedRow {
            name: item.record.name.clone(),
            price: item.record.price,
            attributes: item.attributes.clone(),
            match_score: best.score,
            best_match: Some(best),
            shortlist,
            competitor_count,
            price_delta: delta,
            decision,
            risk: Some(risk),
            source,
            rationale,
        }
    }

    fn missing_row(
        &self,
        item: &PreparedItem,
        shortlist: Vec<CandidateMatch>,
        competitor_count: usize,
        rationale: &str,
    ) -> ClassifiedRow {
        ClassifiedRow {
            name: item.record.name.clone(),
            price: item.record.price,
            attributes: item.attributes.clone(),
            best_match: None,
            shortlist,
            competitor_count,
            price_delta: 0.0,
            match_score: 0.0,
            decision: PriceDecision::MissingFromCompetitor,
            risk: None,
            source: MatchSource::None,
            rationale: rationale.to_string(),
        }
    }

    /// Price positioning from the matched competitor price alone. Unknown
    /// prices on either side neutralize the delta.
    fn decide_price(&self, our_price: f64, competitor_price: f64) -> (f64, PriceDecision, RiskTier) {
        let delta = if our_price > 0.0 && competitor_price > 0.0 {
            our_price - competitor_price
        } else {
            0.0
        };
        let decision = if delta > self.config.price_tolerance {
            PriceDecision::PriceHigher
        } else if delta < -self.config.price_tolerance {
            PriceDecision::PriceLower
        } else {
            PriceDecision::Approved
        };
        let risk = if delta > self.config.risk_high_delta {
            RiskTier::High
        } else if delta > self.config.risk_medium_delta {
            RiskTier::Medium
        } else {
            RiskTier::Low
        };
        (delta, decision, risk)
    }
}

fn build_query(item: &PreparedItem, shortlist: &[CandidateMatch]) -> ArbitrationQuery {
    ArbitrationQuery {
        product: item.normalized.clone(),
        price: item.record.price,
        shortlist: shortlist
            .iter()
            .take(ORACLE_SHORTLIST_CAP)
            .map(|candidate| ShortlistEntry {
                name: candidate.name.clone(),
                price: candidate.price,
                score: candidate.score,
            })
            .collect(),
    }
}
