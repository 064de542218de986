// src/matching/missing.rs - Missing-products pass
//
// One-directional set difference: competitor items with no adequately
// similar merchant counterpart. Intentionally simpler than full matching;
// a yes/no existence answer on a single order-invariant measure is enough.
use log::info;
use std::collections::HashSet;

use crate::config::MatchingConfig;
use crate::matching::attributes::is_sample;
use crate::matching::index::CandidateIndex;
use crate::matching::normalize::normalize;
use crate::matching::score::token_sort_ratio;
use crate::models::core::ProductRecord;
use crate::models::matching::MissingRecord;
use crate::utils::logging::{AnalysisLogger, RunKind};

/// Competitor entries (already sample/tester-free from index build) whose
/// normalized name reaches the existence cutoff against no merchant name.
/// Deduplicated by normalized name across all catalogs combined; the first
/// occurrence wins and later duplicates are dropped silently.
pub fn find_missing(
    merchant: &[ProductRecord],
    indices: &[CandidateIndex],
    config: &MatchingConfig,
) -> Vec<MissingRecord> {
    let logger = AnalysisLogger::new(RunKind::Missing);
    logger.log_phase("Preparing merchant names", None);

    let merchant_names: Vec<String> = merchant
        .iter()
        .map(|r| normalize(&r.name, &config.synonyms))
        .filter(|n| !n.is_empty() && !is_sample(n, config))
        .collect();
    logger.log_data_loaded(merchant_names.len(), "merchant name");

    let mut seen: HashSet<String> = HashSet::new();
    let mut missing: Vec<MissingRecord> = Vec::new();

    for index in indices {
        for entry in index.entries() {
            let normalized = &entry.normalized;
            if seen.contains(normalized) {
                continue;
            }
            let exists = merchant_names
                .iter()
                .any(|ours| token_sort_ratio(normalized, ours) >= config.existence_cutoff);
            if !exists {
                seen.insert(normalized.clone());
                missing.push(MissingRecord::from_parts(
                    &entry.record,
                    normalized,
                    &entry.attributes,
                    &index.competitor,
                ));
            }
        }
    }

    info!(
        "[MISSING] 🔍 {} competitor items have no merchant counterpart (cutoff {:.0})",
        missing.len(),
        config.existence_cutoff
    );
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, price: f64, source: &str) -> ProductRecord {
        ProductRecord::new(name, price, "", source)
    }

    fn index_named(competitor: &str, names: &[&str], cfg: &MatchingConfig) -> CandidateIndex {
        let records: Vec<ProductRecord> = names
            .iter()
            .map(|n| record(n, 100.0, competitor))
            .collect();
        CandidateIndex::build(competitor, &records, cfg)
    }

    #[test]
    fn emits_exactly_the_unmatched_competitor_item() {
        let cfg = MatchingConfig::default();
        let merchant = vec![record("Dior Sauvage EDT 100ml", 380.0, "ours")];
        let index = index_named(
            "competitor-a",
            &["Dior Sauvage EDT 100ml", "Chanel Bleu EDP 100ml"],
            &cfg,
        );
        let missing = find_missing(&merchant, &[index], &cfg);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Chanel Bleu EDP 100ml");
        assert_eq!(missing[0].competitor, "competitor-a");
    }

    #[test]
    fn every_emitted_record_fails_the_existence_cutoff_everywhere() {
        let cfg = MatchingConfig::default();
        let merchant = vec![
            record("Dior Sauvage EDT 100ml", 380.0, "ours"),
            record("Creed Aventus EDP 100ml", 980.0, "ours"),
        ];
        let index = index_named(
            "competitor-a",
            &[
                "Sauvage Dior EDT 100ml",
                "Creed Aventus 100ml EDP",
                "Xerjoff Naxos EDP 50ml",
            ],
            &cfg,
        );
        let missing = find_missing(&merchant, &[index], &cfg);
        let merchant_names: Vec<String> = merchant
            .iter()
            .map(|r| normalize(&r.name, &cfg.synonyms))
            .collect();
        for item in &missing {
            for ours in &merchant_names {
                assert!(
                    token_sort_ratio(&item.normalized_name, ours) < cfg.existence_cutoff,
                    "{} should not exist in merchant catalog",
                    item.name
                );
            }
        }
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Xerjoff Naxos EDP 50ml");
    }

    #[test]
    fn duplicates_across_competitors_are_dropped_silently() {
        let cfg = MatchingConfig::default();
        let merchant = vec![record("Dior Sauvage EDT 100ml", 380.0, "ours")];
        let index_a = index_named("competitor-a", &["Chanel Bleu EDP 100ml"], &cfg);
        let index_b = index_named("competitor-b", &["Chanel Bleu EDP 100ml"], &cfg);
        let missing = find_missing(&merchant, &[index_a, index_b], &cfg);
        assert_eq!(missing.len(), 1);
        // First occurrence wins.
        assert_eq!(missing[0].competitor, "competitor-a");
    }

    #[test]
    fn samples_never_appear_in_missing_detection() {
        let cfg = MatchingConfig::default();
        let merchant = vec![record("Dior Sauvage EDT 100ml", 380.0, "ours")];
        let index = index_named("competitor-a", &["Sample - Amouage Reflection 2ml"], &cfg);
        let missing = find_missing(&merchant, &[index], &cfg);
        assert!(missing.is_empty());
    }

    #[test]
    fn empty_inputs_produce_empty_output() {
        let cfg = MatchingConfig::default();
        assert!(find_missing(&[], &[], &cfg).is_empty());
    }
}
