// src/matching/index.rs - Per-competitor candidate index
//
// Built once per competitor catalog: normalization, attribute extraction
// and tokenization happen at build time so every merchant query against
// the catalog pays only for lookup and scoring. Retrieval applies hard
// brand/size rejections before any composite scoring runs.
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::collections::{HashMap, HashSet};
use strsim::jaro_winkler;

use crate::config::MatchingConfig;
use crate::matching::attributes::{is_sample, is_tester};
use crate::matching::normalize::normalize;
use crate::matching::score::composite_score;
use crate::models::core::{Attributes, ProductRecord};
use crate::models::matching::CandidateMatch;

const MIN_TOKEN_LENGTH: usize = 2;
const MIN_TOKEN_OVERLAP: usize = 1;

/// One competitor record with everything precomputed at build time.
#[derive(Debug, Clone)]
pub struct IndexedProduct {
    pub record: ProductRecord,
    pub normalized: String,
    pub attributes: Attributes,
    tokens: HashSet<String>,
}

pub struct CandidateIndex {
    pub competitor: String,
    entries: Vec<IndexedProduct>,
    token_map: HashMap<String, Vec<usize>>,
    pub excluded_rows: usize,
}

impl CandidateIndex {
    /// Index a competitor catalog. Rows flagged as samples or testers are
    /// excluded here so neither matching nor the missing pass ever sees
    /// them. Overly common tokens are left out of the inverted map to keep
    /// candidate sets bounded.
    pub fn build(competitor: &str, records: &[ProductRecord], config: &MatchingConfig) -> Self {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  🗂️ [{elapsed_precise}] {bar:30.yellow/red} {pos}/{len} Indexing candidates...")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        let mut entries: Vec<IndexedProduct> = Vec::with_capacity(records.len());
        let mut token_frequency: HashMap<String, usize> = HashMap::new();
        let mut excluded_rows = 0usize;

        for record in records {
            pb.inc(1);
            let normalized = normalize(&record.name, &config.synonyms);
            if normalized.is_empty() {
                excluded_rows += 1;
                continue;
            }
            if is_sample(&normalized, config) || is_tester(&normalized, config) {
                excluded_rows += 1;
                continue;
            }
            let attributes = Attributes::extract(&normalized, config);
            let tokens = tokenize(&normalized);
            for token in &tokens {
                *token_frequency.entry(token.clone()).or_insert(0) += 1;
            }
            entries.push(IndexedProduct {
                record: record.clone(),
                normalized,
                attributes,
                tokens,
            });
        }

        // Tokens present in more than ~5% of the catalog (floor 10) carry
        // no discriminating signal and would make every query scan
        // everything.
        let max_common_token_freq = ((entries.len() as f64) * 0.05).max(10.0) as usize;
        let mut token_map: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for token in &entry.tokens {
                let freq = token_frequency.get(token).copied().unwrap_or(0);
                if freq <= max_common_token_freq {
                    token_map.entry(token.clone()).or_default().push(idx);
                }
            }
        }

        pb.finish_with_message(format!("Indexed {} entries for {}", entries.len(), competitor));
        debug!(
            "[INDEX] {} rows -> {} entries ({} excluded), {} indexed tokens",
            records.len(),
            entries.len(),
            excluded_rows,
            token_map.len()
        );

        Self {
            competitor: competitor.to_string(),
            entries,
            token_map,
            excluded_rows,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexedProduct] {
        &self.entries
    }

    /// Top-n candidates for one merchant item. Empty catalog yields an
    /// empty result, never an error.
    pub fn search(
        &self,
        query_normalized: &str,
        query_attrs: &Attributes,
        top_n: usize,
        config: &MatchingConfig,
    ) -> Vec<CandidateMatch> {
        if self.entries.is_empty() || query_normalized.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let candidate_indices = self.loose_candidates(query_normalized, config);

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for idx in candidate_indices {
            let entry = &self.entries[idx];

            // Retrieval-time rejections, not scoring penalties: a known
            // brand conflict or an implausible size gap can never match.
            if query_attrs.brand_conflicts_with(&entry.attributes) {
                continue;
            }
            if query_attrs.has_size()
                && entry.attributes.has_size()
                && (query_attrs.size_ml - entry.attributes.size_ml).abs() > config.size_hard_cutoff_ml
            {
                continue;
            }

            let score = composite_score(
                query_normalized,
                &entry.normalized,
                query_attrs,
                &entry.attributes,
                config,
            );
            if score >= config.acceptance_threshold {
                scored.push((idx, score));
            }
        }

        // Descending by score; ties stay in catalog order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(top_n);

        scored
            .into_iter()
            .map(|(idx, score)| {
                let entry = &self.entries[idx];
                CandidateMatch {
                    name: entry.record.name.clone(),
                    normalized_name: entry.normalized.clone(),
                    price: entry.record.price,
                    external_id: entry.record.external_id.clone(),
                    competitor: self.competitor.clone(),
                    attributes: entry.attributes.clone(),
                    score,
                }
            })
            .collect()
    }

    /// Loose pre-filter: gather by token overlap through the inverted map;
    /// when overlap finds nothing (typos, transliteration leftovers), fall
    /// back to a Jaro-Winkler scan at a threshold well below acceptance so
    /// the loose set stays a superset of every plausible match.
    fn loose_candidates(&self, query_normalized: &str, config: &MatchingConfig) -> Vec<usize> {
        let query_tokens = tokenize(query_normalized);
        let mut overlap: HashMap<usize, usize> = HashMap::new();
        for token in &query_tokens {
            if let Some(indices) = self.token_map.get(token) {
                for &idx in indices {
                    *overlap.entry(idx).or_insert(0) += 1;
                }
            }
        }

        let mut candidates: Vec<usize> = overlap
            .into_iter()
            .filter(|&(_, count)| count >= MIN_TOKEN_OVERLAP)
            .map(|(idx, _)| idx)
            .collect();

        if candidates.is_empty() {
            candidates = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| jaro_winkler(query_normalized, &e.normalized) >= config.loose_prefilter_threshold)
                .map(|(idx, _)| idx)
                .collect();
        }

        candidates.sort_unstable();
        candidates
    }
}

fn tokenize(normalized: &str) -> HashSet<String> {
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LENGTH)
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;

    fn record(name: &str, price: f64) -> ProductRecord {
        ProductRecord::new(name, price, "", "competitor-a")
    }

    fn build(names: &[(&str, f64)]) -> (CandidateIndex, MatchingConfig) {
        let cfg = MatchingConfig::default();
        let records: Vec<ProductRecord> = names.iter().map(|(n, p)| record(n, *p)).collect();
        (CandidateIndex::build("competitor-a", &records, &cfg), cfg)
    }

    fn query(index: &CandidateIndex, cfg: &MatchingConfig, name: &str) -> Vec<CandidateMatch> {
        let normalized = normalize(name, &cfg.synonyms);
        let attrs = Attributes::extract(&normalized, cfg);
        index.search(&normalized, &attrs, cfg.shortlist_size, cfg)
    }

    #[test]
    fn empty_catalog_returns_empty_result() {
        let (index, cfg) = build(&[]);
        assert!(query(&index, &cfg, "Dior Sauvage EDP").is_empty());
    }

    #[test]
    fn finds_reordered_and_decorated_names() {
        let (index, cfg) = build(&[
            ("Sauvage Dior Eau de Parfum 100ml", 430.0),
            ("Chanel Bleu de Chanel EDP 100ml", 410.0),
        ]);
        let hits = query(&index, &cfg, "Dior Sauvage EDP 100ml");
        assert!(!hits.is_empty());
        assert_eq!(hits[0].name, "Sauvage Dior Eau de Parfum 100ml");
    }

    #[test]
    fn brand_conflict_is_rejected_at_retrieval() {
        let (index, cfg) = build(&[("Chanel Sauvage EDP 100ml", 430.0)]);
        let hits = query(&index, &cfg, "Dior Sauvage EDP 100ml");
        assert!(hits.is_empty(), "conflicting brand must never be retrieved");
    }

    #[test]
    fn size_gap_beyond_hard_cutoff_is_rejected() {
        let (index, cfg) = build(&[("Dior Sauvage EDP 200ml", 700.0)]);
        let hits = query(&index, &cfg, "Dior Sauvage EDP 100ml");
        assert!(hits.is_empty());
    }

    #[test]
    fn sample_and_tester_rows_are_not_indexed() {
        let (index, _cfg) = build(&[
            ("Sample - Dior Sauvage 2ml", 15.0),
            ("Dior Sauvage Tester 100ml", 300.0),
            ("Dior Sauvage EDP 100ml", 430.0),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.excluded_rows, 2);
    }

    #[test]
    fn results_are_ranked_descending_and_truncated() {
        let (index, cfg) = build(&[
            ("Dior Sauvage EDT 100ml", 380.0),
            ("Dior Sauvage EDP 100ml", 430.0),
            ("Dior Sauvage Elixir 60ml", 520.0),
        ]);
        let hits = query(&index, &cfg, "Dior Sauvage EDP 100ml");
        assert!(!hits.is_empty());
        assert_eq!(hits[0].name, "Dior Sauvage EDP 100ml");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let top1 = index.search(
            &normalize("Dior Sauvage EDP 100ml", &cfg.synonyms),
            &Attributes::extract(&normalize("Dior Sauvage EDP 100ml", &cfg.synonyms), &cfg),
            1,
            &cfg,
        );
        assert_eq!(top1.len(), 1);
    }
}
