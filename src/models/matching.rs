// src/models/matching.rs - Match results and classified output records
use serde::{Deserialize, Serialize};

use crate::models::core::{Attributes, ProductRecord};
use crate::models::stats::AnalysisStats;

/// A scored competitor candidate for one merchant item. Ephemeral: produced
/// per query, ranked descending by score, only the top-K survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub name: String,
    pub normalized_name: String,
    pub price: f64,
    pub external_id: String,
    pub competitor: String,
    pub attributes: Attributes,
    /// Composite similarity score in [0, 100].
    pub score: f64,
}

/// Closed set of price-position decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceDecision {
    Approved,
    PriceHigher,
    PriceLower,
    NeedsReview,
    MissingFromCompetitor,
}

impl PriceDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceDecision::Approved => "approved",
            PriceDecision::PriceHigher => "price_higher",
            PriceDecision::PriceLower => "price_lower",
            PriceDecision::NeedsReview => "needs_review",
            PriceDecision::MissingFromCompetitor => "missing_from_competitor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

/// How the best match (if any) was settled. Degrade-and-continue paths are
/// tagged distinctly so a reviewer can audit which rows got full confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Top candidate cleared the high-confidence cutoff; no oracle involved.
    Auto,
    /// The arbitration oracle picked the candidate (or a cached verdict did).
    Arbitrated,
    /// Oracle unavailable or not configured; top scored candidate retained.
    FallbackTop,
    /// No match at all.
    None,
}

/// The engine's output unit: one per eligible merchant row, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub name: String,
    pub price: f64,
    pub attributes: Attributes,
    pub best_match: Option<CandidateMatch>,
    /// Top-K candidates across all competitor catalogs, for review UIs.
    pub shortlist: Vec<CandidateMatch>,
    /// Distinct competitors represented in the shortlist.
    pub competitor_count: usize,
    /// merchant price - matched competitor price; 0.0 when either is unknown.
    pub price_delta: f64,
    /// Score of the best match, 0.0 when none.
    pub match_score: f64,
    pub decision: PriceDecision,
    pub risk: Option<RiskTier>,
    pub source: MatchSource,
    pub rationale: String,
}

/// A competitor item with no adequate merchant-side counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingRecord {
    pub name: String,
    pub normalized_name: String,
    pub price: f64,
    pub external_id: String,
    pub competitor: String,
    pub attributes: Attributes,
}

impl MissingRecord {
    pub fn from_parts(record: &ProductRecord, normalized: &str, attributes: &Attributes, competitor: &str) -> Self {
        Self {
            name: record.name.clone(),
            normalized_name: normalized.to_string(),
            price: record.price,
            external_id: record.external_id.clone(),
            competitor: competitor.to_string(),
            attributes: attributes.clone(),
        }
    }
}

/// Everything one full catalog-vs-catalogs run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub rows: Vec<ClassifiedRow>,
    pub stats: AnalysisStats,
}
