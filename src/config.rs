// src/config.rs - Immutable run configuration for matching and pricing
//
// All thresholds, keyword lists, brand aliases and synonym substitutions
// live here. The config is constructed once (Default + optional env
// overrides) and passed by Arc into the index builders and the
// orchestrator; nothing consults ambient state at scoring time.
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;

/// A known brand: display-form canonical name plus its aliases in the form
/// they take after normalization (lowercase, Arabic letters folded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub canonical: String,
    pub aliases: Vec<String>,
}

impl Brand {
    fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// What to do with ambiguous matches when the oracle cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleFailurePolicy {
    /// Keep the top scored candidate; grant a price decision only when its
    /// score clears the review threshold.
    TakeTop,
    /// Keep the top candidate for display but always mark needs-review.
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum composite score for a candidate to count as a match at all.
    pub acceptance_threshold: f64,
    /// Score at or above which a match is accepted without arbitration.
    pub high_confidence_cutoff: f64,
    /// Under the take-top failure policy, fallback matches below this score
    /// stay needs-review.
    pub review_threshold: f64,
    /// |price delta| at or below this is "approved".
    pub price_tolerance: f64,
    pub risk_high_delta: f64,
    pub risk_medium_delta: f64,

    pub oracle_batch_size: usize,
    pub shortlist_size: usize,
    pub oracle_retry_attempts: usize,
    pub oracle_timeout_secs: u64,
    pub oracle_failure_policy: OracleFailurePolicy,

    /// Size gap (ml) still treated as the same product tier.
    pub size_tolerance_ml: f64,
    /// Retrieval-time hard rejection: size gap beyond this never matches.
    pub size_hard_cutoff_ml: f64,
    /// Token-sort similarity above which a competitor item "exists" in the
    /// merchant catalog (missing-products pass).
    pub existence_cutoff: f64,
    /// Jaro-Winkler floor for the loose retrieval scan used when token
    /// overlap finds nothing.
    pub loose_prefilter_threshold: f64,

    pub weight_token_sort: f64,
    pub weight_token_set: f64,
    pub weight_partial: f64,

    pub brand_bonus: f64,
    pub brand_penalty: f64,
    pub size_equal_bonus: f64,
    pub size_close_bonus: f64,
    pub size_gap_penalty_per_ml: f64,
    pub size_gap_penalty_cap: f64,
    pub concentration_penalty: f64,
    pub gender_penalty: f64,

    pub sample_keywords: Vec<String>,
    pub tester_keywords: Vec<String>,
    pub set_keywords: Vec<String>,
    pub brands: Vec<Brand>,
    /// Substitution table applied during normalization, in order. Longer
    /// keys must come before their own substrings.
    pub synonyms: Vec<(String, String)>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 60.0,
            high_confidence_cutoff: 95.0,
            review_threshold: 85.0,
            price_tolerance: 5.0,
            risk_high_delta: 20.0,
            risk_medium_delta: 5.0,

            oracle_batch_size: 10,
            shortlist_size: 5,
            oracle_retry_attempts: 3,
            oracle_timeout_secs: 30,
            oracle_failure_policy: OracleFailurePolicy::NeedsReview,

            size_tolerance_ml: 5.0,
            size_hard_cutoff_ml: 30.0,
            existence_cutoff: 70.0,
            loose_prefilter_threshold: 0.78,

            weight_token_sort: 0.35,
            weight_token_set: 0.40,
            weight_partial: 0.25,

            brand_bonus: 6.0,
            brand_penalty: 20.0,
            size_equal_bonus: 4.0,
            size_close_bonus: 2.0,
            size_gap_penalty_per_ml: 1.5,
            size_gap_penalty_cap: 25.0,
            concentration_penalty: 8.0,
            gender_penalty: 15.0,

            sample_keywords: to_owned_list(&[
                "sample", "عينه", "decant", "تقسيم", "تقسيمه", "split", "miniature", "0.5ml",
                "1ml", "2ml", "3ml",
            ]),
            tester_keywords: to_owned_list(&["tester", "تستر", "تيستر"]),
            set_keywords: to_owned_list(&["gift set", "set", "طقم", "مجموعه", "coffret"]),
            brands: default_brands(),
            synonyms: default_synonyms(),
        }
    }
}

impl MatchingConfig {
    /// Default configuration with numeric knobs overridable from the
    /// environment (MATCH_ACCEPTANCE_THRESHOLD, MATCH_HIGH_CONFIDENCE, ...).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.acceptance_threshold = env_f64("MATCH_ACCEPTANCE_THRESHOLD", cfg.acceptance_threshold);
        cfg.high_confidence_cutoff = env_f64("MATCH_HIGH_CONFIDENCE", cfg.high_confidence_cutoff);
        cfg.review_threshold = env_f64("MATCH_REVIEW_THRESHOLD", cfg.review_threshold);
        cfg.price_tolerance = env_f64("PRICE_TOLERANCE", cfg.price_tolerance);
        cfg.oracle_batch_size = env_usize("ORACLE_BATCH_SIZE", cfg.oracle_batch_size).max(1);
        cfg.shortlist_size = env_usize("MATCH_SHORTLIST_SIZE", cfg.shortlist_size).max(1);
        cfg.oracle_retry_attempts = env_usize("ORACLE_RETRY_ATTEMPTS", cfg.oracle_retry_attempts).max(1);
        cfg.oracle_timeout_secs = env_usize("ORACLE_TIMEOUT_SECS", cfg.oracle_timeout_secs as usize) as u64;
        cfg.size_hard_cutoff_ml = env_f64("SIZE_HARD_CUTOFF_ML", cfg.size_hard_cutoff_ml);
        cfg.existence_cutoff = env_f64("EXISTENCE_CUTOFF", cfg.existence_cutoff);
        if let Ok(policy) = env::var("ORACLE_FAILURE_POLICY") {
            cfg.oracle_failure_policy = match policy.trim().to_lowercase().as_str() {
                "take_top" => OracleFailurePolicy::TakeTop,
                _ => OracleFailurePolicy::NeedsReview,
            };
        }
        debug!(
            "Matching config: acceptance={}, high={}, review={}, tolerance={}, batch={}, shortlist={}",
            cfg.acceptance_threshold,
            cfg.high_confidence_cutoff,
            cfg.review_threshold,
            cfg.price_tolerance,
            cfg.oracle_batch_size,
            cfg.shortlist_size
        );
        cfg
    }

    pub fn log_config(&self) {
        info!(
            "⚙️  Thresholds: acceptance {:.0}, auto-accept {:.0}, review {:.0}, price tolerance {:.0}",
            self.acceptance_threshold, self.high_confidence_cutoff, self.review_threshold, self.price_tolerance
        );
        info!(
            "⚙️  Oracle: batch size {}, shortlist {}, {} retries, failure policy {:?}",
            self.oracle_batch_size, self.shortlist_size, self.oracle_retry_attempts, self.oracle_failure_policy
        );
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|s| s.parse::<f64>().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(default)
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Substitutions run against lowercased, script-folded text, in order.
/// Arabic keys are written in their folded form.
fn default_synonyms() -> Vec<(String, String)> {
    [
        ("او دو بارفان", "edp"),
        ("او دي بارفان", "edp"),
        ("او دو تواليت", "edt"),
        ("او دي تواليت", "edt"),
        ("eau de parfum", "edp"),
        ("eau de toilette", "edt"),
        ("ملي", "ml"),
        ("مل", "ml"),
        ("سوفاج", "sauvage"),
        ("ديور", "dior"),
        ("شانيل", "chanel"),
        ("غوتشي", "gucci"),
        ("برادا", "prada"),
        ("كريد", "creed"),
        ("توم فورد", "tom ford"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

fn default_brands() -> Vec<Brand> {
    vec![
        Brand::new("Dior", &["dior"]),
        Brand::new("Chanel", &["chanel"]),
        Brand::new("Gucci", &["gucci"]),
        Brand::new("Tom Ford", &["tom ford"]),
        Brand::new("Versace", &["versace"]),
        Brand::new("Armani", &["armani"]),
        Brand::new("YSL", &["ysl", "yves saint laurent"]),
        Brand::new("Prada", &["prada"]),
        Brand::new("Burberry", &["burberry"]),
        Brand::new("Givenchy", &["givenchy"]),
        Brand::new("Hermes", &["hermes"]),
        Brand::new("Creed", &["creed", "كريد"]),
        Brand::new("Montblanc", &["montblanc"]),
        Brand::new("Calvin Klein", &["calvin klein"]),
        Brand::new("Hugo Boss", &["hugo boss"]),
        Brand::new("Dolce & Gabbana", &["dolce gabbana"]),
        Brand::new("Valentino", &["valentino"]),
        Brand::new("Bvlgari", &["bvlgari", "bulgari"]),
        Brand::new("Cartier", &["cartier"]),
        Brand::new("Lancome", &["lancome"]),
        Brand::new("Jo Malone", &["jo malone"]),
        Brand::new("Amouage", &["amouage", "امواج"]),
        Brand::new("Rasasi", &["rasasi", "رصاصي"]),
        Brand::new("Lattafa", &["lattafa", "لطافه"]),
        Brand::new("Arabian Oud", &["arabian oud", "العربيه للعود"]),
        Brand::new("Ajmal", &["ajmal", "اجمل"]),
        Brand::new("Al Haramain", &["al haramain", "الحرمين"]),
        Brand::new("Afnan", &["afnan", "افنان"]),
        Brand::new("Armaf", &["armaf", "ارماف"]),
        Brand::new("Nishane", &["nishane"]),
        Brand::new("Xerjoff", &["xerjoff"]),
        Brand::new("Parfums de Marly", &["parfums de marly"]),
        Brand::new("Initio", &["initio"]),
        Brand::new("Byredo", &["byredo"]),
        Brand::new("Le Labo", &["le labo"]),
        Brand::new("Mancera", &["mancera"]),
        Brand::new("Montale", &["montale"]),
        Brand::new("Kilian", &["kilian"]),
        Brand::new("Roja", &["roja"]),
        Brand::new("Carolina Herrera", &["carolina herrera"]),
        Brand::new("Jean Paul Gaultier", &["jean paul gaultier"]),
        Brand::new("Narciso Rodriguez", &["narciso rodriguez"]),
        Brand::new("Paco Rabanne", &["paco rabanne"]),
        Brand::new("Mugler", &["mugler"]),
        Brand::new("Chloe", &["chloe"]),
        Brand::new("Coach", &["coach"]),
        Brand::new("Michael Kors", &["michael kors"]),
        Brand::new("Ralph Lauren", &["ralph lauren"]),
    ]
}
