// src/matching/attributes.rs - Attribute extraction over normalized names
//
// All extractors are pure functions over normalized text. A missing signal
// is always Unknown/None/0, never guessed.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Brand, MatchingConfig};
use crate::models::core::{Attributes, ConcentrationType, Gender};

static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*ml\b").unwrap());

const EXTRAIT_KEYWORDS: [&str; 2] = ["extrait", "خلاصه"];
const EDP_KEYWORDS: [&str; 3] = ["edp", "parfum", "بارفان"];
const EDT_KEYWORDS: [&str; 3] = ["edt", "toilette", "تواليت"];
const EDC_KEYWORDS: [&str; 3] = ["edc", "cologne", "كولون"];

const MALE_TERMS: [&str; 6] = ["men", "man", "male", "homme", "رجالي", "له"];
const FEMALE_TERMS: [&str; 6] = ["women", "woman", "female", "femme", "نسايي", "لها"];

impl Attributes {
    /// Derive all attributes from one normalized name.
    pub fn extract(normalized: &str, config: &MatchingConfig) -> Attributes {
        Attributes {
            brand: extract_brand(normalized, &config.brands),
            size_ml: extract_size(normalized),
            concentration: extract_concentration(normalized),
            gender: extract_gender(normalized),
        }
    }
}

/// First alias hit against the known-brand table wins, in table order. This
/// is deterministic but not a best match; the table is small enough that
/// the approximation has not mattered in practice.
pub fn extract_brand(normalized: &str, brands: &[Brand]) -> Option<String> {
    for brand in brands {
        for alias in &brand.aliases {
            if normalized.contains(alias.as_str()) {
                return Some(brand.canonical.clone());
            }
        }
    }
    None
}

/// First `number + ml` occurrence; 0.0 when absent. Units are already
/// canonical "ml" after normalization.
pub fn extract_size(normalized: &str) -> f64 {
    SIZE_RE
        .captures(normalized)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Mutually exclusive vocabularies checked in fixed priority order:
/// Extrait > EDP > EDT > EDC.
pub fn extract_concentration(normalized: &str) -> ConcentrationType {
    if EXTRAIT_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        ConcentrationType::Extrait
    } else if EDP_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        ConcentrationType::Edp
    } else if EDT_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        ConcentrationType::Edt
    } else if EDC_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        ConcentrationType::Edc
    } else {
        ConcentrationType::Unknown
    }
}

/// Gender needs term-boundary matching: "men" is a substring of "women".
/// Both-or-neither present yields Unknown.
pub fn extract_gender(normalized: &str) -> Gender {
    let male = MALE_TERMS.iter().any(|t| contains_term(normalized, t));
    let female = FEMALE_TERMS.iter().any(|t| contains_term(normalized, t));
    match (male, female) {
        (true, false) => Gender::Male,
        (false, true) => Gender::Female,
        _ => Gender::Unknown,
    }
}

/// Keyword-rule flags over normalized text.
pub fn is_sample(normalized: &str, config: &MatchingConfig) -> bool {
    config.sample_keywords.iter().any(|k| contains_term(normalized, k))
}

pub fn is_tester(normalized: &str, config: &MatchingConfig) -> bool {
    config.tester_keywords.iter().any(|k| contains_term(normalized, k))
}

pub fn is_set(normalized: &str, config: &MatchingConfig) -> bool {
    config.set_keywords.iter().any(|k| contains_term(normalized, k))
}

/// Substring hit whose neighbours are not alphanumeric, so "2ml" does not
/// flag "12ml" and "men" does not flag "women".
pub fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let mut search_start = 0;
    while let Some(rel) = text[search_start..].find(term) {
        let start = search_start + rel;
        let end = start + term.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        search_start = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::matching::normalize::normalize;

    fn attrs(name: &str) -> Attributes {
        let cfg = MatchingConfig::default();
        Attributes::extract(&normalize(name, &cfg.synonyms), &cfg)
    }

    #[test]
    fn brand_first_hit_wins_in_table_order() {
        let cfg = MatchingConfig::default();
        assert_eq!(extract_brand("dior sauvage edp", &cfg.brands), Some("Dior".to_string()));
        assert_eq!(extract_brand("no label here", &cfg.brands), None);
    }

    #[test]
    fn brand_is_script_insensitive_via_canonical_form() {
        assert_eq!(attrs("ديور سوفاج").brand, Some("Dior".to_string()));
        assert_eq!(attrs("Dior Sauvage").brand, Some("Dior".to_string()));
    }

    #[test]
    fn size_first_occurrence_wins() {
        assert_eq!(extract_size("sauvage 100ml refill 50ml"), 100.0);
        assert_eq!(extract_size("sauvage 7.5 ml"), 7.5);
        assert_eq!(extract_size("sauvage travel spray"), 0.0);
        assert_eq!(attrs("ديور سوفاج 90 مل").size_ml, 90.0);
    }

    #[test]
    fn concentration_priority_order() {
        assert_eq!(attrs("Roja Elysium Parfum Extrait de Parfum").concentration, ConcentrationType::Extrait);
        assert_eq!(attrs("Dior Sauvage Eau de Parfum").concentration, ConcentrationType::Edp);
        assert_eq!(attrs("Dior Sauvage EDT").concentration, ConcentrationType::Edt);
        assert_eq!(attrs("4711 Cologne").concentration, ConcentrationType::Edc);
        assert_eq!(attrs("Dior Sauvage").concentration, ConcentrationType::Unknown);
    }

    #[test]
    fn gender_never_guesses() {
        assert_eq!(attrs("Bleu for Men").gender, Gender::Male);
        assert_eq!(attrs("Chance for Women").gender, Gender::Female);
        // "women" must not trip the male vocabulary via its "men" suffix.
        assert_eq!(attrs("Chance women edition").gender, Gender::Female);
        assert_eq!(attrs("Unisex Oud").gender, Gender::Unknown);
        assert_eq!(attrs("for men and women").gender, Gender::Unknown);
    }

    #[test]
    fn sample_keywords_respect_term_boundaries() {
        let cfg = MatchingConfig::default();
        assert!(is_sample("sample dior sauvage 2ml", &cfg));
        assert!(is_sample(&normalize("عينة ديور سوفاج", &cfg.synonyms), &cfg));
        // A 12ml bottle is not a "2ml" sample.
        assert!(!is_sample("dior sauvage 12ml", &cfg));
    }

    #[test]
    fn tester_and_set_flags() {
        let cfg = MatchingConfig::default();
        assert!(is_tester("dior sauvage tester 100ml", &cfg));
        assert!(is_set("chanel bleu gift set", &cfg));
        assert!(!is_set("chanel bleu sunset edition", &cfg));
    }
}
