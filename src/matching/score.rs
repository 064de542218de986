// src/matching/score.rs - Composite similarity scoring
//
// Three string measures over normalized text, each in [0, 100]: token-sort
// (order-invariant), token-set (set-overlap) and partial (substring
// window). The composite is a fixed-weight linear blend, so improving any
// one component never lowers the total. Attribute adjustments are applied
// additively afterwards and the result is clamped to [0, 100].
use strsim::normalized_levenshtein;

use crate::config::MatchingConfig;
use crate::models::core::Attributes;

/// Order-invariant similarity: compare the sorted-token joins.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 100.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    100.0 * normalized_levenshtein(&sorted_join(a), &sorted_join(b))
}

/// Set-overlap similarity in the fuzzywuzzy style: the shared-token core is
/// compared against each side's remainder-extended form, and the best of
/// the three comparisons wins.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 100.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let tokens_a: Vec<&str> = {
        let mut t: Vec<&str> = a.split_whitespace().collect();
        t.sort_unstable();
        t.dedup();
        t
    };
    let tokens_b: Vec<&str> = {
        let mut t: Vec<&str> = b.split_whitespace().collect();
        t.sort_unstable();
        t.dedup();
        t
    };

    let shared: Vec<&str> = tokens_a.iter().filter(|t| tokens_b.contains(t)).copied().collect();
    let only_a: Vec<&str> = tokens_a.iter().filter(|t| !tokens_b.contains(t)).copied().collect();
    let only_b: Vec<&str> = tokens_b.iter().filter(|t| !tokens_a.contains(t)).copied().collect();

    let core = shared.join(" ");
    let left = join_nonempty(&core, &only_a.join(" "));
    let right = join_nonempty(&core, &only_b.join(" "));

    let mut best = normalized_levenshtein(&left, &right);
    if !core.is_empty() {
        best = best
            .max(normalized_levenshtein(&core, &left))
            .max(normalized_levenshtein(&core, &right));
    }
    100.0 * best
}

/// Best alignment of the shorter string against a same-length character
/// window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 100.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    let needle: String = short.iter().collect();
    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        let hay: String = window.iter().collect();
        let sim = normalized_levenshtein(&needle, &hay);
        if sim > best {
            best = sim;
        }
        if best >= 1.0 {
            break;
        }
    }
    100.0 * best
}

/// Blend the three measures, then apply attribute bonuses and penalties.
/// String similarity alone cannot tell "same fragrance, different bottle"
/// from "different fragrance"; the attribute terms encode that cheaply.
pub fn composite_score(
    our_normalized: &str,
    candidate_normalized: &str,
    our_attrs: &Attributes,
    candidate_attrs: &Attributes,
    config: &MatchingConfig,
) -> f64 {
    if our_normalized.is_empty() || candidate_normalized.is_empty() {
        return 0.0;
    }

    let base = config.weight_token_sort * token_sort_ratio(our_normalized, candidate_normalized)
        + config.weight_token_set * token_set_ratio(our_normalized, candidate_normalized)
        + config.weight_partial * partial_ratio(our_normalized, candidate_normalized);

    let mut score = base;

    if let (Some(b1), Some(b2)) = (&our_attrs.brand, &candidate_attrs.brand) {
        if b1.eq_ignore_ascii_case(b2) {
            score += config.brand_bonus;
        } else {
            score -= config.brand_penalty;
        }
    }

    if our_attrs.has_size() && candidate_attrs.has_size() {
        let gap = (our_attrs.size_ml - candidate_attrs.size_ml).abs();
        if gap == 0.0 {
            score += config.size_equal_bonus;
        } else if gap <= config.size_tolerance_ml {
            score += config.size_close_bonus;
        } else {
            let penalty = (gap - config.size_tolerance_ml) * config.size_gap_penalty_per_ml;
            score -= penalty.min(config.size_gap_penalty_cap);
        }
    }

    if our_attrs.concentration.is_known()
        && candidate_attrs.concentration.is_known()
        && our_attrs.concentration != candidate_attrs.concentration
    {
        score -= config.concentration_penalty;
    }

    if our_attrs.gender.is_known()
        && candidate_attrs.gender.is_known()
        && our_attrs.gender != candidate_attrs.gender
    {
        score -= config.gender_penalty;
    }

    score.clamp(0.0, 100.0)
}

fn sorted_join(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(core: &str, rest: &str) -> String {
    match (core.is_empty(), rest.is_empty()) {
        (false, false) => format!("{} {}", core, rest),
        (false, true) => core.to_string(),
        (true, _) => rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchingConfig;
    use crate::matching::normalize::normalize;

    fn scored(a: &str, b: &str) -> f64 {
        let cfg = MatchingConfig::default();
        let na = normalize(a, &cfg.synonyms);
        let nb = normalize(b, &cfg.synonyms);
        let aa = Attributes::extract(&na, &cfg);
        let ab = Attributes::extract(&nb, &cfg);
        composite_score(&na, &nb, &aa, &ab, &cfg)
    }

    #[test]
    fn token_sort_is_order_invariant() {
        let a = token_sort_ratio("sauvage dior edp", "dior sauvage edp");
        assert!(a > 99.9, "got {}", a);
    }

    #[test]
    fn token_set_forgives_extra_tokens() {
        let s = token_set_ratio("dior sauvage", "dior sauvage edp 100ml intense");
        assert!(s > 99.9, "got {}", s);
    }

    #[test]
    fn partial_finds_substrings() {
        let s = partial_ratio("sauvage", "dior sauvage parfum");
        assert!(s > 99.9, "got {}", s);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(scored("", "dior sauvage"), 0.0);
        assert_eq!(token_sort_ratio("", ""), 100.0);
    }

    #[test]
    fn identical_products_hit_the_ceiling() {
        assert_eq!(scored("Dior Sauvage EDP 100ml", "Dior Sauvage EDP 100ml"), 100.0);
    }

    #[test]
    fn brand_guard_materially_lowers_conflicting_brands() {
        let ours = "Dior Sauvage EDP 100ml";
        let mismatched = scored(ours, "Chanel Sauvage EDP 100ml");
        let matched = scored(ours, "Dior Sauvage EDP 100ml");
        assert!(
            mismatched < matched - 10.0,
            "mismatched {} vs matched {}",
            mismatched,
            matched
        );
    }

    #[test]
    fn size_gap_penalty_scales_with_gap() {
        let close = scored("Dior Sauvage EDP 100ml", "Dior Sauvage EDP 97ml");
        let far = scored("Dior Sauvage EDP 100ml", "Dior Sauvage EDP 75ml");
        assert!(far < close, "far {} close {}", far, close);
    }

    #[test]
    fn gender_conflict_penalized() {
        let conflicting = scored("Armani Code for Men", "Armani Code for Women");
        let aligned = scored("Armani Code for Men", "Armani Code for Men");
        assert!(conflicting < aligned - 10.0);
    }

    #[test]
    fn composite_is_monotonic_in_each_component() {
        // Raising one component (holding attributes fixed) may not lower the
        // blend: linear weights guarantee it, spot-check by construction.
        let cfg = MatchingConfig::default();
        let attrs = Attributes::default();
        let worse = composite_score("dior sauvage edp", "chanel bleu edt", &attrs, &attrs, &cfg);
        let better = composite_score("dior sauvage edp", "dior sauvage edt", &attrs, &attrs, &cfg);
        assert!(better > worse);
    }
}
