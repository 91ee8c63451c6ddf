//! Identity matcher: scores a candidate against stored offers using weighted
//! normalized-string similarity.
//!
//! Identity is established by a score crossing the category's threshold, never
//! by exact key equality, because the upstream extraction re-derives every
//! field from free text on each run.

pub mod profiles;

pub use profiles::{MatchProfiles, WeightProfile};

use strsim::normalized_levenshtein;

use crate::model::{CandidateOffer, MatchResult, StoredOffer};

/// Weighted similarity in [0, 100].
///
/// Missing fields degrade gracefully: a field empty on both sides is excluded
/// and the remaining weights renormalized, so a sparse candidate still scores
/// on the fields it does carry.
pub fn score(candidate: &CandidateOffer, stored: &StoredOffer, profile: &WeightProfile) -> f64 {
    let name_sim = field_sim(&candidate.merchant_name, &stored.merchant_name);
    let Some(name_sim) = name_sim else {
        return 0.0;
    };

    let mut gate_others = true;
    if profile.branch_sensitive {
        let base_c = split_branch(&candidate.merchant_name).0;
        let base_s = split_branch(&stored.merchant_name).0;
        gate_others = similarity(base_c, base_s) >= profile.base_name_floor;
    }

    let mut weighted = name_sim * profile.name_weight;
    let mut total_weight = profile.name_weight;
    if gate_others {
        for (sim, weight) in [
            (
                field_sim(&candidate.merchant_address, &stored.merchant_address),
                profile.address_weight,
            ),
            (
                field_sim(&candidate.merchant_location, &stored.merchant_location),
                profile.location_weight,
            ),
            (
                field_sim(&candidate.category_name, &stored.category_name),
                profile.category_weight,
            ),
        ] {
            if let Some(sim) = sim {
                weighted += sim * weight;
                total_weight += weight;
            }
        }
    }
    let mut score = weighted / total_weight;

    if profile.branch_sensitive {
        score -= branch_penalty(candidate, stored, profile);
    }
    score.clamp(0.0, 100.0)
}

/// Linear scan over the stored pool; ties keep the earliest-created offer
/// (the pool arrives ordered by creation) for determinism.
pub fn find_best_match(
    candidate: &CandidateOffer,
    pool: &[StoredOffer],
    profile: &WeightProfile,
) -> MatchResult {
    let mut best: Option<&StoredOffer> = None;
    let mut best_score = 0.0;
    for stored in pool {
        let s = score(candidate, stored, profile);
        if s > best_score {
            best_score = s;
            best = Some(stored);
        }
    }
    MatchResult {
        stored: best.cloned(),
        score: best_score,
    }
}

/// Splits a trailing numeric branch suffix off a merchant name:
/// `"Petromax - Capiata 1"` → `("Petromax - Capiata", Some(1))`.
fn split_branch(name: &str) -> (&str, Option<u32>) {
    let trimmed = name.trim_end();
    if let Some((base, last)) = trimmed.rsplit_once(' ')
        && let Ok(branch) = last.parse::<u32>()
    {
        return (base.trim_end_matches(['-', ' ']), Some(branch));
    }
    (trimmed, None)
}

/// Explicit penalty so distinct branches of the same brand are never merged:
/// fires when both records carry numeric branch suffixes that differ, or both
/// resolved locations are present and differ.
fn branch_penalty(candidate: &CandidateOffer, stored: &StoredOffer, profile: &WeightProfile) -> f64 {
    let mut penalty = 0.0;
    let (_, branch_c) = split_branch(&candidate.merchant_name);
    let (_, branch_s) = split_branch(&stored.merchant_name);
    if let (Some(a), Some(b)) = (branch_c, branch_s)
        && a != b
    {
        penalty += profile.branch_penalty;
    }
    if !candidate.merchant_location.is_empty()
        && !stored.merchant_location.is_empty()
        && candidate.merchant_location != stored.merchant_location
    {
        penalty += profile.branch_penalty;
    }
    penalty
}

fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

fn field_sim(a: &str, b: &str) -> Option<f64> {
    if a.is_empty() && b.is_empty() {
        None
    } else if a.is_empty() || b.is_empty() {
        Some(0.0)
    } else {
        Some(similarity(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(name: &str, address: &str, location: &str) -> StoredOffer {
        StoredOffer {
            id: 1,
            bank_name: "Banco Continental".into(),
            category_name: String::new(),
            merchant_name: name.into(),
            merchant_address: address.into(),
            merchant_location: location.into(),
            valid_from: None,
            valid_to: None,
            offer_day: Default::default(),
            benefits: Default::default(),
            card_brands: Default::default(),
            payment_methods: String::new(),
            terms_raw: String::new(),
            terms_conditions: String::new(),
            source_file: String::new(),
            offer_url: String::new(),
            logo_url: String::new(),
            status: "active".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn candidate(name: &str, address: &str, location: &str) -> CandidateOffer {
        CandidateOffer {
            bank_name: "Banco Continental".into(),
            merchant_name: name.into(),
            merchant_address: address.into(),
            merchant_location: location.into(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_records_score_100() {
        let c = candidate("Super Seis", "Av. Espana 123", "Asuncion");
        let s = stored("Super Seis", "Av. Espana 123", "Asuncion");
        let got = score(&c, &s, &WeightProfile::default());
        assert!((got - 100.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn score_is_monotone_in_field_matches() {
        let profile = WeightProfile::default();
        let c = candidate("Super Seis", "Av. Espana 123", "Asuncion");
        let partial = score(&c, &stored("Super Seis", "Otra Calle 99", "Luque"), &profile);
        let address_fixed = score(&c, &stored("Super Seis", "Av. Espana 123", "Luque"), &profile);
        let all_fixed = score(&c, &stored("Super Seis", "Av. Espana 123", "Asuncion"), &profile);
        assert!(address_fixed >= partial);
        assert!(all_fixed >= address_fixed);
    }

    #[test]
    fn differing_branches_fall_below_threshold() {
        let profile = WeightProfile::branch_sensitive_default();
        let c = candidate("Petromax - Capiata 1", "", "");
        let s = stored("Petromax - Capiata 2", "", "");
        let got = score(&c, &s, &profile);
        assert!(got < profile.threshold, "got {got}");
    }

    #[test]
    fn same_branch_passes_strict_threshold() {
        let profile = WeightProfile::branch_sensitive_default();
        let c = candidate("Petromax - Capiata 1", "Ruta 2 Km 20", "Capiata");
        let s = stored("Petromax - Capiata 1", "Ruta 2 Km 20", "Capiata");
        assert!(score(&c, &s, &profile) >= profile.threshold);
    }

    #[test]
    fn unrelated_base_names_do_not_borrow_from_shared_address() {
        let profile = WeightProfile::branch_sensitive_default();
        let c = candidate("Petromax - Capiata 1", "Ruta 2 Km 20", "Capiata");
        let s = stored("Puma Energy - Capiata", "Ruta 2 Km 20", "Capiata");
        assert!(score(&c, &s, &profile) < profile.threshold);
    }

    #[test]
    fn differing_locations_are_penalized_when_branch_sensitive() {
        let profile = WeightProfile::branch_sensitive_default();
        let c = candidate("Stock", "", "Asuncion");
        let s = stored("Stock", "", "San Lorenzo");
        assert!(score(&c, &s, &profile) < profile.threshold);
    }

    #[test]
    fn best_match_keeps_earliest_on_tie() {
        let c = candidate("Super Seis", "", "");
        let mut first = stored("Super Seis", "", "");
        first.id = 1;
        let mut second = stored("Super Seis", "", "");
        second.id = 2;
        let result = find_best_match(&c, &[first, second], &WeightProfile::default());
        assert_eq!(result.stored.map(|s| s.id), Some(1));
        assert!((result.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_pool_yields_no_match() {
        let result = find_best_match(
            &candidate("Super Seis", "", ""),
            &[],
            &WeightProfile::default(),
        );
        assert!(result.stored.is_none());
        assert_eq!(result.score, 0.0);
    }
}
