//! Upsert controller: the state machine deciding insert/update/skip for each
//! candidate and applying the result to the store.
//!
//! Per candidate: NORMALIZED → {MATCHED, UNMATCHED} → {UPDATED, INSERTED,
//! NO_CHANGE, SKIPPED_DUPLICATE_IN_SESSION, FAILED}. A persistence failure is
//! local: the transaction rolls back, the candidate is logged, the batch
//! continues.

use chrono::Utc;
use tracing::{info, warn};

use crate::extractor::merge_sets;
use crate::matcher::{self, MatchProfiles};
use crate::model::{CandidateOffer, StorageError, StoredOffer};
use crate::normalizer::normalize_candidate;
use crate::session::SessionGuard;
use crate::storage::SqliteStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    NoChange,
    SkippedDuplicateInSession,
    Failed,
}

/// Per-batch outcome counts; no candidate's outcome is silently dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
    pub no_change: usize,
    pub skipped_duplicate: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::NoChange => self.no_change += 1,
            UpsertOutcome::SkippedDuplicateInSession => self.skipped_duplicate += 1,
            UpsertOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.no_change + self.skipped_duplicate + self.failed
    }
}

pub struct ReconEngine {
    storage: SqliteStorage,
    profiles: MatchProfiles,
    session: SessionGuard,
}

impl ReconEngine {
    pub fn new(storage: SqliteStorage, profiles: MatchProfiles) -> Self {
        Self {
            storage,
            profiles,
            session: SessionGuard::new(),
        }
    }

    /// Processes one batch in arrival order, fully reconciling each candidate
    /// before the next. Session state is fresh per batch.
    pub fn run_batch(&mut self, candidates: &[CandidateOffer]) -> BatchSummary {
        self.session = SessionGuard::new();
        let mut summary = BatchSummary::default();
        for raw in candidates {
            summary.record(self.process(raw));
        }
        info!(
            "Batch finished: {} inserted, {} updated, {} unchanged, {} skipped (session), {} failed ({} stored offers touched)",
            summary.inserted,
            summary.updated,
            summary.no_change,
            summary.skipped_duplicate,
            summary.failed,
            self.session.touched_count()
        );
        summary
    }

    /// Reconciles a single candidate. Never panics and never aborts the batch:
    /// a store error downgrades to `Failed` for this candidate only.
    pub fn process(&mut self, raw: &CandidateOffer) -> UpsertOutcome {
        let candidate = normalize_candidate(raw);
        match self.reconcile(&candidate) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Persistence failure for '{} - {}': {}",
                    candidate.merchant_name, candidate.merchant_location, e
                );
                UpsertOutcome::Failed
            }
        }
    }

    fn reconcile(&mut self, candidate: &CandidateOffer) -> Result<UpsertOutcome, StorageError> {
        let pool = self.storage.offers_for_bank(&candidate.bank_name)?;
        let profile = self.profiles.profile_for(&candidate.category_name);
        let result = matcher::find_best_match(candidate, &pool, profile);

        match result.stored {
            Some(stored) if result.score >= profile.threshold => {
                if !self.session.register(stored.id) {
                    info!(
                        "Skipping '{}': stored offer {} already touched this run",
                        candidate.merchant_name, stored.id
                    );
                    return Ok(UpsertOutcome::SkippedDuplicateInSession);
                }
                match diff_and_merge(&stored, candidate) {
                    Some((updated, changed)) => {
                        self.storage.update_offer(&updated)?;
                        info!(
                            "Updated offer {} '{}' (score {:.1}, changed: {:?})",
                            updated.id, updated.merchant_name, result.score, changed
                        );
                        Ok(UpsertOutcome::Updated)
                    }
                    None => Ok(UpsertOutcome::NoChange),
                }
            }
            _ => {
                let id = self.storage.insert_offer(candidate, Utc::now())?;
                // An insert counts as touching the row: a later candidate in
                // this batch resolving to it is a session duplicate.
                self.session.register(id);
                info!(
                    "Inserted offer {} '{}' (best score {:.1})",
                    id, candidate.merchant_name, result.score
                );
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }
}

/// Field-level diff between a matched pair. Set-valued fields grow by union
/// merge; scalar fields are replaced by the candidate's value when it carries
/// one (freshest wins). Returns `None` when nothing tracked changed.
fn diff_and_merge(
    stored: &StoredOffer,
    candidate: &CandidateOffer,
) -> Option<(StoredOffer, Vec<&'static str>)> {
    let mut updated = stored.clone();
    let mut changed = Vec::new();

    let benefits = merge_sets(&stored.benefits, &candidate.benefits);
    if benefits != stored.benefits {
        updated.benefits = benefits;
        changed.push("benefit");
    }
    let card_brands = merge_sets(&stored.card_brands, &candidate.card_brands);
    if card_brands != stored.card_brands {
        updated.card_brands = card_brands;
        changed.push("card_brand");
    }
    let offer_day = merge_sets(&stored.offer_day, &candidate.offer_day);
    if offer_day != stored.offer_day {
        updated.offer_day = offer_day;
        changed.push("offer_day");
    }

    if candidate.valid_to.is_some() && candidate.valid_to != stored.valid_to {
        updated.valid_to = candidate.valid_to;
        changed.push("valid_to");
    }
    if !candidate.payment_methods.is_empty() && candidate.payment_methods != stored.payment_methods
    {
        updated.payment_methods = candidate.payment_methods.clone();
        changed.push("payment_methods");
    }
    if !candidate.terms_conditions.is_empty()
        && candidate.terms_conditions != stored.terms_conditions
    {
        updated.terms_conditions = candidate.terms_conditions.clone();
        changed.push("terms_conditions");
    }
    if !candidate.category_name.is_empty() && candidate.category_name != stored.category_name {
        updated.category_name = candidate.category_name.clone();
        changed.push("category_name");
    }

    if changed.is_empty() {
        return None;
    }
    updated.updated_at = Utc::now();
    Some((updated, changed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn engine() -> ReconEngine {
        ReconEngine::new(SqliteStorage::open_in_memory().unwrap(), MatchProfiles::default())
    }

    fn candidate(name: &str, address: &str, location: &str) -> CandidateOffer {
        CandidateOffer {
            bank_name: "Banco Continental".into(),
            category_name: "Gastronomía".into(),
            merchant_name: name.into(),
            merchant_address: address.into(),
            merchant_location: location.into(),
            benefits: ["10% de descuento".to_string()].into(),
            ..Default::default()
        }
    }

    #[test]
    fn identical_candidate_is_no_change_on_second_run() {
        let mut engine = engine();
        let c = candidate("Super Seis", "Av. España 123", "Asunción");

        let first = engine.run_batch(std::slice::from_ref(&c));
        assert_eq!(first.inserted, 1);

        let second = engine.run_batch(std::slice::from_ref(&c));
        assert_eq!(second.no_change, 1);
        assert_eq!(engine.storage().count_offers().unwrap(), 1);
    }

    #[test]
    fn textual_drift_does_not_duplicate() {
        let mut engine = engine();
        engine.run_batch(&[candidate("Super Seis", "Av. España 123", "Asunción")]);
        // Same merchant, re-derived with different casing and accents.
        let drifted = candidate("SÚPER  SEIS", "Av. Espana 123", "ASUNCIÓN");
        let summary = engine.run_batch(&[drifted]);
        assert_eq!(summary.inserted, 0);
        assert_eq!(engine.storage().count_offers().unwrap(), 1);
    }

    #[test]
    fn benefits_merge_instead_of_overwriting() {
        let mut engine = engine();
        let mut seed = candidate("La Cabrera", "Av. Mariscal López", "Asunción");
        seed.benefits = ["20% de reintegro".to_string()].into();
        engine.run_batch(&[seed]);

        let mut update = candidate("La Cabrera", "Av. Mariscal López", "Asunción");
        update.benefits = ["10% de descuento".to_string()].into();
        let summary = engine.run_batch(&[update]);
        assert_eq!(summary.updated, 1);

        let stored = &engine.storage().offers_for_bank("Banco Continental").unwrap()[0];
        assert!(stored.benefits.contains("10% de descuento"));
        assert!(stored.benefits.contains("20% de reintegro"));
    }

    #[test]
    fn distinct_branches_insert_under_branch_sensitive_profile() {
        let mut engine = engine();
        let mut first = candidate("Petromax - Capiatá 2", "", "");
        first.category_name = "Estaciones de Servicio".into();
        engine.run_batch(&[first]);

        let mut second = candidate("Petromax - Capiatá 1", "", "");
        second.category_name = "Estaciones de Servicio".into();
        let summary = engine.run_batch(&[second]);
        assert_eq!(summary.inserted, 1, "distinct branches must never merge");
        assert_eq!(engine.storage().count_offers().unwrap(), 2);
    }

    #[test]
    fn second_candidate_for_same_offer_is_skipped_in_session() {
        let mut engine = engine();
        engine.run_batch(&[candidate("Super Seis", "Av. España 123", "Asunción")]);

        let mut a = candidate("Super Seis", "Av. España 123", "Asunción");
        a.benefits = ["15% de descuento".to_string()].into();
        let mut b = candidate("Super Seis", "Av. España 123", "Asunción");
        b.benefits = ["5% de reintegro".to_string()].into();
        let summary = engine.run_batch(&[a, b]);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped_duplicate, 1);

        // The first candidate's contribution survives.
        let stored = &engine.storage().offers_for_bank("Banco Continental").unwrap()[0];
        assert!(stored.benefits.contains("15% de descuento"));
        assert!(!stored.benefits.contains("5% de reintegro"));
    }

    #[test]
    fn scalar_valid_to_is_freshest_wins() {
        let mut engine = engine();
        let mut seed = candidate("Super Seis", "Av. España 123", "Asunción");
        seed.valid_to = NaiveDate::from_ymd_opt(2025, 10, 24);
        engine.run_batch(&[seed]);

        let mut fresher = candidate("Super Seis", "Av. España 123", "Asunción");
        fresher.valid_to = NaiveDate::from_ymd_opt(2025, 12, 31);
        let summary = engine.run_batch(&[fresher]);
        assert_eq!(summary.updated, 1);

        let stored = &engine.storage().offers_for_bank("Banco Continental").unwrap()[0];
        assert_eq!(stored.valid_to, NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn separator_laden_benefit_stays_stable_across_runs() {
        let mut engine = engine();
        let mut c = candidate("Cinemark", "Shopping del Sol", "Asunción");
        c.benefits = ["2x1 en entradas; válido solo los lunes".to_string()].into();

        let first = engine.run_batch(std::slice::from_ref(&c));
        assert_eq!(first.inserted, 1);

        let second = engine.run_batch(std::slice::from_ref(&c));
        assert_eq!(second.updated, 0);
        assert_eq!(second.no_change, 1);

        let stored = &engine.storage().offers_for_bank("Banco Continental").unwrap()[0];
        assert!(stored.benefits.contains("2x1 en entradas"));
        assert!(stored.benefits.contains("válido solo los lunes"));
    }

    #[test]
    fn batch_is_idempotent_across_runs() {
        let mut engine = engine();
        let batch = vec![
            candidate("Super Seis", "Av. España 123", "Asunción"),
            candidate("La Cabrera", "Av. Mariscal López", "Asunción"),
            candidate("Farmacenter", "España c/ Brasil", "San Lorenzo"),
        ];

        let first = engine.run_batch(&batch);
        assert_eq!(first.inserted, 3);
        let count_after_first = engine.storage().count_offers().unwrap();

        let second = engine.run_batch(&batch);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.no_change + second.skipped_duplicate, batch.len());
        assert_eq!(engine.storage().count_offers().unwrap(), count_after_first);
    }

    #[test]
    fn sparse_candidate_still_reconciles() {
        let mut engine = engine();
        engine.run_batch(&[candidate("Super Seis", "Av. España 123", "Asunción")]);

        // Upstream extraction failure: only the name survived.
        let sparse = CandidateOffer {
            bank_name: "Banco Continental".into(),
            merchant_name: "Super Seis".into(),
            ..Default::default()
        };
        let summary = engine.run_batch(&[sparse]);
        assert_eq!(summary.failed, 0);
        assert_eq!(engine.storage().count_offers().unwrap(), 1);
    }
}
