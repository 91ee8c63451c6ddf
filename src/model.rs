// Core structs: CandidateOffer, StoredOffer, MatchResult
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

use crate::utils::parse_date;

/// A freshly extracted, not-yet-persisted promotional-offer record.
///
/// Produced upstream by the scraping + AI extraction stage; field contents are
/// noisy (stray punctuation, inconsistent casing, multi-line text) until the
/// candidate passes through the normalizer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateOffer {
    #[serde(default)]
    pub bank_name: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default, alias = "merchant")]
    pub merchant_name: String,
    #[serde(default, alias = "address")]
    pub merchant_address: String,
    #[serde(default, alias = "location")]
    pub merchant_location: String,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub valid_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub valid_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_string_or_seq")]
    pub offer_day: BTreeSet<String>,
    #[serde(default, alias = "benefit", deserialize_with = "de_clause_string_or_seq")]
    pub benefits: BTreeSet<String>,
    #[serde(default, alias = "card_brand", deserialize_with = "de_string_or_seq")]
    pub card_brands: BTreeSet<String>,
    #[serde(default, alias = "payment_method")]
    pub payment_methods: String,
    #[serde(default)]
    pub terms_raw: String,
    #[serde(default)]
    pub terms_conditions: String,
    #[serde(default, alias = "pdf_file")]
    pub source_file: String,
    #[serde(default, alias = "url")]
    pub offer_url: String,
    #[serde(default, alias = "merchant_logo_url")]
    pub logo_url: String,
}

/// The persisted row representing a previously reconciled offer.
/// Mutated only by the upsert controller.
#[derive(Debug, Clone)]
pub struct StoredOffer {
    pub id: i64,
    pub bank_name: String,
    pub category_name: String,
    pub merchant_name: String,
    pub merchant_address: String,
    pub merchant_location: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub offer_day: BTreeSet<String>,
    pub benefits: BTreeSet<String>,
    pub card_brands: BTreeSet<String>,
    pub payment_methods: String,
    pub terms_raw: String,
    pub terms_conditions: String,
    pub source_file: String,
    pub offer_url: String,
    pub logo_url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Best stored match for one candidate, or none.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub stored: Option<StoredOffer>,
    pub score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read candidate input: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode candidate input: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The AI stage sometimes returns `benefit`/`offer_day`/`card_brand` as a
/// single delimited string and sometimes as a list. Accept both.
fn de_string_or_seq<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    split_string_or_seq(deserializer, &[',', ';'])
}

/// Benefit phrasings legitimately contain commas ("3, 6 y 12 cuotas sin
/// intereses"), so single-string benefits split on `;` only.
fn de_clause_string_or_seq<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    split_string_or_seq(deserializer, &[';'])
}

fn split_string_or_seq<'de, D>(
    deserializer: D,
    separators: &[char],
) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    let raw = Option::<StringOrSeq>::deserialize(deserializer)?;
    let items = match raw {
        None => Vec::new(),
        Some(StringOrSeq::One(s)) => s.split(separators).map(str::to_string).collect(),
        Some(StringOrSeq::Many(v)) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}
