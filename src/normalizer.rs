//! Canonicalizes free text for comparison.
//!
//! Extraction output drifts run to run ("SUPER  SEIS", "Súper Seis – Asunción",
//! "super seis"); every field that participates in identity matching goes
//! through [`normalize`] first so the matcher only ever compares canonical
//! spellings.

use crate::extractor;
use crate::model::CandidateOffer;

/// Canonical form of a piece of free text: trimmed, diacritics stripped,
/// whitespace runs collapsed, dash variants unified, title-cased.
///
/// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    title_case(&clean_text_folded(text, true))
}

/// Light cleanup for scalar fields that are stored but not matched on
/// (terms, payment methods): trims, collapses whitespace, unifies dashes and
/// drops invisible characters, but preserves case and accents.
pub fn clean_text(text: &str) -> String {
    clean_text_folded(text, false)
}

/// Applies the normalizer and the attribute extractor to one candidate,
/// returning the canonical record the matcher and upsert controller operate on.
pub fn normalize_candidate(raw: &CandidateOffer) -> CandidateOffer {
    let mut c = raw.clone();
    c.bank_name = normalize(&c.bank_name);
    c.category_name = normalize(&c.category_name);
    c.merchant_name = normalize(&c.merchant_name);
    c.merchant_address = normalize(&c.merchant_address);
    c.merchant_location = normalize(&c.merchant_location);
    c.payment_methods = clean_text(&c.payment_methods);
    c.terms_raw = clean_text(&c.terms_raw);
    c.terms_conditions = clean_text(&c.terms_conditions);
    c.source_file = c.source_file.trim().to_string();
    c.offer_url = c.offer_url.trim().to_string();
    c.logo_url = c.logo_url.trim().to_string();

    let mut benefits = std::collections::BTreeSet::new();
    for raw_benefit in &raw.benefits {
        benefits = extractor::merge_sets(&benefits, &extractor::extract_benefits(raw_benefit));
    }
    c.benefits = benefits;

    c.offer_day = extractor::expand_offer_days(&raw.offer_day);

    // Brand tokens are stored comma-joined, so an inner comma is a separator.
    let brands: std::collections::BTreeSet<String> = raw
        .card_brands
        .iter()
        .flat_map(|b| b.split(','))
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    c.card_brands = extractor::merge_sets(&brands, &Default::default());
    if c.card_brands.is_empty() {
        let haystack = format!("{} {}", raw.terms_raw, raw.terms_conditions);
        c.card_brands = extractor::detect_card_brands(&haystack);
    }
    c
}

fn clean_text_folded(text: &str, fold: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        let ch = if fold { fold_char(ch) } else { unify_char(ch) };
        let Some(c) = ch else { continue };
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Maps dash variants to `-` and drops zero-width/invisible characters.
fn unify_char(ch: char) -> Option<char> {
    match ch {
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Some('-'),
        '\u{200b}'..='\u{200f}' | '\u{202a}'..='\u{202e}' | '\u{feff}' => None,
        c => Some(c),
    }
}

/// `unify_char` plus diacritic stripping over the Spanish accented range.
fn fold_char(ch: char) -> Option<char> {
    let c = unify_char(ch)?;
    Some(match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    })
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            for c in chars {
                out.push(c.to_ascii_lowercase());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_noisy_merchant_text() {
        assert_eq!(normalize("  SÚPER   SEIS  "), "Super Seis");
        assert_eq!(normalize("Petromax – Capiatá 1"), "Petromax - Capiata 1");
        assert_eq!(normalize("av.\nESPAÑA  123"), "Av. Espana 123");
    }

    #[test]
    fn empty_and_blank_map_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    #[test]
    fn is_idempotent() {
        for input in [
            "ASUNCIÓN",
            "  Súper—Seis \u{200b} ",
            "Estación de Servicio Ñemby",
            "ya normalizado",
            "",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn clean_text_preserves_case_and_accents() {
        assert_eq!(
            clean_text("Tarjetas  de\nCrédito – físicas"),
            "Tarjetas de Crédito - físicas"
        );
    }

    #[test]
    fn card_brand_tokens_split_on_commas() {
        let raw = CandidateOffer {
            card_brands: ["Visa, Mastercard".to_string(), "Oro".to_string()].into(),
            ..Default::default()
        };
        let c = normalize_candidate(&raw);
        let expected: std::collections::BTreeSet<String> =
            ["Visa".to_string(), "Mastercard".to_string(), "Oro".to_string()].into();
        assert_eq!(c.card_brands, expected);
    }

    #[test]
    fn normalize_candidate_canonicalizes_sets() {
        let raw = CandidateOffer {
            merchant_name: "  súper seis ".into(),
            benefits: ["Hasta 35% de descuento".to_string(), "3 cuotas sin interés".to_string()]
                .into(),
            offer_day: ["Todos los días".to_string()].into(),
            ..Default::default()
        };
        let c = normalize_candidate(&raw);
        assert_eq!(c.merchant_name, "Super Seis");
        assert!(c.benefits.contains("35% de descuento"));
        assert!(c.benefits.contains("3 cuotas sin intereses"));
        assert_eq!(c.offer_day.len(), 7);
    }
}
