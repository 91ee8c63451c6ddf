//! Weekday expansion and card-brand detection.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const WEEKDAYS: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lunes|martes|mi[eé]rcoles|jueves|viernes|s[aá]bados?|domingos?)\b").unwrap()
});

static INCLUSIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)todos\s+los\s+d[ií]as|todo\s+el\s+d[ií]a").unwrap());

/// Brand vocabulary with canonical spellings, scanned with word boundaries so
/// e.g. "Oro" never fires inside "tesoro".
static BRANDS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bvisa\b", "Visa"),
        (r"(?i)\bmaster\s?card\b", "Mastercard"),
        (r"(?i)\bamerican\s+express\b|\bamex\b", "American Express"),
        (r"(?i)\bcl[aá]sicas?\b", "Clásica"),
        (r"(?i)\boro\b", "Oro"),
        (r"(?i)\bblack\b", "Black"),
        (r"(?i)\binfinite\b", "Infinite"),
        (r"(?i)\bprivilege\b", "Privilege"),
    ]
    .into_iter()
    .map(|(p, name)| (Regex::new(p).unwrap(), name))
    .collect()
});

/// Phrases excluding brands from an offer ("No participan las tarjetas
/// Pre-Pagas ni Cabal"); the whole clause is scrubbed before scanning.
static EXCLUSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no\s+(?:participan|aplican?|acumulan?|v[aá]lido\s+para)[^.;]*").unwrap()
});

/// Expands free weekday text into the canonical set of Spanish weekday names.
/// "Todos los días" (and variants) yields the full week.
pub fn expand_offer_days(raw: &BTreeSet<String>) -> BTreeSet<String> {
    let joined = raw.iter().cloned().collect::<Vec<_>>().join(", ");
    if INCLUSIVE_RE.is_match(&joined) {
        return WEEKDAYS.iter().map(|d| d.to_string()).collect();
    }

    let mut days = BTreeSet::new();
    for m in WEEKDAY_RE.find_iter(&joined) {
        let lower = m.as_str().to_lowercase();
        let canonical = match lower.as_str() {
            "lunes" => "Lunes",
            "martes" => "Martes",
            s if s.starts_with("mi") => "Miércoles",
            "jueves" => "Jueves",
            "viernes" => "Viernes",
            s if s.starts_with("s") => "Sábado",
            _ => "Domingo",
        };
        days.insert(canonical.to_string());
    }
    days
}

/// Scans free text for card-brand mentions, honouring exclusion phrases.
/// Used as a fallback when the extraction stage returned no brands.
pub fn detect_card_brands(text: &str) -> BTreeSet<String> {
    let scrubbed = EXCLUSION_RE.replace_all(text, " ");
    BRANDS
        .iter()
        .filter(|(pattern, _)| pattern.is_match(&scrubbed))
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expands_todos_los_dias() {
        let days = expand_offer_days(&set(&["Todos los días"]));
        assert_eq!(days.len(), 7);
        assert!(days.contains("Miércoles"));
    }

    #[test]
    fn canonicalizes_unaccented_weekdays() {
        let days = expand_offer_days(&set(&["todos los miercoles y sabados"]));
        assert_eq!(days, set(&["Miércoles", "Sábado"]));
    }

    #[test]
    fn empty_days_stay_empty() {
        assert!(expand_offer_days(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn detects_brands_with_word_boundaries() {
        let brands =
            detect_card_brands("Válido con tarjetas Mastercard Oro y Black del tesoro nacional");
        assert_eq!(brands, set(&["Black", "Mastercard", "Oro"]));
    }

    #[test]
    fn excluded_brands_are_skipped() {
        let brands = detect_card_brands(
            "Aplica a tarjetas Visa. No participan las tarjetas Mastercard ni American Express.",
        );
        assert_eq!(brands, set(&["Visa"]));
    }
}
