//! Benefit extraction and lossless set merging.
//!
//! Benefit text arrives in endless phrasings ("Hasta 35% de descuento para
//! pagos con tarjetas de crédito, tope Gs. 300.000"). An ordered list of
//! `(pattern, canonicalizer)` rules reduces each phrasing to a canonical token
//! ("35% de descuento") after the limiting clauses are stripped, so the same
//! real-world benefit always compares equal.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::normalizer::clean_text;

struct BenefitRule {
    pattern: Regex,
    canonicalize: fn(&Captures) -> String,
}

/// Evaluated in priority order: more specific shapes first, so the generic
/// discount rule never claims the span of an "en caja" or QR variant.
static RULES: LazyLock<Vec<BenefitRule>> = LazyLock::new(|| {
    vec![
        BenefitRule {
            pattern: Regex::new(r"(?i)(\d{1,3})\s*%\s*(?:de\s+)?descuento\s+en\s+caja").unwrap(),
            canonicalize: |c| format!("{}% de descuento en caja", &c[1]),
        },
        BenefitRule {
            pattern: Regex::new(r"(?i)(\d{1,3})\s*%\s*(?:de\s+)?descuento\s+adicional\s+(?:con\s+)?QR")
                .unwrap(),
            canonicalize: |c| format!("{}% de descuento adicional QR", &c[1]),
        },
        BenefitRule {
            pattern: Regex::new(
                r"(?i)(\d{1,3})\s*%\s*(?:de\s+)?descuento\s+con\s+tarjetas?\s+f[ií]sicas?",
            )
            .unwrap(),
            canonicalize: |c| format!("{}% de descuento con tarjetas físicas", &c[1]),
        },
        BenefitRule {
            pattern: Regex::new(r"(?i)(\d{1,3})\s*%\s*de\s+descuento").unwrap(),
            canonicalize: |c| format!("{}% de descuento", &c[1]),
        },
        BenefitRule {
            pattern: Regex::new(r"(?i)(\d{1,3})\s*%\s*de\s+reintegro").unwrap(),
            canonicalize: |c| format!("{}% de reintegro", &c[1]),
        },
        BenefitRule {
            pattern: Regex::new(r"(?i)(\d{1,2})\s*cuotas?\s+sin\s+inter[eé]s(?:es)?").unwrap(),
            canonicalize: |c| format!("{} cuotas sin intereses", &c[1]),
        },
    ]
});

/// Spending caps and purchase limits that would otherwise leak into the
/// canonical token or the fallback text. Applied in order: the currency
/// amount goes first so "tope de Gs. 300.000" leaves no "300.000" behind.
static LIMIT_CLAUSES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)hasta\s+gs\.?\s*[\d.,]+[^,.;]*").unwrap(),
        Regex::new(r"(?i)\bgs\.?\s*[\d.,]+").unwrap(),
        Regex::new(r"(?i)(?:con\s+)?(?:un\s+)?tope\s+(?:de\s+)?[^,.;]*").unwrap(),
        Regex::new(r"(?i)l[ií]mite\s+(?:de\s+)?(?:compras?\s+)?[^,.;]*").unwrap(),
    ]
});

/// Reduces free benefit text to a set of canonical tokens.
///
/// Text matching none of the known shapes passes through as a lossy fallback
/// rather than being dropped, split on `;` so a token never carries the
/// store's benefit separator.
pub fn extract_benefits(raw: &str) -> BTreeSet<String> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return BTreeSet::new();
    }

    let mut stripped = cleaned.clone();
    for clause in LIMIT_CLAUSES.iter() {
        stripped = clause.replace_all(&stripped, " ").into_owned();
    }

    let mut tokens = BTreeSet::new();
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    for rule in RULES.iter() {
        for caps in rule.pattern.captures_iter(&stripped) {
            let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            if claimed.iter().any(|&(s, e)| m.0 < e && s < m.1) {
                continue;
            }
            claimed.push(m);
            tokens.insert((rule.canonicalize)(&caps));
        }
    }

    if tokens.is_empty() {
        for clause in stripped.split(';') {
            let token = clean_text(clause);
            let token = token.trim_matches([',', ';', '.', '-', ' ']);
            // Purely numeric leftovers from cap stripping are not benefits.
            if token.chars().any(char::is_alphabetic) {
                tokens.insert(token.to_string());
            }
        }
    }
    tokens
}

/// Case-insensitive union with deterministic (sorted) output.
///
/// Spellings differing only by case or inner whitespace collapse to one token;
/// the lexicographically smallest spelling is kept, which makes repeated
/// application associative and commutative.
pub fn merge_sets(existing: &BTreeSet<String>, new: &BTreeSet<String>) -> BTreeSet<String> {
    let mut by_key: BTreeMap<String, String> = BTreeMap::new();
    for token in existing.iter().chain(new.iter()) {
        let spelling = token.split_whitespace().collect::<Vec<_>>().join(" ");
        if spelling.is_empty() {
            continue;
        }
        let key = spelling.to_lowercase();
        by_key
            .entry(key)
            .and_modify(|kept| {
                if spelling < *kept {
                    *kept = spelling.clone();
                }
            })
            .or_insert(spelling);
    }
    by_key.into_values().collect()
}
