//! Weight profiles: configuration data mapping a category to the similarity
//! weights, threshold and branch penalties used when scoring candidates.

use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeightProfile {
    pub name_weight: f64,
    pub address_weight: f64,
    pub location_weight: f64,
    pub category_weight: f64,
    /// Minimum score accepted as "same real-world offer".
    pub threshold: f64,
    /// When set, other fields only contribute once the base names (merchant
    /// name minus a trailing numeric branch suffix) are a near-exact match,
    /// and differing branch suffixes/locations are penalised.
    pub branch_sensitive: bool,
    pub base_name_floor: f64,
    pub branch_penalty: f64,
}

impl Default for WeightProfile {
    fn default() -> Self {
        Self {
            name_weight: 0.6,
            address_weight: 0.2,
            location_weight: 0.12,
            category_weight: 0.08,
            threshold: 50.0,
            branch_sensitive: false,
            base_name_floor: 90.0,
            branch_penalty: 40.0,
        }
    }
}

impl WeightProfile {
    pub fn branch_sensitive_default() -> Self {
        Self {
            threshold: 70.0,
            branch_sensitive: true,
            ..Self::default()
        }
    }
}

/// Category → profile mapping, loaded once from configuration.
///
/// Categories whose merchants share a brand name across physically distinct
/// outlets (fuel stations, supermarket chains) get the stricter profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchProfiles {
    pub default: WeightProfile,
    pub branch_sensitive: WeightProfile,
    pub branch_sensitive_categories: BTreeSet<String>,
}

impl Default for MatchProfiles {
    fn default() -> Self {
        Self {
            default: WeightProfile::default(),
            branch_sensitive: WeightProfile::branch_sensitive_default(),
            branch_sensitive_categories: ["estaciones de servicio", "supermercados"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl MatchProfiles {
    pub fn profile_for(&self, category_name: &str) -> &WeightProfile {
        let key = category_name.trim().to_lowercase();
        if self.branch_sensitive_categories.contains(&key) {
            &self.branch_sensitive
        } else {
            &self.default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_selects_profile() {
        let profiles = MatchProfiles::default();
        assert!(profiles.profile_for("Supermercados").branch_sensitive);
        assert!(profiles.profile_for("ESTACIONES DE SERVICIO").branch_sensitive);
        assert!(!profiles.profile_for("Gastronomía").branch_sensitive);
        assert_eq!(profiles.profile_for("Gastronomía").threshold, 50.0);
        assert_eq!(profiles.profile_for("Supermercados").threshold, 70.0);
    }
}
