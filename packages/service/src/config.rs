//! Service configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use risk_index_engine::FamilyRegistry;
use risk_index_engine::interpretation::DEFAULT_GENERATION_TIMEOUT;
use risk_index_models::FamilyId;

/// Environment variable listing enabled family ids, comma separated.
pub const FAMILIES_ENV: &str = "RISK_INDEX_FAMILIES";

/// Environment variable overriding the generator timeout, in seconds.
pub const GENERATION_TIMEOUT_ENV: &str = "RISK_INDEX_GENERATION_TIMEOUT_SECS";

/// Explicit per-run configuration handed to [`crate::IndexService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Families the service may compute. `None` enables every family.
    pub enabled_families: Option<BTreeSet<FamilyId>>,
    /// Budget for one interpretation generator call.
    pub generation_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled_families: None,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }
}

fn parse_family_list(list: &str) -> BTreeSet<FamilyId> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(FamilyId::from)
        .collect()
}

impl ServiceConfig {
    /// Builds a config from a CLI family filter, falling back to
    /// `RISK_INDEX_FAMILIES`. With neither set every family is enabled.
    #[must_use]
    pub fn from_env(cli_filter: Option<String>) -> Self {
        let enabled_families = cli_filter
            .or_else(|| std::env::var(FAMILIES_ENV).ok())
            .map(|list| parse_family_list(&list));

        let generation_timeout = std::env::var(GENERATION_TIMEOUT_ENV)
            .ok()
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map_or(DEFAULT_GENERATION_TIMEOUT, Duration::from_secs);

        Self {
            enabled_families,
            generation_timeout,
        }
    }

    /// Enables only the listed families.
    #[must_use]
    pub fn with_enabled<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_families = Some(ids.into_iter().map(FamilyId::new).collect());
        self
    }

    #[must_use]
    pub fn is_enabled(&self, family: &FamilyId) -> bool {
        self.enabled_families
            .as_ref()
            .is_none_or(|enabled| enabled.contains(family))
    }

    /// Logs enabled ids the registry does not know.
    pub fn warn_unknown(&self, registry: &FamilyRegistry) {
        let Some(enabled) = &self.enabled_families else {
            return;
        };

        let unknown: Vec<&str> = enabled
            .iter()
            .map(FamilyId::as_str)
            .filter(|id| registry.get(id).is_none())
            .collect();

        if !unknown.is_empty() {
            log::warn!(
                "Ignoring unknown families {unknown:?}. Available: {}",
                registry
                    .families()
                    .map(|f| f.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_family_list_trims_and_skips_blanks() {
        let ids = parse_family_list(" global, europe,,market_stress ");
        let ids: Vec<&str> = ids.iter().map(FamilyId::as_str).collect();
        assert_eq!(ids, vec!["europe", "global", "market_stress"]);
    }

    #[test]
    fn default_enables_everything() {
        let config = ServiceConfig::default();
        assert!(config.is_enabled(&FamilyId::new("anything")));
        assert_eq!(config.generation_timeout, DEFAULT_GENERATION_TIMEOUT);
    }

    #[test]
    fn explicit_list_restricts_families() {
        let config = ServiceConfig::default().with_enabled(["global"]);
        assert!(config.is_enabled(&FamilyId::new("global")));
        assert!(!config.is_enabled(&FamilyId::new("europe")));
    }

    #[test]
    fn cli_filter_wins_over_environment() {
        let config = ServiceConfig::from_env(Some("europe".to_string()));
        assert!(config.is_enabled(&FamilyId::new("europe")));
        assert!(!config.is_enabled(&FamilyId::new("global")));
    }
}
