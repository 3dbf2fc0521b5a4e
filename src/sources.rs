//! Ordered source registry.
//!
//! Priority is the position in the configured list. Disabled sources are
//! skipped during acquisition but keep their slot, so "source 3 of 5" always
//! refers to the same configured entry regardless of which ones are enabled.

use crate::config::{ID_PLACEHOLDER, SourceConfig};
use crate::types::ItemId;

/// A configured source together with its position in the list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSpec {
    /// 1-based position in the configured list
    pub position: usize,
    /// Source name
    pub name: String,
    /// URL template containing `{id}`
    pub url_template: String,
    /// Status meaning "payload follows"
    pub success_code: u16,
    /// Status meaning "not available here"
    pub unavailable_code: u16,
    /// Whether the source takes part in acquisition
    pub enabled: bool,
}

impl SourceSpec {
    /// Build the request URL for an item
    pub fn url_for(&self, id: ItemId) -> String {
        self.url_template
            .replace(ID_PLACEHOLDER, &urlencoding::encode(&id.to_string()))
    }
}

/// Ordered, immutable view over the configured sources
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    specs: Vec<SourceSpec>,
}

impl SourceRegistry {
    /// Build the registry from configuration, preserving order
    pub fn from_config(sources: &[SourceConfig]) -> Self {
        let specs = sources
            .iter()
            .enumerate()
            .map(|(i, s)| SourceSpec {
                position: i + 1,
                name: s.name.clone(),
                url_template: s.url_template.clone(),
                success_code: s.success_code,
                unavailable_code: s.unavailable_code,
                enabled: s.enabled,
            })
            .collect();
        Self { specs }
    }

    /// Every configured source, enabled or not
    pub fn all(&self) -> &[SourceSpec] {
        &self.specs
    }

    /// Enabled sources in priority order
    pub fn enabled(&self) -> impl Iterator<Item = &SourceSpec> {
        self.specs.iter().filter(|s| s.enabled)
    }

    /// Number of configured sources (including disabled ones)
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when no source is configured
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// True when at least one source is enabled
    pub fn has_enabled(&self) -> bool {
        self.specs.iter().any(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SourceRegistry {
        let mut disabled = SourceConfig::new("b", "https://b.example/{id}.lua");
        disabled.enabled = false;
        SourceRegistry::from_config(&[
            SourceConfig::new("a", "https://a.example/{id}.zip"),
            disabled,
            SourceConfig::new("c", "https://c.example/get?app={id}"),
        ])
    }

    #[test]
    fn disabled_sources_keep_their_position() {
        let registry = registry();
        let enabled: Vec<_> = registry.enabled().map(|s| (s.name.as_str(), s.position)).collect();
        assert_eq!(enabled, vec![("a", 1), ("c", 3)]);
        assert_eq!(registry.len(), 3);
        assert!(registry.has_enabled());
    }

    #[test]
    fn url_substitutes_every_placeholder() {
        let spec = SourceSpec {
            position: 1,
            name: "x".into(),
            url_template: "https://x.example/{id}/{id}.zip".into(),
            success_code: 200,
            unavailable_code: 404,
            enabled: true,
        };
        assert_eq!(spec.url_for(ItemId(440)), "https://x.example/440/440.zip");
    }

    #[test]
    fn all_disabled_has_no_enabled() {
        let mut only = SourceConfig::new("a", "https://a.example/{id}");
        only.enabled = false;
        let registry = SourceRegistry::from_config(&[only]);
        assert!(!registry.has_enabled());
        assert_eq!(registry.enabled().count(), 0);
    }
}
