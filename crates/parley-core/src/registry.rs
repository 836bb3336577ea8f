//! Provider registry: configured backends in failover order

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::providers::{LlmProvider, ProviderKind};

/// Static metadata for one configured backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Unique within a registry
    pub id: String,
    /// Lower is tried first
    pub priority: i32,
    /// Credentialed and not disabled
    pub available: bool,
    pub kind: ProviderKind,
    pub model: String,
}

/// A descriptor together with the client that serves it
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub client: Arc<dyn LlmProvider>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .field("client", &self.client.provider_name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("provider id '{0}' is registered more than once")]
    DuplicateId(String),

    #[error("provider id must not be empty")]
    EmptyId,
}

/// Read-only set of providers, built once at startup
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    /// Registration order
    entries: Vec<RegisteredProvider>,
    /// Indices into `entries`: available only, by priority then registration
    candidates: Vec<usize>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Available providers in the order they should be tried
    pub fn all_candidates(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.candidates.iter().map(|&i| &self.entries[i])
    }

    /// First candidate whose id is not in `excluding`
    pub fn next_candidate(&self, excluding: &HashSet<String>) -> Option<&RegisteredProvider> {
        self.all_candidates()
            .find(|entry| !excluding.contains(&entry.descriptor.id))
    }

    /// Every registered descriptor, unavailable ones included, in candidate
    /// order followed by the unavailable ones in registration order
    pub fn descriptors(&self) -> Vec<&ProviderDescriptor> {
        let mut out: Vec<&ProviderDescriptor> =
            self.all_candidates().map(|e| &e.descriptor).collect();
        out.extend(
            self.entries
                .iter()
                .filter(|e| !e.descriptor.available)
                .map(|e| &e.descriptor),
        );
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of providers that can actually be tried
    pub fn available_count(&self) -> usize {
        self.candidates.len()
    }
}

/// Collects providers before freezing them into a [`ProviderRegistry`]
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    entries: Vec<RegisteredProvider>,
}

impl ProviderRegistryBuilder {
    pub fn register(
        mut self,
        descriptor: ProviderDescriptor,
        client: Arc<dyn LlmProvider>,
    ) -> Result<Self, RegistryError> {
        if descriptor.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if self.entries.iter().any(|e| e.descriptor.id == descriptor.id) {
            return Err(RegistryError::DuplicateId(descriptor.id));
        }
        self.entries.push(RegisteredProvider { descriptor, client });
        Ok(self)
    }

    pub fn build(self) -> ProviderRegistry {
        let mut candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.descriptor.available)
            .map(|(i, _)| i)
            .collect();
        // Stable sort keeps registration order among equal priorities
        candidates.sort_by_key(|&i| self.entries[i].descriptor.priority);

        ProviderRegistry {
            entries: self.entries,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;
    use crate::providers::ProviderError;
    use async_trait::async_trait;

    struct NullProvider;

    #[async_trait]
    impl LlmProvider for NullProvider {
        fn provider_name(&self) -> &str {
            "null"
        }
        fn model(&self) -> &str {
            "null-model"
        }
        async fn complete(&self, _turns: &[Turn]) -> Result<Turn, ProviderError> {
            Ok(Turn::assistant(""))
        }
    }

    fn desc(id: &str, priority: i32, available: bool) -> ProviderDescriptor {
        ProviderDescriptor {
            id: id.to_string(),
            priority,
            available,
            kind: ProviderKind::OpenAi,
            model: "m".to_string(),
        }
    }

    fn registry(entries: &[(&str, i32, bool)]) -> ProviderRegistry {
        let mut builder = ProviderRegistry::builder();
        for (id, priority, available) in entries {
            builder = builder
                .register(desc(id, *priority, *available), Arc::new(NullProvider))
                .unwrap();
        }
        builder.build()
    }

    fn ids<'a>(it: impl Iterator<Item = &'a RegisteredProvider>) -> Vec<&'a str> {
        it.map(|e| e.descriptor.id.as_str()).collect()
    }

    #[test]
    fn test_candidates_sorted_by_priority() {
        let reg = registry(&[("c", 3, true), ("a", 1, true), ("b", 2, true)]);
        assert_eq!(ids(reg.all_candidates()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let reg = registry(&[("second", 5, true), ("first", 1, true), ("third", 5, true)]);
        assert_eq!(ids(reg.all_candidates()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unavailable_filtered() {
        let reg = registry(&[("a", 1, false), ("b", 2, true)]);
        assert_eq!(ids(reg.all_candidates()), vec!["b"]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.available_count(), 1);
        assert_eq!(reg.descriptors().len(), 2);
    }

    #[test]
    fn test_next_candidate_skips_excluded() {
        let reg = registry(&[("a", 1, true), ("b", 2, true), ("c", 3, true)]);
        let mut excluding = HashSet::new();
        assert_eq!(reg.next_candidate(&excluding).unwrap().descriptor.id, "a");
        excluding.insert("a".to_string());
        assert_eq!(reg.next_candidate(&excluding).unwrap().descriptor.id, "b");
        excluding.insert("b".to_string());
        excluding.insert("c".to_string());
        assert!(reg.next_candidate(&excluding).is_none());
    }

    #[test]
    fn test_duplicate_and_empty_ids_rejected() {
        let err = ProviderRegistry::builder()
            .register(desc("a", 1, true), Arc::new(NullProvider))
            .unwrap()
            .register(desc("a", 2, true), Arc::new(NullProvider))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("a".to_string()));

        let err = ProviderRegistry::builder()
            .register(desc("  ", 1, true), Arc::new(NullProvider))
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyId);
    }

    #[test]
    fn test_descriptors_lists_unavailable_last() {
        let reg = registry(&[("off", 0, false), ("b", 2, true), ("a", 1, true)]);
        let listed: Vec<&str> = reg.descriptors().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(listed, vec!["a", "b", "off"]);
    }

    #[test]
    fn test_empty_registry() {
        let reg = ProviderRegistry::builder().build();
        assert!(reg.is_empty());
        assert!(reg.next_candidate(&HashSet::new()).is_none());
    }
}
