//! The immutable lookup table from replaced methods to replacement candidates.
//!
//! A [`ReplacementRegistry`] is assembled once through [`ReplacementRegistryBuilder`] and only
//! read afterwards, so it can be shared between rewriting threads without synchronization.
//! Candidates are indexed by `(target type, original name, static intent)`; a query for a runtime
//! type collects the entries of the type and of all its ancestors.
//!
//! # Ordering
//!
//! Candidates are always returned in provider registration order, then in function declaration
//! order within a provider. The rewriter takes the first applicable candidate, so this order
//! decides between overlapping replacements.

use std::collections::HashMap;

use crate::{
    replacement::{catalog, ReplacementCandidate, ReplacementProvider, RuntimeType},
    Result,
};

/// Candidate positions for one original name, split by static intent
#[derive(Debug, Default, Clone)]
struct NameEntries {
    instance: Vec<(usize, usize)>,
    statics: Vec<(usize, usize)>,
}

/// Read-only catalog of replacement providers.
#[derive(Debug, Clone, Default)]
pub struct ReplacementRegistry {
    providers: Vec<ReplacementProvider>,
    /// target type -> original name -> (provider, function) positions
    index: HashMap<String, HashMap<String, NameEntries>>,
}

impl ReplacementRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ReplacementRegistryBuilder {
        ReplacementRegistryBuilder::default()
    }

    /// The built-in catalog, see [`catalog::standard_providers`].
    ///
    /// # Errors
    /// Returns an error if a catalogued replacement is malformed.
    pub fn standard() -> Result<Self> {
        Ok(catalog::standard_providers()?
            .into_iter()
            .fold(Self::builder(), ReplacementRegistryBuilder::provider)
            .build())
    }

    fn from_providers(providers: Vec<ReplacementProvider>) -> Self {
        let mut index: HashMap<String, HashMap<String, NameEntries>> = HashMap::new();

        for (provider_position, provider) in providers.iter().enumerate() {
            let by_name = index.entry(provider.target_type.clone()).or_default();
            for (function_position, function) in provider.functions.iter().enumerate() {
                let entries = by_name.entry(function.original_name.clone()).or_default();
                let slot = if function.replacing_static {
                    &mut entries.statics
                } else {
                    &mut entries.instance
                };
                slot.push((provider_position, function_position));
            }
        }

        ReplacementRegistry { providers, index }
    }

    /// All providers in registration order.
    #[must_use]
    pub fn providers(&self) -> &[ReplacementProvider] {
        &self.providers
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if no provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers applicable to `runtime_type`, i.e. whose target is the type or an ancestor.
    #[must_use]
    pub fn lookup(&self, runtime_type: &RuntimeType) -> Vec<&ReplacementProvider> {
        self.providers
            .iter()
            .filter(|provider| runtime_type.is_assignable_to(&provider.target_type))
            .collect()
    }

    /// Candidates replacing `original_name` with the given static intent on `runtime_type`.
    #[must_use]
    pub fn candidates(
        &self,
        runtime_type: &RuntimeType,
        original_name: &str,
        replacing_static: bool,
    ) -> Vec<&ReplacementCandidate> {
        let mut positions: Vec<(usize, usize)> = runtime_type
            .lineage()
            .filter_map(|ty| self.index.get(ty))
            .filter_map(|by_name| by_name.get(original_name))
            .flat_map(|entries| {
                if replacing_static {
                    entries.statics.iter().copied()
                } else {
                    entries.instance.iter().copied()
                }
            })
            .collect();

        positions.sort_unstable();
        positions.dedup();

        positions
            .into_iter()
            .map(|(provider, function)| &self.providers[provider].functions[function])
            .collect()
    }
}

/// Collects providers in a fixed order and freezes them into a [`ReplacementRegistry`].
///
/// Registration order is significant, see the module documentation.
#[derive(Debug, Default)]
pub struct ReplacementRegistryBuilder {
    providers: Vec<ReplacementProvider>,
}

impl ReplacementRegistryBuilder {
    /// Appends a provider.
    #[must_use]
    pub fn provider(mut self, provider: ReplacementProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the registry.
    #[must_use]
    pub fn build(self) -> ReplacementRegistry {
        ReplacementRegistry::from_providers(self.providers)
    }
}
