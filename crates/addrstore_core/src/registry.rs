//! Namespace to provider registry.

use crate::address::validate_namespace;
use crate::error::{StoreError, StoreResult};
use crate::provider::DynProvider;
use std::collections::BTreeMap;

/// Owns the providers routed to by namespace.
///
/// Ownership moves into the registry, so one provider value can only be
/// registered once; two providers managing the same backing location are
/// rejected as the same physical instance.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn DynProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under `namespace`.
    ///
    /// # Errors
    /// - `Address` when `namespace` is empty or contains a separator.
    /// - `Duplicate` when the namespace or the provider's backing location is
    ///   already registered.
    pub fn register(
        &mut self,
        namespace: &str,
        provider: Box<dyn DynProvider>,
    ) -> StoreResult<()> {
        validate_namespace(namespace)?;
        if self.providers.contains_key(namespace) {
            return Err(StoreError::Duplicate(format!("namespace `{namespace}`")));
        }
        if let Some((existing, _)) = self
            .providers
            .iter()
            .find(|(_, registered)| registered.location() == provider.location())
        {
            return Err(StoreError::Duplicate(format!(
                "backing location `{}` is registered under namespace `{existing}`",
                provider.location()
            )));
        }

        self.providers.insert(namespace.to_string(), provider);
        Ok(())
    }

    /// Removes and returns the provider for `namespace`.
    pub fn unregister(&mut self, namespace: &str) -> StoreResult<Box<dyn DynProvider>> {
        self.providers
            .remove(namespace)
            .ok_or_else(|| StoreError::Resolution(namespace.to_string()))
    }

    pub fn get(&self, namespace: &str) -> StoreResult<&dyn DynProvider> {
        self.providers
            .get(namespace)
            .map(|provider| &**provider)
            .ok_or_else(|| StoreError::Resolution(namespace.to_string()))
    }

    pub fn get_mut(&mut self, namespace: &str) -> StoreResult<&mut Box<dyn DynProvider>> {
        self.providers
            .get_mut(namespace)
            .ok_or_else(|| StoreError::Resolution(namespace.to_string()))
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.providers.contains_key(namespace)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns sorted namespaces.
    pub fn namespaces(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Drains every provider in namespace order.
    pub(crate) fn drain(&mut self) -> Vec<(String, Box<dyn DynProvider>)> {
        std::mem::take(&mut self.providers).into_iter().collect()
    }
}
