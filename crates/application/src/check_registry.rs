use std::collections::HashSet;
use std::sync::Arc;

use auditor_core::{AppError, AppResult};
use auditor_domain::{CheckName, CloudProvider};

use crate::audit_ports::{AuditCheck, CheckDescriptor};

/// Descriptor-only view of the registered checks, used to validate requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckCatalog {
    descriptors: Vec<CheckDescriptor>,
}

impl CheckCatalog {
    /// Creates a catalog, rejecting duplicate check names.
    pub fn new(descriptors: Vec<CheckDescriptor>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(AppError::Conflict(format!(
                    "check '{}' is registered more than once",
                    descriptor.name
                )));
            }

            if descriptor.providers.is_empty() {
                return Err(AppError::Validation(format!(
                    "check '{}' must support at least one cloud provider",
                    descriptor.name
                )));
            }
        }

        Ok(Self { descriptors })
    }

    /// Returns descriptors in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[CheckDescriptor] {
        &self.descriptors
    }

    /// Returns one descriptor by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CheckDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.name.as_str() == name)
    }

    /// Returns every check that supports `provider`, in registration order.
    #[must_use]
    pub fn defaults_for(&self, provider: CloudProvider) -> Vec<CheckName> {
        self.descriptors
            .iter()
            .filter(|descriptor| descriptor.supports(provider))
            .map(|descriptor| descriptor.name.clone())
            .collect()
    }

    /// Validates requested check names for one provider.
    ///
    /// `None` selects [`Self::defaults_for`]. Order is preserved.
    pub fn resolve(
        &self,
        provider: CloudProvider,
        requested: Option<Vec<String>>,
    ) -> AppResult<Vec<CheckName>> {
        let Some(requested) = requested else {
            let defaults = self.defaults_for(provider);
            if defaults.is_empty() {
                return Err(AppError::Validation(format!(
                    "no checks are registered for cloud_provider '{provider}'"
                )));
            }
            return Ok(defaults);
        };

        if requested.is_empty() {
            return Err(AppError::Validation(
                "checks must contain at least one check".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(requested.len());
        for raw in requested {
            let name = raw.trim();
            let descriptor = self
                .find(name)
                .ok_or_else(|| AppError::Validation(format!("unknown check '{name}'")))?;

            if !descriptor.supports(provider) {
                return Err(AppError::Validation(format!(
                    "check '{name}' does not support cloud_provider '{provider}'"
                )));
            }

            if !seen.insert(descriptor.name.as_str().to_owned()) {
                return Err(AppError::Validation(format!(
                    "check '{name}' is listed more than once"
                )));
            }

            resolved.push(descriptor.name.clone());
        }

        Ok(resolved)
    }
}

/// Executable checks keyed by name.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<Arc<dyn AuditCheck>>,
}

impl CheckRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one check, `Conflict` when the name is taken.
    pub fn register(&mut self, check: Arc<dyn AuditCheck>) -> AppResult<()> {
        let name = check.descriptor().name.clone();
        if self.get(&name).is_some() {
            return Err(AppError::Conflict(format!(
                "check '{name}' is registered more than once"
            )));
        }

        self.checks.push(check);
        Ok(())
    }

    /// Builds a registry from a list of checks.
    pub fn from_checks(checks: impl IntoIterator<Item = Arc<dyn AuditCheck>>) -> AppResult<Self> {
        let mut registry = Self::new();
        for check in checks {
            registry.register(check)?;
        }
        Ok(registry)
    }

    /// Returns one executable check by name.
    #[must_use]
    pub fn get(&self, name: &CheckName) -> Option<Arc<dyn AuditCheck>> {
        self.checks
            .iter()
            .find(|check| &check.descriptor().name == name)
            .cloned()
    }

    /// Returns the number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns whether no check is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Returns the descriptor catalog for request validation.
    pub fn catalog(&self) -> AppResult<CheckCatalog> {
        CheckCatalog::new(
            self.checks
                .iter()
                .map(|check| check.descriptor().clone())
                .collect(),
        )
    }
}
