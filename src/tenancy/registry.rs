use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use super::{ConnectionProfile, TenantError};
use crate::config::DatabaseConfig;

/// Process-wide map of tenant identifier to connection profile.
///
/// Entries are created the first time a tenant is resolved and are never
/// removed or replaced, so the map only grows with the number of distinct
/// tenants seen.
pub struct ConnectionRegistry {
    base_alias: String,
    base: Arc<ConnectionProfile>,
    profiles: RwLock<HashMap<String, Arc<ConnectionProfile>>>,
}

impl ConnectionRegistry {
    pub fn new(base_alias: impl Into<String>, base: ConnectionProfile) -> Result<Self, TenantError> {
        let base_alias = base_alias.into();
        if base_alias.is_empty() {
            return Err(TenantError::Configuration("base alias must not be empty".to_string()));
        }

        let base = Arc::new(base);
        let mut profiles = HashMap::new();
        profiles.insert(base_alias.clone(), base.clone());

        Ok(Self {
            base_alias,
            base,
            profiles: RwLock::new(profiles),
        })
    }

    /// Build the registry from the base database configuration.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, TenantError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| TenantError::Configuration("DATABASE_URL is not set".to_string()))?;

        Self::new(config.base_alias.clone(), ConnectionProfile::from_url(url)?)
    }

    pub fn base_alias(&self) -> &str {
        &self.base_alias
    }

    pub fn base_profile(&self) -> &Arc<ConnectionProfile> {
        &self.base
    }

    /// Profile for `tenant_id`, cloned from the base profile on first use.
    pub fn resolve(&self, tenant_id: &str) -> Result<Arc<ConnectionProfile>, TenantError> {
        if tenant_id.is_empty() {
            return Err(TenantError::InvalidTenant(tenant_id.to_string()));
        }

        // Fast path: already registered
        if let Some(profile) = self.read().get(tenant_id) {
            return Ok(profile.clone());
        }

        let mut profiles = self.write();
        let profile = profiles
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                info!("Registered connection profile for tenant: {}", tenant_id);
                Arc::new(self.base.with_database(tenant_id))
            })
            .clone();
        Ok(profile)
    }

    pub fn contains(&self, tenant_id: &str) -> bool {
        self.read().contains_key(tenant_id)
    }

    /// Number of registered profiles, base included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn tenants(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // Entries are immutable once inserted, so a poisoned lock still guards a consistent map
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ConnectionProfile>>> {
        self.profiles.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ConnectionProfile>>> {
        self.profiles.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConnectionRegistry {
        let base = ConnectionProfile::from_url("postgres://ledger:pw@db.internal:5432/insurance").unwrap();
        ConnectionRegistry::new("default", base).unwrap()
    }

    #[test]
    fn base_is_registered_under_alias() {
        let registry = registry();
        assert!(registry.contains("default"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("default").unwrap().database, "insurance");
    }

    #[test]
    fn resolve_clones_base_with_new_name() {
        let registry = registry();
        let base = registry.base_profile().clone();
        let profile = registry.resolve("acme_co").unwrap();

        assert_eq!(profile.database, "acme_co");
        assert_eq!(profile.host, base.host);
        assert_eq!(profile.port, base.port);
        assert_eq!(profile.username, base.username);
        assert_eq!(profile.password, base.password);
        assert_eq!(profile.options, base.options);
    }

    #[test]
    fn resolve_is_idempotent() {
        let registry = registry();
        let first = registry.resolve("acme_co").unwrap();
        for _ in 0..10 {
            let again = registry.resolve("acme_co").unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tenants(), vec!["acme_co", "default"]);
    }

    #[test]
    fn concurrent_first_resolution_registers_once() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.resolve("acme_co").unwrap())
            })
            .collect();

        let profiles: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(profiles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn empty_tenant_is_rejected() {
        assert_eq!(
            registry().resolve("").unwrap_err(),
            TenantError::InvalidTenant(String::new())
        );
    }

    #[test]
    fn missing_or_bad_base_is_configuration_error() {
        let missing = DatabaseConfig::default();
        assert!(matches!(
            ConnectionRegistry::from_config(&missing),
            Err(TenantError::Configuration(_))
        ));

        let malformed = DatabaseConfig {
            url: Some("postgres://".to_string()),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            ConnectionRegistry::from_config(&malformed),
            Err(TenantError::Configuration(_))
        ));

        let base = ConnectionProfile::from_url("postgres://u@h/db").unwrap();
        assert!(matches!(
            ConnectionRegistry::new("", base),
            Err(TenantError::Configuration(_))
        ));
    }
}
