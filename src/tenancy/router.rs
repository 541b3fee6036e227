use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{context, ConnectionProfile, ConnectionRegistry, TenantError};
use crate::config::AppConfig;

/// Picks the database every read and write goes to.
///
/// Entity kinds in the tenant-independent allow-list (session storage and the
/// like) always go to the base database. Everything else follows the active
/// tenant slot, falling back to the base database when no tenant is bound.
pub struct QueryRouter {
    registry: Arc<ConnectionRegistry>,
    tenant_independent: HashSet<String>,
}

impl QueryRouter {
    pub fn new<I, S>(registry: Arc<ConnectionRegistry>, tenant_independent: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry,
            tenant_independent: tenant_independent.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TenantError> {
        let registry = ConnectionRegistry::from_config(&config.database)?;
        Ok(Self::new(
            Arc::new(registry),
            config.tenancy.tenant_independent.iter().cloned(),
        ))
    }

    /// Process-wide router built from the global configuration on first use.
    pub fn global() -> Result<&'static QueryRouter, TenantError> {
        static INSTANCE: OnceCell<QueryRouter> = OnceCell::new();
        INSTANCE.get_or_try_init(|| Self::from_config(crate::config::config()))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn base_alias(&self) -> &str {
        self.registry.base_alias()
    }

    pub fn is_tenant_independent(&self, entity_kind: &str) -> bool {
        self.tenant_independent.contains(entity_kind)
    }

    pub fn route_for_read(&self, entity_kind: &str) -> Result<String, TenantError> {
        self.route(entity_kind)
    }

    pub fn route_for_write(&self, entity_kind: &str) -> Result<String, TenantError> {
        self.route(entity_kind)
    }

    pub fn profile_for_read(
        &self,
        entity_kind: &str,
    ) -> Result<(String, Arc<ConnectionProfile>), TenantError> {
        let alias = self.route_for_read(entity_kind)?;
        let profile = self.registry.resolve(&alias)?;
        Ok((alias, profile))
    }

    pub fn profile_for_write(
        &self,
        entity_kind: &str,
    ) -> Result<(String, Arc<ConnectionProfile>), TenantError> {
        let alias = self.route_for_write(entity_kind)?;
        let profile = self.registry.resolve(&alias)?;
        Ok((alias, profile))
    }

    /// Schema changes may only target the base database.
    pub fn allow_schema_change(&self, target: &str) -> bool {
        target == self.base_alias()
    }

    pub fn ensure_schema_change(&self, target: &str) -> Result<(), TenantError> {
        if self.allow_schema_change(target) {
            return Ok(());
        }
        warn!("Rejected schema change against '{}'", target);
        Err(TenantError::SchemaChangeRejected {
            target: target.to_string(),
            base: self.base_alias().to_string(),
        })
    }

    fn route(&self, entity_kind: &str) -> Result<String, TenantError> {
        let base = self.base_alias();
        if self.is_tenant_independent(entity_kind) {
            return Ok(base.to_string());
        }

        let tenant = match context::current() {
            Some(tenant) if !tenant.is_empty() => tenant,
            _ => {
                debug!("No tenant bound, routing '{}' to '{}'", entity_kind, base);
                base.to_string()
            }
        };

        self.registry.resolve(&tenant)?;
        Ok(tenant)
    }
}
