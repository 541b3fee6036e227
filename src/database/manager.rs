use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::tenancy::{QueryRouter, TenantError};

/// Postgres SQLSTATE for "database does not exist"
const INVALID_CATALOG_NAME: &str = "3D000";

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// The session selected a database that is not provisioned
    #[error("Unknown or unavailable database: {0}")]
    UnknownTenant(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl DatabaseError {
    /// Classify a driver error raised while talking to `alias`.
    pub fn from_sqlx(alias: &str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(INVALID_CATALOG_NAME) {
                return DatabaseError::UnknownTenant(alias.to_string());
            }
        }
        DatabaseError::Sqlx(err)
    }
}

/// Connection pools for the base and tenant databases, one per routed alias.
///
/// Pools are created lazily and connect on first query, so routing to a
/// tenant costs nothing until data is actually read or written.
pub struct DatabaseManager {
    router: &'static QueryRouter,
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl DatabaseManager {
    fn instance() -> Result<&'static DatabaseManager, DatabaseError> {
        static INSTANCE: once_cell::sync::OnceCell<DatabaseManager> = once_cell::sync::OnceCell::new();
        INSTANCE.get_or_try_init(|| {
            let config = &crate::config::config().database;
            Ok(DatabaseManager::new(
                QueryRouter::global()?,
                config.max_connections,
                Duration::from_secs(config.connection_timeout),
            ))
        })
    }

    pub fn new(router: &'static QueryRouter, max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            router,
            pools: Arc::new(RwLock::new(HashMap::new())),
            max_connections,
            acquire_timeout,
        }
    }

    /// Pool for reading `entity_kind` in the current tenant context
    pub async fn pool_for_read(entity_kind: &str) -> Result<(String, PgPool), DatabaseError> {
        Self::instance()?.read_pool(entity_kind).await
    }

    /// Pool for writing `entity_kind` in the current tenant context
    pub async fn pool_for_write(entity_kind: &str) -> Result<(String, PgPool), DatabaseError> {
        Self::instance()?.write_pool(entity_kind).await
    }

    /// Base (administrative) database pool
    pub async fn base_pool() -> Result<PgPool, DatabaseError> {
        let manager = Self::instance()?;
        manager.get_pool(manager.router.base_alias()).await
    }

    /// Pool for applying schema changes; refused for anything but the base
    pub async fn migration_pool(target: &str) -> Result<PgPool, DatabaseError> {
        Self::instance()?.schema_pool(target).await
    }

    async fn read_pool(&self, entity_kind: &str) -> Result<(String, PgPool), DatabaseError> {
        let alias = self.router.route_for_read(entity_kind)?;
        let pool = self.get_pool(&alias).await?;
        Ok((alias, pool))
    }

    async fn write_pool(&self, entity_kind: &str) -> Result<(String, PgPool), DatabaseError> {
        let alias = self.router.route_for_write(entity_kind)?;
        let pool = self.get_pool(&alias).await?;
        Ok((alias, pool))
    }

    // The guard runs before the pool map or the registry is touched
    async fn schema_pool(&self, target: &str) -> Result<PgPool, DatabaseError> {
        self.router.ensure_schema_change(target)?;
        self.get_pool(target).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, alias: &str) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(alias) {
                return Ok(pool.clone());
            }
        }

        let profile = self.router.registry().resolve(alias)?;
        let options = profile.connect_options()?;

        let mut pools = self.pools.write().await;
        let pool = pools
            .entry(alias.to_string())
            .or_insert_with(|| {
                info!("Created database pool for: {} ({})", alias, profile);
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect_lazy_with(options)
            })
            .clone();
        Ok(pool)
    }

    /// Pings the base pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::base_pool().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(DatabaseError::Sqlx)?;
        Ok(())
    }

    /// Pings the databases `entity_kind` is read from and written to in the
    /// current tenant context, returning the read alias.
    pub async fn tenant_check(entity_kind: &str) -> Result<String, DatabaseError> {
        let (alias, pool) = Self::pool_for_read(entity_kind).await?;
        ping(&alias, &pool).await?;

        let (write_alias, write_pool) = Self::pool_for_write(entity_kind).await?;
        if write_alias != alias {
            ping(&write_alias, &write_pool).await?;
        }
        Ok(alias)
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let Ok(manager) = Self::instance() else {
            return;
        };
        let mut pools = manager.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Aliases that currently have a pool, sorted
    pub async fn open_pools() -> Vec<String> {
        match Self::instance() {
            Ok(manager) => manager.pool_names().await,
            Err(_) => Vec::new(),
        }
    }

    async fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

async fn ping(alias: &str, pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(alias, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::tenancy::{context, ConnectionProfile, ConnectionRegistry};
    use axum::http::StatusCode;

    fn leaked_router() -> &'static QueryRouter {
        let base = ConnectionProfile::from_url("postgres://ledger:pw@127.0.0.1:1/insurance").unwrap();
        let registry = ConnectionRegistry::new("default", base).unwrap();
        Box::leak(Box::new(QueryRouter::new(Arc::new(registry), ["session"])))
    }

    #[tokio::test]
    async fn pools_are_created_lazily_and_cached() {
        let manager = DatabaseManager::new(leaked_router(), 2, Duration::from_millis(50));
        let first = manager.get_pool("acme_co").await.unwrap();
        let second = manager.get_pool("acme_co").await.unwrap();
        assert_eq!(first.size(), 0);
        assert!(!second.is_closed());
        assert_eq!(manager.pools.read().await.len(), 1);
        assert!(manager.router.registry().contains("acme_co"));
    }

    #[tokio::test]
    async fn pool_key_follows_the_route() {
        let manager = DatabaseManager::new(leaked_router(), 2, Duration::from_millis(50));
        context::scope(async {
            context::set("globex");
            let (alias, _) = manager.write_pool("ledger_entry").await.unwrap();
            assert_eq!(alias, "globex");
            let (alias, _) = manager.read_pool("session").await.unwrap();
            assert_eq!(alias, "default");
        })
        .await;

        assert_eq!(manager.pool_names().await, vec!["default", "globex"]);
    }

    #[tokio::test]
    async fn schema_pool_refuses_tenant_targets() {
        let manager = DatabaseManager::new(leaked_router(), 2, Duration::from_millis(50));

        let err = manager.schema_pool("acme_co").await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Tenant(TenantError::SchemaChangeRejected { ref target, ref base })
                if target == "acme_co" && base == "default"
        ));
        assert!(manager.pool_names().await.is_empty());
        assert!(!manager.router.registry().contains("acme_co"));

        manager.schema_pool("default").await.unwrap();
        assert_eq!(manager.pool_names().await, vec!["default"]);
    }

    #[test]
    fn non_database_errors_stay_generic() {
        let err = DatabaseError::from_sqlx("acme_co", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Sqlx(_)));
    }

    #[test]
    fn missing_database_is_an_unknown_tenant() {
        let err = DatabaseError::from_sqlx("ghost_co", pg_error("3D000"));
        assert!(matches!(err, DatabaseError::UnknownTenant(ref alias) if alias == "ghost_co"));

        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(api.message(), "Unknown or unavailable company/database");
    }

    #[test]
    fn other_database_errors_are_unavailable() {
        let err = DatabaseError::from_sqlx("acme_co", pg_error("28P01"));
        assert!(matches!(err, DatabaseError::Sqlx(_)));
        assert_eq!(ApiError::from(err).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    fn pg_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(ServerError { code }))
    }

    /// Minimal server-side error carrying only a SQLSTATE
    #[derive(Debug)]
    struct ServerError {
        code: &'static str,
    }

    impl std::fmt::Display for ServerError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "server error {}", self.code)
        }
    }

    impl std::error::Error for ServerError {}

    impl sqlx::error::DatabaseError for ServerError {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }
}
