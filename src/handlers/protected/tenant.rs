use axum::{extract::Path, Extension};
use serde::Serialize;

use crate::database::DatabaseManager;
use crate::handlers::public::session::load_directory;
use crate::middleware::{ApiResponse, ApiResult, TenantSelection};
use crate::tenancy::{context, QueryRouter};

#[derive(Debug, Serialize)]
pub struct CurrentTenant {
    pub database: String,
    pub company_code: String,
    pub user: Option<String>,
    pub description: String,
    pub active: String,
    pub registered_tenants: usize,
    pub open_pools: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteDecision {
    pub entity_kind: String,
    pub tenant_independent: bool,
    pub read: String,
    pub write: String,
    pub schema_change_allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct TenantStatus {
    pub database: String,
    pub reachable: bool,
}

/// GET /api/tenant - the selection bound to this request
pub async fn tenant_get(Extension(selection): Extension<TenantSelection>) -> ApiResult<CurrentTenant> {
    let router = QueryRouter::global()?;
    let directory = load_directory().await?;

    Ok(ApiResponse::success(CurrentTenant {
        description: directory.description_for(&selection.company_code, &selection.database),
        active: context::get(router.base_alias()),
        registered_tenants: router.registry().len(),
        open_pools: DatabaseManager::open_pools().await,
        database: selection.database,
        company_code: selection.company_code,
        user: selection.user,
    }))
}

/// GET /api/tenant/route/:entity_kind - where reads and writes of a kind go
pub async fn route_get(Path(entity_kind): Path<String>) -> ApiResult<RouteDecision> {
    let router = QueryRouter::global()?;
    let read = router.route_for_read(&entity_kind)?;
    let write = router.route_for_write(&entity_kind)?;

    Ok(ApiResponse::success(RouteDecision {
        tenant_independent: router.is_tenant_independent(&entity_kind),
        schema_change_allowed: router.allow_schema_change(&write),
        entity_kind,
        read,
        write,
    }))
}

/// GET /api/tenant/status - ping the database this request is routed to
pub async fn status_get() -> ApiResult<TenantStatus> {
    let database = DatabaseManager::tenant_check("tenant").await?;
    Ok(ApiResponse::success(TenantStatus {
        database,
        reachable: true,
    }))
}
