// Tenant-scoped handlers. Every request reaching these runs inside the
// tenant slot bound by `bind_tenant_middleware`.

pub mod tenant;

pub use tenant::{route_get, status_get, tenant_get};
