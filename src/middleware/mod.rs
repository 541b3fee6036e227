pub mod no_cache;
pub mod response;
pub mod tenant;

pub use no_cache::no_cache_middleware;
pub use response::{ApiResponse, ApiResult};
pub use tenant::{bind_tenant_middleware, TenantSelection};
