use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DatabaseManager;
use crate::handlers;
use crate::middleware::{bind_tenant_middleware, no_cache_middleware};

pub fn app() -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(session_routes())
        // Tenant-scoped
        .merge(tenant_routes())
        // Every request is bound to its session's tenant before routing
        .layer(middleware::from_fn(bind_tenant_middleware))
        .layer(middleware::from_fn(no_cache_middleware));

    let security = &crate::config::config().security;
    let router = if security.enable_cors {
        router.layer(cors_layer(&security.cors_origins))
    } else {
        router
    };

    if crate::config::config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = allowed_origins(origins);

    // Credentials are required for the session cookie to cross origins
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Explicit origins only: a wildcard cannot be combined with credentials
fn allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| {
            if *o == "*" {
                tracing::warn!("Ignoring wildcard CORS origin; list origins explicitly to allow session cookies");
                return false;
            }
            true
        })
        .filter_map(|o| o.parse().ok())
        .collect()
}

fn session_routes() -> Router {
    use handlers::public;

    Router::new()
        .route("/auth/databases", get(public::databases_get))
        .route(
            "/auth/session",
            axum::routing::post(public::session_post).delete(public::session_delete),
        )
}

fn tenant_routes() -> Router {
    use handlers::protected;

    Router::new()
        .route("/api/tenant", get(protected::tenant_get))
        .route("/api/tenant/route/:entity_kind", get(protected::route_get))
        .route("/api/tenant/status", get(protected::status_get))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Ledger tenancy",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "databases": "/auth/databases?company_code=CODE (public)",
                "session": "POST|DELETE /auth/session (public)",
                "tenant": "/api/tenant, /api/tenant/route/:entity_kind, /api/tenant/status",
                "health": "/health",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|o| o.to_string()).collect()
    }

    #[test]
    fn wildcard_origin_is_dropped() {
        let allowed = allowed_origins(&origins(&["*", " https://app.example.com ", "bad\norigin"]));
        assert_eq!(allowed, vec![HeaderValue::from_static("https://app.example.com")]);
    }

    #[tokio::test]
    async fn cors_layer_with_wildcard_still_serves() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(&origins(&["*", "https://app.example.com"])));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
