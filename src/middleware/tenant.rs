use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::auth::{decode_session, session_token};
use crate::config::{self, SecurityConfig, TenancyConfig};
use crate::tenancy::context;

/// Tenant selection bound to the current request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantSelection {
    pub database: String,
    pub company_code: String,
    pub user: Option<String>,
}

impl TenantSelection {
    /// Read the selection from the request's session, falling back to the
    /// default selector when there is no usable session.
    pub fn from_headers(headers: &HeaderMap, tenancy: &TenancyConfig, security: &SecurityConfig) -> Self {
        let claims = session_token(headers, &security.session_cookie_name).and_then(|token| {
            decode_session(&token, &security.session_secret)
                .map_err(|e| tracing::warn!("Ignoring session: {}", e))
                .ok()
        });

        match claims {
            Some(claims) if !claims.selected_database.is_empty() => Self {
                database: claims.selected_database,
                company_code: claims.company_code,
                user: Some(claims.user),
            },
            _ => Self {
                database: tenancy.default_selector.clone(),
                company_code: String::new(),
                user: None,
            },
        }
    }
}

/// Binds the session's tenant into the active tenant slot for the rest of
/// the request. The slot is scoped to this request's future and vanishes
/// when the response is produced.
pub async fn bind_tenant_middleware(mut request: Request, next: Next) -> Response {
    let config = config::config();
    let selection = TenantSelection::from_headers(request.headers(), &config.tenancy, &config.security);

    if let Some(user) = &selection.user {
        tracing::debug!(
            "User {} using database {} for company {}",
            user,
            selection.database,
            selection.company_code
        );
    }

    let database = selection.database.clone();
    request.extensions_mut().insert(selection);

    context::scope(async move {
        context::set(database);
        next.run(request).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_session, SessionClaims};
    use axum::http::{header, HeaderValue};

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("ledger_session={}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn session_selection_is_used() {
        let security = SecurityConfig::default();
        let claims = SessionClaims::new("alice".into(), "ACME".into(), "acme_co".into(), 1);
        let token = issue_session(&claims, &security.session_secret).unwrap();

        let selection = TenantSelection::from_headers(&cookie_headers(&token), &TenancyConfig::default(), &security);
        assert_eq!(
            selection,
            TenantSelection {
                database: "acme_co".to_string(),
                company_code: "ACME".to_string(),
                user: Some("alice".to_string()),
            }
        );
    }

    #[test]
    fn missing_or_forged_session_uses_default_selector() {
        let security = SecurityConfig::default();
        let tenancy = TenancyConfig::default();

        let none = TenantSelection::from_headers(&HeaderMap::new(), &tenancy, &security);
        assert_eq!(none.database, "silicon4");
        assert_eq!(none.user, None);

        let forged = TenantSelection::from_headers(&cookie_headers("not.a.jwt"), &tenancy, &security);
        assert_eq!(forged.database, "silicon4");
    }
}
