use axum::{
    extract::Query,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{expired_session_cookie, issue_session, session_cookie, SessionClaims};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{context, DirectoryEntry, TenantDirectory};

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub company_code: String,
    pub database: Option<String>,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub token: String,
    pub user: String,
    pub company_code: String,
    pub database: String,
    pub description: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct DatabasesQuery {
    pub company_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseOption {
    pub value: String,
    pub label: String,
}

pub(crate) async fn load_directory() -> Result<TenantDirectory, ApiError> {
    let tenancy = &config::config().tenancy;
    let path = tenancy.directory_file.clone();
    let default_selector = tenancy.default_selector.clone();

    tokio::task::spawn_blocking(move || TenantDirectory::load(path, &default_selector))
        .await
        .map_err(|e| {
            tracing::error!("Directory loader panicked: {}", e);
            ApiError::internal_server_error("Company directory is unavailable")
        })?
        .map_err(ApiError::from)
}

/// GET /auth/databases?company_code=X - databases a company may select
pub async fn databases_get(Query(query): Query<DatabasesQuery>) -> ApiResult<Vec<DatabaseOption>> {
    let company_code = query
        .company_code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Company code is required"))?;

    let directory = load_directory().await?;
    let options: Vec<DatabaseOption> = directory
        .databases_for(Some(&company_code))
        .into_iter()
        .map(|DirectoryEntry { db_name, description, .. }| DatabaseOption {
            value: db_name.clone(),
            label: description.clone(),
        })
        .collect();

    if options.is_empty() {
        return Err(ApiError::not_found(format!(
            "No databases found for company code '{}'",
            company_code
        )));
    }

    Ok(ApiResponse::success(options))
}

/// POST /auth/session - select a company database and open a session
///
/// The database must be listed for the company in the tenant directory.
/// The session cookie carries the selection; every later request is bound
/// to it by the tenant middleware.
pub async fn session_post(Json(payload): Json<SelectRequest>) -> Result<impl IntoResponse, ApiError> {
    let company_code = payload.company_code.trim();
    if company_code.is_empty() {
        return Err(ApiError::bad_request("Please enter company code"));
    }

    let username = payload.username.trim();
    let database = payload
        .database
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("Please select a database"))?;

    if username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }

    let directory = load_directory().await?;
    if !directory.contains(company_code, database) {
        tracing::warn!(
            "Rejected selection of database '{}' for company '{}'",
            database,
            company_code
        );
        return Err(ApiError::bad_request("Selected database is not valid for this company"));
    }

    // The remainder of this request already works against the selection
    context::set(database);

    let security = &config::config().security;
    let claims = SessionClaims::new(
        username.to_string(),
        company_code.to_string(),
        database.to_string(),
        security.session_expiry_hours,
    );
    let token = issue_session(&claims, &security.session_secret)?;
    let cookie = session_cookie(&token, security);

    tracing::info!("User {} selected database {} for company {}", username, database, company_code);

    let body = SelectResponse {
        token,
        user: claims.user,
        company_code: claims.company_code,
        description: directory.description_for(company_code, database),
        database: claims.selected_database,
        expires_in: security.session_expiry_hours * 3600,
    };

    Ok(([(header::SET_COOKIE, cookie)], ApiResponse::created(body)))
}

/// DELETE /auth/session - drop the session and with it the selected database
pub async fn session_delete() -> impl IntoResponse {
    let cookie = expired_session_cookie(&config::config().security);
    context::clear();
    ([(header::SET_COOKIE, cookie)], ApiResponse::success(serde_json::json!({ "logged_out": true })))
}
