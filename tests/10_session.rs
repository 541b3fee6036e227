mod common;

use anyhow::Result;
use axum::http::{Request, StatusCode};
use serde_json::json;

#[tokio::test]
async fn lists_databases_for_company() -> Result<()> {
    let res = common::send(common::get("/auth/databases?company_code=ACME", None)).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(
        res.body["data"],
        json!([
            { "value": "acme_co", "label": "Acme Trading LLC" },
            { "value": "acme_archive", "label": "Acme archive" }
        ])
    );
    Ok(())
}

#[tokio::test]
async fn database_listing_requires_known_company() -> Result<()> {
    let missing = common::send(common::get("/auth/databases", None)).await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "Company code is required");

    let unknown = common::send(common::get("/auth/databases?company_code=INITECH", None)).await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["success"], false);
    Ok(())
}

#[tokio::test]
async fn selecting_a_database_issues_session_cookie() -> Result<()> {
    let res = common::send(common::post_json(
        "/auth/session",
        json!({ "company_code": "ACME", "database": "acme_co", "username": "alice" }),
    ))
    .await?;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["database"], "acme_co");
    assert_eq!(res.body["data"]["description"], "Acme Trading LLC");
    assert!(res.body["data"]["token"].as_str().is_some());

    let cookie = res.set_cookie.expect("session cookie");
    assert!(cookie.starts_with("ledger_session="));
    assert!(cookie.contains("HttpOnly"));
    Ok(())
}

#[tokio::test]
async fn selection_must_belong_to_company() -> Result<()> {
    let res = common::send(common::post_json(
        "/auth/session",
        json!({ "company_code": "GLOBEX", "database": "acme_co", "username": "alice" }),
    ))
    .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Selected database is not valid for this company");
    assert!(res.set_cookie.is_none());

    let res = common::send(common::post_json(
        "/auth/session",
        json!({ "company_code": "ACME", "username": "alice" }),
    ))
    .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Please select a database");
    Ok(())
}

#[tokio::test]
async fn selection_requires_company_code() -> Result<()> {
    let res = common::send(common::post_json(
        "/auth/session",
        json!({ "company_code": "  ", "database": "acme_co", "username": "alice" }),
    ))
    .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Please enter company code");
    assert!(res.set_cookie.is_none());
    Ok(())
}

#[tokio::test]
async fn logout_expires_the_cookie() -> Result<()> {
    let request = Request::builder()
        .method("DELETE")
        .uri("/auth/session")
        .body(axum::body::Body::empty())?;
    let res = common::send(request).await?;

    assert_eq!(res.status, StatusCode::OK);
    let cookie = res.set_cookie.expect("expired cookie");
    assert!(cookie.starts_with("ledger_session=;"));
    assert!(cookie.contains("Max-Age=0"));
    Ok(())
}
