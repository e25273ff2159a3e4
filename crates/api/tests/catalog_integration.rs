//! Integration tests for agents, products and tenant isolation.

mod common;

use axum::http::{Method, StatusCode};
use common::{unique_phone, TestApp};
use serde_json::json;

// ============================================================================
// Agents
// ============================================================================

#[tokio::test]
async fn test_create_agent_normalizes_phone() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let raw = unique_phone();
    let spaced = format!("00{} {}", &raw[1..6], &raw[6..]);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/agents",
            Some(&tenant.token),
            Some(json!({
                "name": "Awa",
                "phoneNumber": spaced,
                "whatsappPhoneNumberId": "1234567890"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["phoneNumber"], raw);
    assert_eq!(body["language"], "fr");
    assert_eq!(body["autoReply"], true);
}

#[tokio::test]
async fn test_free_plan_allows_one_agent() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    app.create_agent(&tenant).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/agents",
            Some(&tenant.token),
            Some(json!({
                "name": "Second",
                "phoneNumber": unique_phone(),
                "whatsappPhoneNumberId": "987"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_update_and_delete_agent() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let uri = format!("/api/v1/agents/{}", agent_id);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&tenant.token),
            Some(json!({ "name": "Awa 2", "autoReply": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Awa 2");
    assert_eq!(body["autoReply"], false);

    let (status, _) = app
        .request(Method::DELETE, &uri, Some(&tenant.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.request(Method::GET, &uri, Some(&tenant.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agents_are_tenant_scoped() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let owner = app.register().await;
    let other = app.register().await;
    let agent_id = app.create_agent(&owner).await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/agents/{}", agent_id),
            Some(&other.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = app
        .request(Method::GET, "/api/v1/agents", Some(&other.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["agents"].as_array().unwrap().is_empty());
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
async fn test_product_lifecycle() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let product_id = app.create_product(&tenant, "  Savon noir ", 1500, Some(10)).await;
    let uri = format!("/api/v1/products/{}", product_id);

    let (status, body) = app
        .request(Method::GET, "/api/v1/products", Some(&tenant.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let products = body["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["name"], "Savon noir");
    assert_eq!(products[0]["currency"], "XOF");

    // null stops stock tracking
    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&tenant.token),
            Some(json!({ "priceCents": 1800, "stock": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["priceCents"], 1800);
    assert!(body["stock"].is_null());

    let (status, _) = app
        .request(Method::DELETE, &uri, Some(&tenant.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .request(Method::GET, "/api/v1/products", Some(&tenant.token), None)
        .await;
    assert!(body["products"].as_array().unwrap().is_empty());

    let (_, body) = app
        .request(
            Method::GET,
            "/api/v1/products?includeInactive=true",
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(body["products"][0]["active"], false);
}

#[tokio::test]
async fn test_product_validation() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&tenant.token),
            Some(json!({ "name": "Miel", "priceCents": -5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "price_cents");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&tenant.token),
            Some(json!({ "name": "Miel", "priceCents": 500, "stock": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn test_stats_for_new_tenant() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    app.create_agent(&tenant).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/stats", Some(&tenant.token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"], 1);
    assert_eq!(body["ordersPending"], 0);
    assert_eq!(body["credits"], 100);
    assert_eq!(body["conversionRatePercent"], 0);
}
