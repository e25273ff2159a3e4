//! Integration tests for the inbound WhatsApp pipeline and the inbox.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{test_config, test_pool, unique_phone, TestApp, ASSISTANT_REPLY};
use domain::services::{MockMessagingGateway, MockReplyGenerator};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// AI replies and credits
// ============================================================================

#[tokio::test]
async fn test_question_gets_assistant_reply_and_costs_one_credit() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let customer = unique_phone();

    let (status, body) = app
        .inbound(agent_id, &customer, "Bonjour, vous livrez à Cocody ?")
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "replied");
    assert_eq!(body["kind"], "assistant");
    assert_eq!(body["delivered"], true);
    assert_eq!(app.credits(&tenant).await, 99);
    assert_eq!(app.replies.calls(), 1);

    let sent = app.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, customer);
    assert_eq!(sent[0].body, ASSISTANT_REPLY);
    assert_eq!(sent[0].sender_phone_number_id, "1234567890");
}

#[tokio::test]
async fn test_redelivered_message_is_ignored() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let payload = json!({
        "from": unique_phone(),
        "text": "Bonjour ?",
        "messageId": format!("wamid.{}", Uuid::new_v4())
    });
    let uri = format!("/api/v1/webhooks/whatsapp/{}", agent_id);

    let (_, first) = app
        .request(Method::POST, &uri, None, Some(payload.clone()))
        .await;
    let (status, second) = app.request(Method::POST, &uri, None, Some(payload)).await;

    assert_eq!(first["outcome"], "replied");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "duplicate");
    assert_eq!(app.gateway.sent().len(), 1);
    assert_eq!(app.credits(&tenant).await, 99);
}

#[tokio::test]
async fn test_redelivery_after_failure_is_processed() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let customer = unique_phone();
    let payload = json!({
        "from": customer,
        "text": "Quels sont vos horaires ?",
        "messageId": format!("wamid.{}", Uuid::new_v4())
    });
    let uri = format!("/api/v1/webhooks/whatsapp/{}", agent_id);

    // Opening the lead fails for this tenant
    let suffix = tenant.user_id.simple().to_string();
    sqlx::query(&format!(
        "CREATE FUNCTION fail_lead_{suffix}() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'lead store unavailable'; END $$ LANGUAGE plpgsql"
    ))
    .execute(&app.pool)
    .await
    .unwrap();
    sqlx::query(&format!(
        "CREATE TRIGGER fail_lead_{suffix} BEFORE INSERT ON leads \
         FOR EACH ROW WHEN (NEW.user_id = '{}') EXECUTE FUNCTION fail_lead_{suffix}()",
        tenant.user_id
    ))
    .execute(&app.pool)
    .await
    .unwrap();

    let (status, first) = app
        .request(Method::POST, &uri, None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(first["error"], "internal_error");
    assert!(app.gateway.sent().is_empty());

    for ddl in [
        format!("DROP TRIGGER fail_lead_{suffix} ON leads"),
        format!("DROP FUNCTION fail_lead_{suffix}()"),
    ] {
        sqlx::query(&ddl).execute(&app.pool).await.unwrap();
    }

    let (status, second) = app.request(Method::POST, &uri, None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK, "{}", second);
    assert_eq!(second["outcome"], "replied");
    assert_eq!(app.gateway.sent().len(), 1);

    let (_, leads) = app
        .request(Method::GET, "/api/v1/leads", Some(&tenant.token), None)
        .await;
    assert_eq!(leads["leads"].as_array().unwrap().len(), 1);
    assert_eq!(leads["leads"][0]["phone"], customer);

    // Only one inbound row exists, and once processed it is a plain duplicate
    let stored: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages m JOIN conversations c ON c.id = m.conversation_id \
         WHERE c.agent_id = $1 AND m.direction = 'inbound'",
    )
    .bind(agent_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(stored, 1);

    let (_, third) = app.request(Method::POST, &uri, None, Some(payload)).await;
    assert_eq!(third["outcome"], "duplicate");
    assert_eq!(app.gateway.sent().len(), 1);
    assert_eq!(app.credits(&tenant).await, 99);
}

#[tokio::test]
async fn test_no_reply_without_credits() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    app.set_credits(&tenant, 0).await;

    let (status, body) = app.inbound(agent_id, &unique_phone(), "Bonjour ?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "credits_exhausted");
    assert!(app.gateway.sent().is_empty());
    assert_eq!(app.replies.calls(), 0);
    assert_eq!(app.credits(&tenant).await, 0);
}

#[tokio::test]
async fn test_failed_generation_refunds_and_sends_fallback() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let app = TestApp::build(
        pool,
        test_config(),
        Arc::new(MockMessagingGateway::new()),
        Arc::new(MockReplyGenerator::failing()),
    );
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;

    let (_, body) = app.inbound(agent_id, &unique_phone(), "Bonjour ?").await;

    assert_eq!(body["kind"], "fallback");
    assert_eq!(app.credits(&tenant).await, 100);
    assert_eq!(app.gateway.sent()[0].body, "Un conseiller vous répond bientôt.");
}

#[tokio::test]
async fn test_paused_conversation_is_stored_without_reply() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let customer = unique_phone();

    app.inbound(agent_id, &customer, "Bonjour ?").await;
    let conversation_id = only_conversation(&app, &tenant.token).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/conversations/{}/pause", conversation_id),
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aiPaused"], true);

    let (_, body) = app.inbound(agent_id, &customer, "Vous êtes là ?").await;
    assert_eq!(body["outcome"], "stored");
    assert_eq!(app.gateway.sent().len(), 1);
}

#[tokio::test]
async fn test_unknown_agent_and_bad_sender() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;

    let (status, _) = app.inbound(Uuid::new_v4(), &unique_phone(), "Bonjour").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.inbound(agent_id, "abc", "Bonjour").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

// ============================================================================
// Orders and leads from conversations
// ============================================================================

#[tokio::test]
async fn test_order_message_creates_pending_order_and_qualified_lead() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let product_id = app.create_product(&tenant, "Savon noir", 1500, Some(10)).await;
    let customer = unique_phone();

    let (status, body) = app
        .inbound(agent_id, &customer, "Je veux 2 savon noir svp")
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["kind"], "order_summary");
    let order_id = body["orderId"].as_str().unwrap().to_string();

    // Order recaps are free
    assert_eq!(app.credits(&tenant).await, 100);
    assert!(app.gateway.sent()[0].body.contains("Savon noir"));

    let (_, order) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalCents"], 3000);
    assert_eq!(order["contactPhone"], customer);
    assert_eq!(order["items"][0]["productId"], product_id.to_string());
    assert_eq!(order["items"][0]["quantity"], 2);

    let (_, leads) = app
        .request(Method::GET, "/api/v1/leads", Some(&tenant.token), None)
        .await;
    assert_eq!(leads["leads"][0]["phone"], customer);
    assert_eq!(leads["leads"][0]["status"], "qualified");
}

#[tokio::test]
async fn test_refusal_cancels_pending_orders() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    app.create_product(&tenant, "Miel", 4000, None).await;
    let customer = unique_phone();

    let (_, body) = app.inbound(agent_id, &customer, "Je prends du miel").await;
    let order_id = body["orderId"].as_str().unwrap().to_string();

    let (_, body) = app.inbound(agent_id, &customer, "Non merci, laissez tomber").await;
    assert_eq!(body["kind"], "refusal");
    assert_eq!(
        app.gateway.sent().last().unwrap().body,
        "Très bien, bonne journée !"
    );

    let (_, order) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(order["status"], "cancelled");
}

// ============================================================================
// Inbox
// ============================================================================

#[tokio::test]
async fn test_message_history_pages_newest_first() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    app.set_credits(&tenant, 0).await;
    let customer = unique_phone();

    for text in ["un", "deux", "trois"] {
        app.inbound(agent_id, &customer, text).await;
    }
    let conversation_id = only_conversation(&app, &tenant.token).await;
    let base = format!("/api/v1/conversations/{}/messages", conversation_id);

    let (status, page) = app
        .request(Method::GET, &format!("{}?limit=2", base), Some(&tenant.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<&str> = page["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["body"].as_str())
        .collect();
    assert_eq!(bodies, vec!["trois", "deux"]);
    let cursor = page["nextCursor"].as_str().unwrap().to_string();

    let (_, page) = app
        .request(
            Method::GET,
            &format!("{}?limit=2&cursor={}", base, cursor),
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
    assert_eq!(page["messages"][0]["body"], "un");
    assert!(page.get("nextCursor").is_none());

    let (status, _) = app
        .request(
            Method::GET,
            &format!("{}?cursor=not-a-cursor", base),
            Some(&tenant.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_reply_is_free_and_reports_gateway_failure() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let gateway = Arc::new(MockMessagingGateway::new());
    let app = TestApp::build(
        pool,
        test_config(),
        gateway.clone(),
        Arc::new(MockReplyGenerator::new("ok")),
    );
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;
    let customer = unique_phone();
    app.set_credits(&tenant, 0).await;

    app.inbound(agent_id, &customer, "Bonjour").await;
    let conversation_id = only_conversation(&app, &tenant.token).await;
    let uri = format!("/api/v1/conversations/{}/reply", conversation_id);

    let (status, body) = app
        .request(
            Method::POST,
            &uri,
            Some(&tenant.token),
            Some(json!({ "body": "Bonjour, je suis Awa." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["direction"], "outbound");
    assert_eq!(gateway.sent().len(), 1);

    gateway.fail_for(&customer);
    let (status, body) = app
        .request(
            Method::POST,
            &uri,
            Some(&tenant.token),
            Some(json!({ "body": "Vous êtes toujours là ?" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "bad_gateway");
}

// ============================================================================
// Signatures
// ============================================================================

#[tokio::test]
async fn test_webhook_signature_is_enforced_when_configured() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let mut config = test_config();
    config.whatsapp.webhook_secret = "s3cret".to_string();
    let app = TestApp::build(
        pool,
        config,
        Arc::new(MockMessagingGateway::new()),
        Arc::new(MockReplyGenerator::new("ok")),
    );
    let tenant = app.register().await;
    let agent_id = app.create_agent(&tenant).await;

    let payload = json!({
        "from": unique_phone(),
        "text": "Bonjour",
        "messageId": format!("wamid.{}", Uuid::new_v4())
    })
    .to_string();
    let uri = format!("/api/v1/webhooks/whatsapp/{}", agent_id);

    let (status, _) = app
        .request(
            Method::POST,
            &uri,
            None,
            Some(serde_json::from_str(&payload).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut mac = Hmac::<Sha256>::new_from_slice(b"s3cret").unwrap();
    mac.update(payload.as_bytes());
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let request = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Signature-256", signature)
        .body(Body::from(payload))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn only_conversation(app: &TestApp, token: &str) -> String {
    let (status, body): (StatusCode, Value) = app
        .request(Method::GET, "/api/v1/conversations", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    conversations[0]["conversationId"].as_str().unwrap().to_string()
}
