//! Integration tests for the price catalog
//!
//! These tests drive the service end to end over in-memory stores with a
//! manual clock, and exercise the HTTP routers with `oneshot` requests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use price_catalog::api::{create_api_router, ApiState, PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
use price_catalog::config::ModerationConfig;
use price_catalog::{
    BlockKind, BlockRequest, CatalogError, CatalogService, ContributionDraft, ContributionStatus,
    ManualClock, MemoryNotifier, NotificationDispatcher, NotificationEvent, PriceSource, Principal,
    Repositories,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

struct Harness {
    service: CatalogService,
    clock: Arc<ManualClock>,
    notifier: MemoryNotifier,
    admin: Principal,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let notifier = MemoryNotifier::new();
    let service = CatalogService::new(
        Repositories::in_memory(),
        &ModerationConfig::default(),
        clock.clone(),
        NotificationDispatcher::new(Arc::new(notifier.clone())),
    );

    Harness {
        service,
        clock,
        notifier,
        admin: Principal::admin(Uuid::new_v4()),
    }
}

fn draft(product: Uuid, market: Uuid, price: f64) -> ContributionDraft {
    ContributionDraft::new(product.to_string(), market.to_string(), price)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, principal: Option<&Principal>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(p) = principal {
        builder = builder
            .header(PRINCIPAL_ID_HEADER, p.id.to_string())
            .header(PRINCIPAL_ROLE_HEADER, p.role.to_string());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

// ============================================================================
// Moderation Tests
// ============================================================================

#[tokio::test]
async fn test_third_consecutive_rejection_blocks_client() {
    let h = harness();
    let account = h
        .service
        .register_client("Carla", "75 91234-5678")
        .await
        .unwrap();
    let client = Principal::client(account.id);
    let (product, market) = (Uuid::new_v4(), Uuid::new_v4());

    for round in 1..=3 {
        let c = h
            .service
            .submit_contribution(&client, draft(product, market, 4.99))
            .await
            .unwrap();
        let report = h
            .service
            .reject_contribution(&h.admin, c.id, "price does not match shelf label")
            .await
            .unwrap();

        let trust = report.client_trust.unwrap();
        assert_eq!(trust.consecutive_errors, round);
        assert_eq!(trust.total_rejected, round as u64);
        assert_eq!(report.auto_blocked, round == 3);
    }

    let trust = h.service.get_client(&h.admin, account.id).await.unwrap().trust;
    assert!(trust.blocked);
    assert_eq!(trust.block_kind, BlockKind::Automatic);
    assert!(trust
        .block_reason
        .as_deref()
        .unwrap()
        .contains("price does not match shelf label"));

    // Rejections never touch the price table
    assert!(matches!(
        h.service.get_price(product, market).await,
        Err(CatalogError::NotFound { .. })
    ));

    // Blocked clients cannot submit
    assert!(matches!(
        h.service
            .submit_contribution(&client, draft(product, market, 5.0))
            .await,
        Err(CatalogError::Forbidden(_))
    ));

    // 3 submissions + 3 rejections + 1 auto-block
    let events = h.notifier.wait_for(7).await;
    let auto_blocks = events
        .iter()
        .filter(|e| matches!(e, NotificationEvent::ClientAutoBlocked { .. }))
        .count();
    assert_eq!(auto_blocks, 1);
}

#[tokio::test]
async fn test_approval_overwrites_price_and_resets_streak() {
    let h = harness();
    let account = h.service.register_client("Davi", "75 3333-4444").await.unwrap();
    let client = Principal::client(account.id);
    let (product, market) = (Uuid::new_v4(), Uuid::new_v4());

    let rejected = h
        .service
        .submit_contribution(&client, draft(product, market, 1.0))
        .await
        .unwrap();
    h.service
        .reject_contribution(&h.admin, rejected.id, "typo")
        .await
        .unwrap();

    for price in [7.49, 6.99] {
        let c = h
            .service
            .submit_contribution(&client, draft(product, market, price))
            .await
            .unwrap();
        let report = h.service.approve_contribution(&h.admin, c.id).await.unwrap();
        assert_eq!(report.contribution.status, ContributionStatus::Approved);
        assert_eq!(report.client_trust.unwrap().consecutive_errors, 0);

        let entry = h.service.get_price(product, market).await.unwrap();
        assert_eq!(entry.price, price);
        assert_eq!(entry.source, PriceSource::Client);
        assert_eq!(entry.author, account.id);
    }

    let trust = h.service.get_client(&client, account.id).await.unwrap().trust;
    assert_eq!(trust.total_approved, 2);
    assert_eq!(trust.total_rejected, 1);
}

#[tokio::test]
async fn test_decided_contribution_cannot_be_decided_again() {
    let h = harness();
    let account = h.service.register_client("Eva", "11 5555-6666").await.unwrap();
    let client = Principal::client(account.id);
    let (product, market) = (Uuid::new_v4(), Uuid::new_v4());

    let c = h
        .service
        .submit_contribution(&client, draft(product, market, 3.25))
        .await
        .unwrap();
    h.service.approve_contribution(&h.admin, c.id).await.unwrap();

    let other_admin = Principal::admin(Uuid::new_v4());
    assert!(matches!(
        h.service.approve_contribution(&other_admin, c.id).await,
        Err(CatalogError::AlreadyDecided { .. })
    ));
    assert!(matches!(
        h.service.reject_contribution(&other_admin, c.id, "late").await,
        Err(CatalogError::AlreadyDecided { .. })
    ));

    let trust = h.service.get_client(&h.admin, account.id).await.unwrap().trust;
    assert_eq!(trust.total_approved, 1);
    assert_eq!(trust.total_rejected, 0);
    assert_eq!(trust.consecutive_errors, 0);

    let stored = h.service.get_contribution(&h.admin, c.id).await.unwrap();
    assert_eq!(stored.decided_by, Some(h.admin.id));
}

// ============================================================================
// Blacklist Tests
// ============================================================================

#[tokio::test]
async fn test_terminated_contact_can_register_after_window() {
    let h = harness();
    let account = h.service.register_client("Fabio", "75988887777").await.unwrap();

    let entry = h
        .service
        .terminate_client(&h.admin, account.id, "fraudulent submissions")
        .await
        .unwrap();
    assert_eq!(entry.contact, "75988887777");
    assert!(h
        .service
        .is_contact_blacklisted(&h.admin, "(75) 98888-7777")
        .await
        .unwrap());

    assert!(matches!(
        h.service.register_client("Fabio", "(75) 98888-7777").await,
        Err(CatalogError::Conflict(_))
    ));
    assert!(matches!(
        h.service.get_client(&h.admin, account.id).await,
        Err(CatalogError::NotFound { .. })
    ));

    // No sweep has run; expiry alone lifts the block
    h.clock.advance(Duration::days(61));
    assert!(!h
        .service
        .is_contact_blacklisted(&h.admin, "75988887777")
        .await
        .unwrap());
    let again = h
        .service
        .register_client("Fabio", "(75) 98888-7777")
        .await
        .unwrap();
    assert_eq!(again.contact, "75988887777");
    assert_ne!(again.id, account.id);
}

#[tokio::test]
async fn test_punctuation_does_not_bypass_blacklist() {
    let h = harness();
    let account = h.service.register_client("Gil", "(75) 99999-0000").await.unwrap();
    h.service
        .terminate_client(&h.admin, account.id, "abuse")
        .await
        .unwrap();

    for variant in ["75999990000", "75 99999 0000", "+75.99999.0000"] {
        assert!(matches!(
            h.service.register_client("Gil", variant).await,
            Err(CatalogError::Conflict(_))
        ));
    }
}

#[tokio::test]
async fn test_sweep_and_release() {
    let h = harness();
    let first = h.service.register_client("Hugo", "111 1111").await.unwrap();
    let second = h.service.register_client("Iris", "222 2222").await.unwrap();

    let old = h
        .service
        .terminate_client(&h.admin, first.id, "spam")
        .await
        .unwrap();
    h.clock.advance(Duration::days(40));
    let recent = h
        .service
        .terminate_client(&h.admin, second.id, "spam")
        .await
        .unwrap();

    // Only the first entry has passed its two months
    h.clock.advance(Duration::days(25));
    assert_eq!(h.service.run_expiry_sweep(&h.admin).await.unwrap(), 1);
    assert_eq!(h.service.run_expiry_sweep(&h.admin).await.unwrap(), 0);

    let active = h.service.list_blacklist(&h.admin).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, recent.id);
    assert_ne!(active[0].id, old.id);

    let released = h
        .service
        .release_blacklist_entry(&h.admin, recent.id)
        .await
        .unwrap();
    assert!(!released.active);
    assert!(released.released_at.is_some());
    h.service.register_client("Iris", "2222222").await.unwrap();
}

#[tokio::test]
async fn test_unblock_restores_submission() {
    let h = harness();
    let account = h.service.register_client("Joana", "71 4444-0000").await.unwrap();
    let client = Principal::client(account.id);

    h.service
        .block_client(
            &h.admin,
            account.id,
            BlockRequest::Temporary {
                days: 7,
                reason: "cooling off".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(matches!(
        h.service
            .submit_contribution(&client, draft(Uuid::new_v4(), Uuid::new_v4(), 2.0))
            .await,
        Err(CatalogError::Forbidden(_))
    ));

    let trust = h.service.unblock_client(&h.admin, account.id).await.unwrap();
    assert!(!trust.blocked);
    assert_eq!(trust.block_kind, BlockKind::None);
    h.service
        .submit_contribution(&client, draft(Uuid::new_v4(), Uuid::new_v4(), 2.0))
        .await
        .unwrap();
}

// ============================================================================
// API Tests
// ============================================================================

#[tokio::test]
async fn test_api_moderation_flow() {
    let h = harness();
    let app = create_api_router(ApiState::new(h.service.clone()));

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/clients/register",
            None,
            Some(json!({ "name": "Kleber", "contact": "(75) 3222-1100" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let account = body_json(response).await;
    let client = Principal::client(Uuid::parse_str(account["id"].as_str().unwrap()).unwrap());

    let (product, market) = (Uuid::new_v4(), Uuid::new_v4());
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/contributions",
            Some(&client),
            Some(json!({
                "product_id": product.to_string(),
                "market_id": market.to_string(),
                "price": 12.5
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let contribution = body_json(response).await;
    assert_eq!(contribution["status"], "pending");
    let id = contribution["id"].as_str().unwrap().to_string();

    // Clients cannot moderate
    let response = app
        .clone()
        .oneshot(request("POST", &format!("/contributions/{}/approve", id), Some(&client), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request("POST", &format!("/contributions/{}/approve", id), Some(&h.admin), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["contribution"]["status"], "approved");

    let response = app
        .clone()
        .oneshot(request("POST", &format!("/contributions/{}/approve", id), Some(&h.admin), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "already_decided");

    // Prices are public
    let response = app
        .oneshot(request("GET", &format!("/prices/{}/{}", product, market), None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let price = body_json(response).await;
    assert_eq!(price["price"], 12.5);
    assert_eq!(price["source"], "client");
}

#[tokio::test]
async fn test_api_requires_principal() {
    let h = harness();
    let app = create_api_router(ApiState::new(h.service));

    let response = app
        .clone()
        .oneshot(request("GET", "/contributions", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthenticated");

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_terminate_and_check() {
    let h = harness();
    let app = create_api_router(ApiState::new(h.service.clone()));
    let account = h.service.register_client("Lia", "75988887777").await.unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/clients/{}", account.id),
            Some(&h.admin),
            Some(json!({ "reason": "fake receipts" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/blacklist/check/(75)%2098888-7777",
            Some(&h.admin),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let check = body_json(response).await;
    assert_eq!(check["contact"], "75988887777");
    assert_eq!(check["blacklisted"], true);

    let response = app
        .oneshot(request(
            "POST",
            "/clients/register",
            None,
            Some(json!({ "name": "Lia", "contact": "(75) 98888-7777" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_api_rejects_oversized_block_duration() {
    let h = harness();
    let app = create_api_router(ApiState::new(h.service.clone()));
    let account = h.service.register_client("Rui", "75977776666").await.unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/clients/{}/block", account.id),
            Some(&h.admin),
            Some(json!({ "kind": "temporary", "days": u32::MAX, "reason": "spam" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");

    let response = app
        .oneshot(request(
            "POST",
            &format!("/clients/{}/block", account.id),
            Some(&h.admin),
            Some(json!({ "kind": "temporary", "days": 30, "reason": "spam" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
