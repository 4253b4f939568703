//! HTTP service end to end: router, gateway, scripted model and store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use std::sync::Arc;
use tower::ServiceExt;

use errand_pricer::pricing::{GatewayConfig, PriceEstimationGateway};
use errand_pricer::server::{build_router, AppState, ServiceState};
use errand_pricer::storage::RequestStore;
use errand_pricer::types::{PricingMode, RequestStatus};

use crate::mock_model::ScriptedModel;

fn app_state(model: &ScriptedModel, mode: PricingMode, store: Option<RequestStore>) -> AppState {
    let gateway =
        PriceEstimationGateway::new(Arc::new(model.clone()), GatewayConfig::new(mode)).unwrap();
    Arc::new(ServiceState::new(gateway, store))
}

fn post(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/estimate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn grocery() -> Value {
    json!({
        "taskType": "Grocery shopping",
        "pickupLocation": "Westlands Mall",
        "dropoffLocation": "My home address",
        "notes": "2 litres of milk",
        "budgetEstimate": "Ksh 500 - Ksh 800"
    })
}

#[tokio::test]
async fn test_estimates_are_stored_and_listed_newest_first() {
    let store = RequestStore::in_memory().await.unwrap();
    let model = ScriptedModel::answering("Ksh 600 - Ksh 750", "Share a list.");
    let app = build_router(app_state(&model, PricingMode::BudgetAnchored, Some(store.clone())));

    let mut ids = Vec::new();
    for _ in 0..3 {
        let resp = app.clone().oneshot(post(grocery())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        ids.push(read_json(resp).await["requestId"].as_str().unwrap().to_string());
    }

    assert!(store.update_status(&ids[0], RequestStatus::Completed).await.unwrap());

    let resp = app.oneshot(get("/api/requests")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list = read_json(resp).await;
    let listed: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, [ids[2].as_str(), ids[1].as_str(), ids[0].as_str()]);
    assert_eq!(list[2]["status"], "completed");
    assert_eq!(list[0]["notes"], "2 litres of milk");
    assert_eq!(list[0]["recommendedPriceRange"], "Ksh 600 - Ksh 750");
}

#[tokio::test]
async fn test_market_rate_form_over_http() {
    let store = RequestStore::in_memory().await.unwrap();
    let model = ScriptedModel::answering("Ksh 300 - Ksh 400", "Carry the bill.");
    let app = build_router(app_state(&model, PricingMode::MarketRate, Some(store)));

    let resp = app
        .clone()
        .oneshot(post(json!({
            "taskType": "Paying bills",
            "pickupLocation": "-1.28300, 36.81700",
            "dropoffLocation": "-1.31300, 36.83900",
            "dispatcherName": "W"
        })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(resp).await;
    let messages: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["message"].as_str().unwrap())
        .collect();
    assert_eq!(
        messages,
        [
            "Name must be at least 2 characters.",
            "Phone number must be at least 10 characters."
        ]
    );
    assert_eq!(model.calls(), 0);

    let resp = app
        .oneshot(post(json!({
            "taskType": "Paying bills",
            "pickupLocation": "-1.28300, 36.81700",
            "dropoffLocation": "-1.31300, 36.83900",
            "budgetEstimate": "Ksh 50",
            "dispatcherName": "Wanjiru",
            "dispatcherPhone": "0712345678"
        })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(model.calls(), 1);
    assert!(!model.prompts()[0].user.contains("Budget Estimate"));
}

#[tokio::test]
async fn test_upstream_outage_stores_nothing() {
    let store = RequestStore::in_memory().await.unwrap();
    let model = ScriptedModel::unreachable();
    let app = build_router(app_state(&model, PricingMode::BudgetAnchored, Some(store.clone())));

    let resp = app.oneshot(post(grocery())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(store.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_only_store_surfaces_permission_guidance() {
    let path = std::env::temp_dir().join(format!("errand_pricer_it_{}.db", uuid::Uuid::new_v4()));
    RequestStore::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap()
        .close()
        .await;

    let read_only = SqliteConnectOptions::new().filename(&path).read_only(true);
    let store = RequestStore::connect_with(read_only, 1).await.unwrap();
    let model = ScriptedModel::answering("Ksh 600 - Ksh 750", "Share a list.");
    let app = build_router(app_state(&model, PricingMode::BudgetAnchored, Some(store.clone())));

    let resp = app.oneshot(post(grocery())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(resp).await;
    assert_eq!(body["error"], "permission_denied");
    assert!(body["message"].as_str().unwrap().contains("requests"));

    store.close().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_without_store_estimates_have_no_request_id() {
    let model = ScriptedModel::answering("Ksh 600 - Ksh 750", "Share a list.");
    let app = build_router(app_state(&model, PricingMode::BudgetAnchored, None));

    let resp = app.clone().oneshot(post(grocery())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(read_json(resp).await.get("requestId").is_none());

    let resp = app.oneshot(get("/api/requests?limit=3")).await.unwrap();
    assert_eq!(read_json(resp).await, json!([]));
}
