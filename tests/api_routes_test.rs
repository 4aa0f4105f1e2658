//! HTTP surface exercised through the full middleware stack

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use hazard::{
    api::{handlers::AppState, server::create_app, WebSocketManager},
    config::HazardConfig,
    context::{GameContext, SharedRng},
    games::types::{Money, User},
    store::{MemoryStore, Store},
    testing::{RecordingScheduler, ScriptedRng},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    for (id, name) in [("u1", "alice"), ("u2", "bob")] {
        store
            .save_user(&User::new(id, name, Money::from_cents(10_000)))
            .expect("seed");
    }

    let config = HazardConfig::testing();
    let server_config = config.server.clone();
    let websocket_manager = Arc::new(WebSocketManager::new());
    let ctx = GameContext::new(
        config,
        store.clone(),
        websocket_manager.clone(),
        Arc::new(RecordingScheduler::new()),
        SharedRng::new(ScriptedRng::new(vec![0.3])),
    )
    .expect("context");

    let state = Arc::new(AppState::new(ctx, websocket_manager));
    (create_app(state, &server_config), store)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn upload_case(app: &Router) -> String {
    let (status, case) = call(
        app,
        "POST",
        "/uploadCase",
        Some(json!({
            "name": "Starter",
            "type": "standard",
            "image": "/cases/starter.png",
            "items": [
                {"name": "AK", "price": 8.0, "chance": 50, "rarity": "rare", "image": ""},
                {"name": "Sticker", "price": 2.0, "chance": 50, "rarity": "common", "image": ""}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(case["casePrice"], json!(5.75));
    case["_id"].as_str().expect("case id").to_string()
}

#[tokio::test]
async fn test_health_sets_request_id() {
    let (app, _) = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let (_, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(body["status"], "Running");
    assert_eq!(body["active_battles"], 0);
}

#[tokio::test]
async fn test_bet_accepts_and_rejects() {
    let (app, store) = app();

    let (status, receipt) = call(
        &app,
        "POST",
        "/bet",
        Some(json!({"userId": "u1", "color": "red", "amount": "12.50"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["newBalance"], json!(87.5));
    assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(8_750));

    let (status, err) = call(
        &app,
        "POST",
        "/bet",
        Some(json!({"userId": "u1", "color": "blue", "amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "BAD_REQUEST");
    assert!(err["request_id"].is_string());

    let (status, _) = call(
        &app,
        "POST",
        "/bet",
        Some(json!({"userId": "ghost", "color": "red", "amount": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, snapshot) = call(&app, "GET", "/fetchRouletteData", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["redBets"].as_array().map(Vec::len), Some(1));
    assert_eq!(snapshot["lastNumbers"], json!([0]));
    assert_eq!(snapshot["timeToSpin"], 15_000);
}

#[tokio::test]
async fn test_case_open_sell_and_history() {
    let (app, _) = app();
    let case_id = upload_case(&app).await;

    let (status, opening) = call(
        &app,
        "POST",
        &format!("/cases/{}/open", case_id),
        Some(json!({"userId": "u1", "numCases": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let skins = opening["skins"].as_array().expect("skins");
    assert_eq!(skins.len(), 2);
    // 0.3 of the weight lands on the first item
    assert_eq!(skins[0]["name"], "AK");
    assert_eq!(opening["newBalance"], json!(88.5));

    let (status, _) = call(
        &app,
        "POST",
        &format!("/cases/{}/open", case_id),
        Some(json!({"userId": "u1", "numCases": 1_000_000_000u64})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let item_id = skins[0]["_id"].as_str().unwrap().to_string();
    let (status, sale) = call(&app, "POST", "/user/u1/sell", Some(json!({"itemId": item_id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sale["newBalance"], json!(96.5));

    let (status, _) = call(&app, "POST", "/user/u1/sell", Some(json!({"itemId": item_id}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, history) = call(&app, "GET", "/user/u1/inventoryHistory", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["status"], "sold");

    let (status, _) = call(&app, "GET", "/cases/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_battle_routes_map_errors() {
    let (app, _) = app();
    let case_id = upload_case(&app).await;
    let create = json!({
        "userId": "u1",
        "selectedCases": [{"_id": case_id}, case_id],
        "battleType": "Standard",
        "battleMode": "1v1v1",
        "battleVisibility": "public"
    });

    let (status, battle) = call(&app, "POST", "/createBattle", Some(create.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(battle["battleCost"], json!(11.5));
    let battle_id = battle["_id"].as_str().unwrap().to_string();

    let (status, err) = call(&app, "POST", "/createBattle", Some(create)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(err["error"]["details"]["retryAfterMs"].as_u64().unwrap() > 0);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/addBot/{}", battle_id),
        Some(json!({"user": "u2", "index": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/joinBattle/{}", battle_id),
        Some(json!({"userId": "u2", "index": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/joinBattle/{}", battle_id),
        Some(json!({"userId": "u2", "index": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = call(&app, "GET", "/battles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["users"][0]["username"], "alice");
    assert!(listed[0]["users"][1].is_null());

    let (status, details) = call(&app, "GET", &format!("/battle/{}", battle_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["source"], "server");
    assert_eq!(details["SkinsCases"].as_array().map(Vec::len), Some(1));

    let (status, _) = call(&app, "GET", "/battle/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        "POST",
        "/createBattle",
        Some(json!({
            "userId": "u2",
            "selectedCases": [case_id],
            "battleType": "Mega",
            "battleMode": "1v1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (app, _) = app();
    call(
        &app,
        "POST",
        "/bet",
        Some(json!({"userId": "u1", "color": "black", "amount": "1"})),
    )
    .await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("hazard_bets_placed_total 1"));
    assert!(text.contains("hazard_websocket_connections 0"));
}
