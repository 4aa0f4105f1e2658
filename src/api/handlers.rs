//! Request Handlers
//!
//! Thin adapters from HTTP to the game services. Every handler extracts the
//! request id so errors can be correlated with the trace log.

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
    websocket::WebSocketManager,
};
use crate::{
    context::GameContext,
    errors::HazardError,
    games::{
        battle::Battle,
        battle_engine::{BattleDetails, BattleView},
        cases::{CaseOpening, NewCase, SaleReceipt},
        roulette::{BetReceipt, RouletteSnapshot},
        types::{Case, HistoryEntry},
        BattleEngine, CaseService, RouletteTable,
    },
    metrics::GameMetrics,
};
use axum::{
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub roulette: Arc<RouletteTable>,
    pub battles: Arc<BattleEngine>,
    pub cases: Arc<CaseService>,
    pub websocket_manager: Arc<WebSocketManager>,
    pub metrics: GameMetrics,
    pub metrics_enabled: bool,
    pub version: String,
}

impl AppState {
    /// Build every game service from one context
    pub fn new(ctx: GameContext, websocket_manager: Arc<WebSocketManager>) -> Self {
        Self {
            roulette: Arc::new(RouletteTable::new(ctx.clone())),
            battles: BattleEngine::new(ctx.clone()),
            cases: Arc::new(CaseService::new(ctx.clone())),
            websocket_manager,
            metrics_enabled: ctx.config.monitoring.enable_metrics,
            metrics: ctx.metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn game_error(request_id: RequestId) -> impl FnOnce(HazardError) -> ApiError {
    move |err| ApiError::from_hazard(request_id.0, err)
}

/// Health check handler
/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        active_battles: state.battles.active_count(),
        websocket_clients: state.websocket_manager.client_count(),
    })
}

/// Prometheus text exposition
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    state
        .metrics
        .websocket_connections
        .set(state.websocket_manager.client_count() as i64);

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

/// Place a roulette bet
/// POST /bet
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BetRequest>,
) -> Result<Json<BetReceipt>, ApiError> {
    let receipt = state
        .roulette
        .submit_bet(&body.user_id, &body.color, &body.amount_text())
        .map_err(game_error(request_id))?;
    Ok(Json(receipt))
}

/// Current round state for late joiners
/// GET /fetchRouletteData
pub async fn roulette_data_handler(
    State(state): State<Arc<AppState>>,
) -> Json<RouletteSnapshot> {
    Json(state.roulette.snapshot())
}

/// POST /uploadCase
pub async fn upload_case_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewCase>,
) -> Result<Json<Case>, ApiError> {
    let case = state.cases.upload_case(body).map_err(game_error(request_id))?;
    Ok(Json(case))
}

/// GET /cases/:id
pub async fn get_case_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
) -> Result<Json<Case>, ApiError> {
    let case = state.cases.get_case(&case_id).map_err(game_error(request_id))?;
    Ok(Json(case))
}

/// POST /cases/:id/open
pub async fn open_case_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
    Json(body): Json<OpenCaseRequest>,
) -> Result<Json<CaseOpening>, ApiError> {
    let opening = state
        .cases
        .open_case(&case_id, &body.user_id, body.num_cases)
        .map_err(game_error(request_id))?;
    Ok(Json(opening))
}

/// POST /user/:id/sell
pub async fn sell_item_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<SellRequest>,
) -> Result<Json<SaleReceipt>, ApiError> {
    let receipt = state
        .cases
        .sell_item(&user_id, &body.item_id)
        .map_err(game_error(request_id))?;
    Ok(Json(receipt))
}

/// POST /user/:id/sellAll
pub async fn sell_all_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<SellAllRequest>,
) -> Result<Json<SaleReceipt>, ApiError> {
    let receipt = state
        .cases
        .sell_items(&user_id, &body.item_ids)
        .map_err(game_error(request_id))?;
    Ok(Json(receipt))
}

/// GET /user/:id/inventoryHistory
pub async fn inventory_history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let history = state
        .cases
        .inventory_history(&user_id)
        .map_err(game_error(request_id))?;
    Ok(Json(history))
}

/// POST /createBattle
pub async fn create_battle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBattleRequest>,
) -> Result<Json<Battle>, ApiError> {
    let command = body
        .into_command()
        .map_err(|e| ApiError::from_hazard(request_id.0.clone(), e.into()))?;
    let battle = state
        .battles
        .create_battle(command)
        .map_err(game_error(request_id))?;
    Ok(Json(battle))
}

/// Active battles with resolved rosters
/// GET /battles
pub async fn list_battles_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BattleView>>, ApiError> {
    let battles = state.battles.list_active().map_err(game_error(request_id))?;
    Ok(Json(battles))
}

/// GET /battle/:id
pub async fn get_battle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(battle_id): Path<String>,
) -> Result<Json<BattleDetails>, ApiError> {
    let details = state
        .battles
        .get_battle(&battle_id)
        .map_err(game_error(request_id))?;
    Ok(Json(details))
}

/// POST /joinBattle/:id
pub async fn join_battle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(battle_id): Path<String>,
    Json(body): Json<SeatRequest>,
) -> Result<Json<Battle>, ApiError> {
    let battle = state
        .battles
        .join_battle(&battle_id, &body.user_id, body.index)
        .map_err(game_error(request_id))?;
    Ok(Json(battle))
}

/// POST /addBot/:id
pub async fn add_bot_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(battle_id): Path<String>,
    Json(body): Json<SeatRequest>,
) -> Result<Json<Battle>, ApiError> {
    let battle = state
        .battles
        .add_bot(&battle_id, &body.user_id, body.index)
        .map_err(game_error(request_id))?;
    Ok(Json(battle))
}
