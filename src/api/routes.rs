//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(websocket_handler))

        // Roulette
        .route("/bet", post(place_bet_handler))
        .route("/fetchRouletteData", get(roulette_data_handler))

        // Cases and inventory
        .route("/uploadCase", post(upload_case_handler))
        .route("/cases/:id", get(get_case_handler))
        .route("/cases/:id/open", post(open_case_handler))
        .route("/user/:id/sell", post(sell_item_handler))
        .route("/user/:id/sellAll", post(sell_all_handler))
        .route("/user/:id/inventoryHistory", get(inventory_history_handler))

        // Battles
        .route("/createBattle", post(create_battle_handler))
        .route("/battles", get(list_battles_handler))
        .route("/battle/:id", get(get_battle_handler))
        .route("/joinBattle/:id", post(join_battle_handler))
        .route("/addBot/:id", post(add_bot_handler))

        .with_state(state)
}
