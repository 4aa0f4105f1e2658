//! HTTP and WebSocket surface
//!
//! REST endpoints for bets, cases and battles plus a websocket gateway that
//! implements the game `Notifier`.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::HazardServer;
pub use websocket::WebSocketManager;
