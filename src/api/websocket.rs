//! WebSocket gateway for live game events
//!
//! Every socket receives the broadcast stream (round clock, bet book,
//! battle updates). A socket that sends `{"id": "<participant>"}` is also
//! registered for directed events such as balance updates. Directed events
//! for a participant with no open socket are dropped.

use super::handlers::AppState;
use crate::notify::{Event, Notifier};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const BROADCAST_CAPACITY: usize = 1024;
const WELCOME: &str = r#"{"message":"Welcome!"}"#;

/// Registration message a client sends after connecting
#[derive(Debug, Deserialize)]
struct Registration {
    id: String,
}

type ClientSenders = HashMap<String, mpsc::UnboundedSender<String>>;

/// WebSocket connection manager
#[derive(Clone)]
pub struct WebSocketManager {
    /// Serialized broadcast events
    tx: broadcast::Sender<String>,

    /// Connected clients counter
    client_count: Arc<AtomicU64>,

    /// participant id -> (client id -> outbound queue)
    participants: Arc<DashMap<String, ClientSenders>>,
}

impl Default for WebSocketManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketManager {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            tx,
            client_count: Arc::new(AtomicU64::new(0)),
            participants: Arc::new(DashMap::new()),
        }
    }

    /// Handle WebSocket upgrade
    pub fn handle_upgrade(&self, ws: WebSocketUpgrade) -> Response {
        let manager = self.clone();
        ws.on_upgrade(move |socket| async move { manager.handle_connection(socket).await })
    }

    /// Subscribe to the raw broadcast stream
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::SeqCst)
    }

    /// Number of participants with at least one registered socket
    pub fn registered_count(&self) -> usize {
        self.participants.len()
    }

    pub(crate) fn register(
        &self,
        participant_id: &str,
        client_id: &str,
        outbound: mpsc::UnboundedSender<String>,
    ) {
        self.participants
            .entry(participant_id.to_string())
            .or_default()
            .insert(client_id.to_string(), outbound);
    }

    /// Drop every registration held by one socket
    pub(crate) fn unregister_client(&self, client_id: &str) {
        self.participants.retain(|_, clients| {
            clients.remove(client_id);
            !clients.is_empty()
        });
    }

    async fn handle_connection(&self, socket: WebSocket) {
        let client_id = generate_client_id();
        let client_count = self.client_count.fetch_add(1, Ordering::SeqCst) + 1;

        info!("🔌 WebSocket client {} connected (total: {})", client_id, client_count);

        let (mut sender, mut receiver) = socket.split();
        let mut rx = self.tx.subscribe();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        let manager = self.clone();
        let client_id_for_recv = client_id.clone();
        let client_id_for_send = client_id.clone();

        // Task to handle incoming messages from client
        let mut receive_task = tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Registration>(&text) {
                        Ok(registration) => {
                            debug!(
                                client = %client_id_for_recv,
                                participant = %registration.id,
                                "participant registered"
                            );
                            manager.register(&registration.id, &client_id_for_recv, out_tx.clone());
                            let _ = out_tx.send(WELCOME.to_string());
                        }
                        Err(_) => {
                            debug!("Ignoring message from client {}: {}", client_id_for_recv, text);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("Client {} requested close", client_id_for_recv);
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket error from client {}: {}", client_id_for_recv, e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        // Task to send broadcast and directed events to client
        let mut send_task = tokio::spawn(async move {
            loop {
                let text = tokio::select! {
                    broadcast = rx.recv() => match broadcast {
                        Ok(text) => text,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Client {} lagged, skipped {} events", client_id_for_send, skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    directed = out_rx.recv() => match directed {
                        Some(text) => text,
                        None => break,
                    },
                };

                if sender.send(Message::Text(text)).await.is_err() {
                    debug!("Client {} disconnected", client_id_for_send);
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut receive_task => {
                debug!("Receive task completed for client {}", client_id);
                send_task.abort();
            }
            _ = &mut send_task => {
                debug!("Send task completed for client {}", client_id);
                receive_task.abort();
            }
        }

        self.unregister_client(&client_id);
        let remaining = self.client_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        info!("🔌 WebSocket client {} disconnected (remaining: {})", client_id, remaining);
    }
}

impl Notifier for WebSocketManager {
    fn broadcast_all(&self, event: Event) {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return;
            }
        };

        if self.tx.send(text).is_err() {
            debug!("No WebSocket clients to receive {} event", event.kind());
        }
    }

    fn send_to(&self, participant_id: &str, event: Event) {
        let Some(clients) = self.participants.get(participant_id) else {
            debug!(participant = %participant_id, "no socket for {} event", event.kind());
            return;
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return;
            }
        };

        for outbound in clients.values() {
            let _ = outbound.send(text.clone());
        }
    }
}

/// WebSocket handler
/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    state.websocket_manager.handle_upgrade(ws)
}

/// Generate unique client ID
fn generate_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);

    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{games::types::Money, notify::WalletEvent};

    fn balance_event(cents: i64) -> Event {
        WalletEvent::UpdateBalance {
            new_balance: Money::from_cents(cents),
            level: None,
            exp: None,
        }
        .into()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let manager = WebSocketManager::new();
        let mut rx = manager.subscribe();

        manager.broadcast_all(WalletEvent::UpdateBets { bets: Vec::new() }.into());

        let text = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "updateBets");
    }

    #[tokio::test]
    async fn test_directed_events_only_reach_registered_participant() {
        let manager = WebSocketManager::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.register("alice", "ws_a", tx_a);
        manager.register("bob", "ws_b", tx_b);

        manager.send_to("alice", balance_event(1_250));
        manager.send_to("nobody", balance_event(1));

        let text = rx_a.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["type"], "updateBalance");
        assert_eq!(json["newBalance"], 12.5);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_unregister_drops_empty_participants() {
        let manager = WebSocketManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        manager.register("alice", "ws_1", tx.clone());
        manager.register("alice", "ws_2", tx);
        assert_eq!(manager.registered_count(), 1);

        manager.unregister_client("ws_1");
        assert_eq!(manager.registered_count(), 1);
        manager.unregister_client("ws_2");
        assert_eq!(manager.registered_count(), 0);
    }
}
