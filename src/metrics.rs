//! Prometheus metrics for the game services

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Counters and gauges exported at `/metrics`
#[derive(Clone)]
pub struct GameMetrics {
    registry: Registry,
    pub bets_placed: IntCounter,
    pub rounds_settled: IntCounter,
    pub roulette_payouts: IntCounter,
    pub cases_opened: IntCounter,
    pub items_sold: IntCounter,
    pub battles_created: IntCounter,
    pub battles_finished: IntCounter,
    pub battles_aborted: IntCounter,
    pub active_battles: IntGauge,
    pub websocket_connections: IntGauge,
}

impl GameMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("hazard".to_string()), None)?;

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let metric = IntCounter::new(name, help)?;
            registry.register(Box::new(metric.clone()))?;
            Ok(metric)
        };
        let gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let metric = IntGauge::new(name, help)?;
            registry.register(Box::new(metric.clone()))?;
            Ok(metric)
        };

        Ok(Self {
            bets_placed: counter("bets_placed_total", "Accepted roulette wagers")?,
            rounds_settled: counter("rounds_settled_total", "Roulette rounds settled")?,
            roulette_payouts: counter("roulette_payouts_total", "Winning roulette bets paid")?,
            cases_opened: counter("cases_opened_total", "Individual case draws")?,
            items_sold: counter("items_sold_total", "Inventory items sold")?,
            battles_created: counter("battles_created_total", "Battles created")?,
            battles_finished: counter("battles_finished_total", "Battles settled")?,
            battles_aborted: counter("battles_aborted_total", "Battles dropped after an error")?,
            active_battles: gauge("active_battles", "Battles held in memory")?,
            websocket_connections: gauge("websocket_connections", "Open websocket connections")?,
            registry,
        })
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
