//! Timed phase transitions
//!
//! Round and battle loops never sleep directly; they ask a `Scheduler`, so
//! tests can replace wall-clock waits with a recorder.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Resume the caller after `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real timer backed by tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
