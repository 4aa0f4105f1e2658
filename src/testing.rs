//! Deterministic doubles for driving the game loops in tests
//!
//! Exposed publicly so integration tests and downstream harnesses can build
//! a `GameContext` with scripted randomness and recorded side effects.

use crate::{
    notify::{Event, Notifier},
    scheduler::Scheduler,
};
use async_trait::async_trait;
use rand::RngCore;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Replays a fixed list of fractions in `[0, 1)`, cycling when exhausted.
/// An empty script always yields zero.
///
/// `rng.gen::<f64>()` returns exactly the scripted value.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    fractions: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(fractions: Vec<f64>) -> Self {
        Self { fractions, cursor: 0 }
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let fraction = match self.fractions.len() {
            0 => 0.0,
            len => self.fractions[self.cursor % len].clamp(0.0, 1.0 - f64::EPSILON),
        };
        self.cursor += 1;
        ((fraction * (1u64 << 53) as f64) as u64) << 11
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Records every event with its recipient (`None` for broadcasts)
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(Option<String>, Event)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Option<String>, Event)> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn broadcasts(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter_map(|(to, event)| to.is_none().then_some(event))
            .collect()
    }

    pub fn sent_to(&self, participant_id: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter_map(|(to, event)| (to.as_deref() == Some(participant_id)).then_some(event))
            .collect()
    }

    /// Broadcast kinds in emission order
    pub fn broadcast_kinds(&self) -> Vec<&'static str> {
        self.broadcasts().iter().map(Event::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn broadcast_all(&self, event: Event) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push((None, event));
    }

    fn send_to(&self, participant_id: &str, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Some(participant_id.to_string()), event));
    }
}

/// Returns immediately and remembers each requested delay
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        tokio::task::yield_now().await;
    }
}
