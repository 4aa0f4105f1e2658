//! Roulette round phases

use crate::config::RouletteConfig;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    CountingDown,
    Spinning,
    Processing,
}

/// What a clock tick did to the round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Spinning or settling; the tick is ignored
    Busy,
    Counted { time_remaining_ms: u64 },
    SpinDue,
}

#[derive(Debug)]
pub struct RoundState {
    current_number: u8,
    last_numbers: VecDeque<u8>,
    time_remaining_ms: u64,
    phase: Phase,
    interval_ms: u64,
    tick_ms: u64,
    history_len: usize,
}

impl RoundState {
    pub fn new(config: &RouletteConfig) -> Self {
        let mut last_numbers = VecDeque::with_capacity(config.history_len + 1);
        last_numbers.push_front(0);
        Self {
            current_number: 0,
            last_numbers,
            time_remaining_ms: config.spin_interval_ms,
            phase: Phase::CountingDown,
            interval_ms: config.spin_interval_ms,
            tick_ms: config.tick_ms,
            history_len: config.history_len,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::CountingDown {
            return TickOutcome::Busy;
        }
        if self.time_remaining_ms == 0 {
            return TickOutcome::SpinDue;
        }
        self.time_remaining_ms = self.time_remaining_ms.saturating_sub(self.tick_ms);
        TickOutcome::Counted {
            time_remaining_ms: self.time_remaining_ms,
        }
    }

    pub fn begin_spin(&mut self, number: u8) {
        self.current_number = number;
        self.last_numbers.push_front(number);
        self.last_numbers.truncate(self.history_len);
        self.phase = Phase::Spinning;
    }

    pub fn begin_processing(&mut self) {
        self.phase = Phase::Processing;
    }

    pub fn reset(&mut self) {
        self.phase = Phase::CountingDown;
        self.time_remaining_ms = self.interval_ms;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_number(&self) -> u8 {
        self.current_number
    }

    pub fn last_numbers(&self) -> Vec<u8> {
        self.last_numbers.iter().copied().collect()
    }

    pub fn time_remaining_ms(&self) -> u64 {
        self.time_remaining_ms
    }
}
