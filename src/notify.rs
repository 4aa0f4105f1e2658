//! Notification gateway and event payloads
//!
//! Events serialize to the JSON shapes clients already consume: round
//! updates are bare objects, wallet updates carry a `type` tag and battle
//! updates an `action` tag.

use crate::games::{
    battle::Battle,
    bet_book::Bet,
    types::{Money, PublicUser, Skin},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Fan-out and directed delivery; both are fire-and-forget
pub trait Notifier: Send + Sync {
    fn broadcast_all(&self, event: Event);
    fn send_to(&self, participant_id: &str, event: Event);
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    Round(RoundEvent),
    Wallet(WalletEvent),
    Battle(BattleEvent),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RoundEvent {
    #[serde(rename_all = "camelCase")]
    Tick {
        time_remaining: u64,
        spinning: bool,
        processing: bool,
    },
    Spin {
        number: u8,
        spinning: bool,
    },
    Processing {
        spinning: bool,
        processing: bool,
    },
    #[serde(rename_all = "camelCase")]
    Reset {
        time_remaining: u64,
        last_numbers: Vec<u8>,
        processing: bool,
        bets: Vec<Bet>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WalletEvent {
    #[serde(rename = "updateBets")]
    UpdateBets { bets: Vec<Bet> },

    #[serde(rename = "updateBalance", rename_all = "camelCase")]
    UpdateBalance {
        new_balance: Money,
        #[serde(skip_serializing_if = "Option::is_none")]
        level: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exp: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action")]
pub enum BattleEvent {
    #[serde(rename = "newBattle")]
    NewBattle { battle: Battle },

    #[serde(rename = "updateBattle")]
    UpdateBattle {
        battle: Battle,
        users: Vec<Option<PublicUser>>,
    },

    #[serde(rename = "countdown")]
    Countdown { battle: Battle },

    #[serde(rename = "rollItems")]
    RollItems { battle: Battle },

    #[serde(rename = "battleEnded", rename_all = "camelCase")]
    BattleEnded {
        battle: Battle,
        winners: Vec<PublicUser>,
        is_tie: bool,
        allocated_skins: BTreeMap<String, Vec<Skin>>,
    },

    #[serde(rename = "battleAborted")]
    BattleAborted { battle: Battle },
}

impl From<RoundEvent> for Event {
    fn from(event: RoundEvent) -> Self {
        Event::Round(event)
    }
}

impl From<WalletEvent> for Event {
    fn from(event: WalletEvent) -> Self {
        Event::Wallet(event)
    }
}

impl From<BattleEvent> for Event {
    fn from(event: BattleEvent) -> Self {
        Event::Battle(event)
    }
}

impl Event {
    /// Short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Round(RoundEvent::Tick { .. }) => "tick",
            Event::Round(RoundEvent::Spin { .. }) => "spin",
            Event::Round(RoundEvent::Processing { .. }) => "processing",
            Event::Round(RoundEvent::Reset { .. }) => "reset",
            Event::Wallet(WalletEvent::UpdateBets { .. }) => "updateBets",
            Event::Wallet(WalletEvent::UpdateBalance { .. }) => "updateBalance",
            Event::Battle(BattleEvent::NewBattle { .. }) => "newBattle",
            Event::Battle(BattleEvent::UpdateBattle { .. }) => "updateBattle",
            Event::Battle(BattleEvent::Countdown { .. }) => "countdown",
            Event::Battle(BattleEvent::RollItems { .. }) => "rollItems",
            Event::Battle(BattleEvent::BattleEnded { .. }) => "battleEnded",
            Event::Battle(BattleEvent::BattleAborted { .. }) => "battleAborted",
        }
    }
}
