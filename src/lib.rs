//! Hazard - virtual roulette, loot cases and case battles
//!
//! Game state lives in explicit service objects (`RouletteTable`,
//! `BattleEngine`, `CaseService`) built from one `GameContext`. The `api`
//! module exposes them over HTTP and pushes live updates over websockets.

pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod games;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod testing;

pub use config::HazardConfig;
pub use context::{GameContext, SharedRng};
pub use errors::{HazardError, HazardResult};
pub use games::{BattleEngine, CaseService, RouletteTable};
