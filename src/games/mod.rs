pub mod battle;
pub mod battle_engine;
pub mod bet_book;
pub mod cases;
pub mod progression;
pub mod roulette;
pub mod round;
pub mod selector;
pub mod settlement;
pub mod types;
pub mod wallet;

pub use battle_engine::BattleEngine;
pub use cases::CaseService;
pub use roulette::RouletteTable;
pub use types::*;
