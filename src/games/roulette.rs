//! Roulette table: wager intake, round clock and settlement
//!
//! Round state and the bet book share one lock, so a wager can never land
//! between the spin decision and the settlement that clears the book.
//! Timed phases sleep through the injected scheduler without holding it.

use crate::{
    context::GameContext,
    errors::{ConflictError, HazardResult, ValidationError},
    games::{
        bet_book::{Bet, BetBook},
        round::{Phase, RoundState, TickOutcome},
        selector,
        types::{Color, Money},
    },
    notify::{Event, RoundEvent, WalletEvent},
};
use serde::Serialize;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, error, info};

const WHEEL_SIZE: usize = 36;

struct Table {
    round: RoundState,
    book: BetBook,
}

/// Private result returned to a bettor
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    pub new_balance: Money,
    pub level: u32,
    pub exp: u64,
}

/// Read model for clients joining mid-round
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteSnapshot {
    pub current_number: u8,
    pub red_bets: Vec<Bet>,
    pub green_bets: Vec<Bet>,
    pub black_bets: Vec<Bet>,
    pub last_numbers: Vec<u8>,
    pub time_to_spin: u64,
}

/// Outcome of settling one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundSettlement {
    pub winners: usize,
    pub paid: Money,
}

pub struct RouletteTable {
    ctx: GameContext,
    table: Mutex<Table>,
}

impl RouletteTable {
    pub fn new(ctx: GameContext) -> Self {
        let round = RoundState::new(&ctx.config.roulette);
        Self {
            ctx,
            table: Mutex::new(Table {
                round,
                book: BetBook::new(),
            }),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a wager for the current round.
    ///
    /// Checks run in order (phase, color, amount format, sign, balance) and
    /// any rejection leaves balances and the book untouched.
    pub fn submit_bet(&self, user_id: &str, color: &str, amount: &str) -> HazardResult<BetReceipt> {
        let mut table = self.table();
        match table.round.phase() {
            Phase::Spinning => return Err(ConflictError::RoundSpinning.into()),
            Phase::Processing => return Err(ConflictError::RoundProcessing.into()),
            Phase::CountingDown => {}
        }

        let color: Color = color.parse()?;
        let amount = Money::parse(amount)?;
        if !amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount.into());
        }

        let user = self.ctx.wallet.spend(user_id, amount)?;
        table.book.place(Bet::from_user(&user, color, amount));
        self.ctx.metrics.bets_placed.inc();
        debug!(user_id, color = color.as_str(), amount = %amount, "bet accepted");

        self.ctx.notifier.broadcast_all(Event::from(WalletEvent::UpdateBets {
            bets: table.book.sorted(),
        }));
        self.ctx.notifier.send_to(
            user_id,
            WalletEvent::UpdateBalance {
                new_balance: user.balance,
                level: Some(user.level),
                exp: Some(user.exp),
            }
            .into(),
        );

        Ok(BetReceipt {
            new_balance: user.balance,
            level: user.level,
            exp: user.exp,
        })
    }

    pub fn snapshot(&self) -> RouletteSnapshot {
        let table = self.table();
        RouletteSnapshot {
            current_number: table.round.current_number(),
            red_bets: table.book.by_color(Color::Red),
            green_bets: table.book.by_color(Color::Green),
            black_bets: table.book.by_color(Color::Black),
            last_numbers: table.round.last_numbers(),
            time_to_spin: table.round.time_remaining_ms(),
        }
    }

    /// Pay every bet on `winning` and clear the book.
    ///
    /// A failed credit is logged and does not stop the remaining payouts.
    pub fn settle(&self, winning: Color) -> RoundSettlement {
        let bets = self.table().book.take();
        let multiplier = match winning {
            Color::Green => self.ctx.config.roulette.green_multiplier,
            Color::Red | Color::Black => self.ctx.config.roulette.color_multiplier,
        };

        let mut settlement = RoundSettlement::default();
        for bet in bets.iter().filter(|b| b.color == winning) {
            let payout = bet.amount.times(multiplier);
            match self.ctx.wallet.credit(&bet.user_id, payout) {
                Ok(user) => {
                    settlement.winners += 1;
                    settlement.paid += payout;
                    self.ctx.metrics.roulette_payouts.inc();
                    self.ctx.notifier.send_to(
                        &bet.user_id,
                        WalletEvent::UpdateBalance {
                            new_balance: user.balance,
                            level: None,
                            exp: None,
                        }
                        .into(),
                    );
                }
                Err(e) => {
                    error!(user_id = %bet.user_id, payout = %payout, error = %e, "failed to credit roulette win");
                }
            }
        }
        settlement
    }

    /// Advance the round clock by one tick
    pub async fn tick(&self) {
        let outcome = {
            let mut table = self.table();
            let outcome = table.round.tick();
            if let TickOutcome::Counted { time_remaining_ms } = outcome {
                self.ctx.notifier.broadcast_all(
                    RoundEvent::Tick {
                        time_remaining: time_remaining_ms,
                        spinning: false,
                        processing: false,
                    }
                    .into(),
                );
            }
            outcome
        };

        if outcome == TickOutcome::SpinDue {
            self.spin().await;
        }
    }

    /// Spin, settle and reopen betting
    async fn spin(&self) {
        let number = self.ctx.rng.with(|rng| selector::pick_index(rng, WHEEL_SIZE)) as u8;
        {
            let mut table = self.table();
            table.round.begin_spin(number);
            self.ctx.notifier.broadcast_all(RoundEvent::Spin { number, spinning: true }.into());
        }
        let config = &self.ctx.config.roulette;
        self.ctx.scheduler.sleep(config.spinning()).await;

        {
            let mut table = self.table();
            table.round.begin_processing();
            self.ctx.notifier.broadcast_all(
                RoundEvent::Processing {
                    spinning: false,
                    processing: true,
                }
                .into(),
            );
        }

        let winning = Color::from_number(number);
        let settlement = self.settle(winning);
        self.ctx.metrics.rounds_settled.inc();
        info!(
            number,
            color = winning.as_str(),
            winners = settlement.winners,
            paid = %settlement.paid,
            "roulette round settled"
        );
        self.ctx.scheduler.sleep(config.settle_pause()).await;

        let mut table = self.table();
        table.round.reset();
        self.ctx.notifier.broadcast_all(
            RoundEvent::Reset {
                time_remaining: table.round.time_remaining_ms(),
                last_numbers: table.round.last_numbers(),
                processing: false,
                bets: table.book.sorted(),
            }
            .into(),
        );
    }

    /// Drive the round clock forever
    pub async fn run(self: Arc<Self>) {
        let tick = self.ctx.config.roulette.tick();
        info!(tick_ms = tick.as_millis() as u64, "roulette clock started");
        loop {
            self.ctx.scheduler.sleep(tick).await;
            self.tick().await;
        }
    }

    pub fn phase(&self) -> Phase {
        self.table().round.phase()
    }

    /// Remaining countdown
    pub fn time_to_spin(&self) -> Duration {
        Duration::from_millis(self.table().round.time_remaining_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::HazardConfig,
        context::SharedRng,
        errors::HazardError,
        games::types::User,
        store::{MemoryStore, Store},
        testing::{RecordingNotifier, RecordingScheduler, ScriptedRng},
    };

    fn table_with(fractions: Vec<f64>) -> (RouletteTable, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        store
            .save_user(&User::new("u1", "alice", Money::from_cents(10_000)))
            .expect("seed");
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = GameContext::new(
            HazardConfig::testing(),
            store.clone(),
            notifier.clone(),
            Arc::new(RecordingScheduler::new()),
            SharedRng::new(ScriptedRng::new(fractions)),
        )
        .expect("context");
        (RouletteTable::new(ctx), store, notifier)
    }

    #[test]
    fn test_bet_debits_and_notifies() {
        let (table, store, notifier) = table_with(vec![0.0]);
        let receipt = table.submit_bet("u1", "red", "12.50").expect("bet");
        assert_eq!(receipt.new_balance, Money::from_cents(8_750));
        assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(8_750));
        assert_eq!(notifier.broadcast_kinds(), vec!["updateBets"]);
        assert_eq!(notifier.sent_to("u1").len(), 1);
    }

    #[test]
    fn test_rejections_leave_state_untouched() {
        let (table, store, _) = table_with(vec![0.0]);
        for (color, amount) in [("red", "1.234"), ("red", "0"), ("red", "100.01"), ("blue", "1")] {
            assert!(matches!(
                table.submit_bet("u1", color, amount),
                Err(HazardError::Validation(_))
            ));
        }
        assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(10_000));
        assert!(table.snapshot().red_bets.is_empty());
    }

    #[test]
    fn test_settle_twice_pays_once() {
        let (table, store, _) = table_with(vec![0.0]);
        table.submit_bet("u1", "black", "10").expect("bet");
        let first = table.settle(Color::Black);
        let second = table.settle(Color::Black);
        assert_eq!(first.paid, Money::from_cents(2_000));
        assert_eq!(second, RoundSettlement::default());
        assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(11_000));
    }

    #[tokio::test]
    async fn test_bets_rejected_while_spinning() {
        let (table, _, _) = table_with(vec![0.0]);
        table.table().round.begin_spin(3);
        assert!(matches!(
            table.submit_bet("u1", "red", "1"),
            Err(HazardError::Conflict(ConflictError::RoundSpinning))
        ));
        table.table().round.begin_processing();
        assert!(matches!(
            table.submit_bet("u1", "red", "1"),
            Err(HazardError::Conflict(ConflictError::RoundProcessing))
        ));
    }
}
