//! Case battle orchestration
//!
//! Battles live in an in-memory active set from creation until they are
//! settled. Seat changes happen under the active-set lock; once every seat
//! is filled a background task runs the countdown, rolls each case, settles
//! and persists the final record. Timed pauses never hold the lock.

use crate::{
    context::GameContext,
    errors::{ConflictError, HazardError, HazardResult, ValidationError},
    games::{
        battle::{Battle, BattleMode, BattleState, BattleType, Seat, Visibility},
        selector,
        settlement::{self, SettlementRules},
        types::{Case, Money, PublicUser, Skin},
    },
    notify::{BattleEvent, Event},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Parameters of a new battle
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattle {
    pub cases: Vec<String>,
    pub battle_type: BattleType,
    pub mode: BattleMode,
    pub visibility: Visibility,
    pub creator_id: String,
}

/// Battle with its seats resolved to public profiles
#[derive(Debug, Clone, Serialize)]
pub struct BattleView {
    pub battle: Battle,
    pub users: Vec<Option<PublicUser>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleDetails {
    pub battle: Battle,
    pub users: Vec<Option<PublicUser>>,
    #[serde(rename = "SkinsCases")]
    pub cases: Vec<Case>,
    /// "server" while active, "database" once settled
    pub source: &'static str,
}

struct ActiveBattle {
    battle: Battle,
    /// Resolved case definitions, one per roll, in roll order
    cases: Vec<Case>,
}

pub struct BattleEngine {
    ctx: GameContext,
    active: Mutex<HashMap<String, ActiveBattle>>,
    cooldowns: DashMap<String, Instant>,
}

impl BattleEngine {
    pub fn new(ctx: GameContext) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            active: Mutex::new(HashMap::new()),
            cooldowns: DashMap::new(),
        })
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, ActiveBattle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_battle(self: &Arc<Self>, request: CreateBattle) -> HazardResult<Battle> {
        self.check_cooldown(&request.creator_id)?;

        let max_cases = self.ctx.config.battles.max_cases;
        if request.cases.is_empty() || request.cases.len() > max_cases {
            return Err(ValidationError::CaseCount {
                got: request.cases.len(),
                max: max_cases,
            }
            .into());
        }
        self.ctx.store.load_user(&request.creator_id)?;

        let mut resolved: HashMap<&str, Case> = HashMap::new();
        for id in &request.cases {
            if !resolved.contains_key(id.as_str()) {
                resolved.insert(id.as_str(), self.ctx.store.load_case(id)?);
            }
        }
        let cases: Vec<Case> = request
            .cases
            .iter()
            .filter_map(|id| resolved.get(id.as_str()).cloned())
            .collect();
        let cost: Money = cases.iter().map(|c| c.case_price).sum();

        let battle = Battle::new(
            Uuid::new_v4().to_string(),
            request.cases.clone(),
            request.battle_type,
            request.mode,
            request.visibility,
            cost,
            &request.creator_id,
        );
        self.ctx.store.save_battle(&battle)?;

        let active_count = {
            let mut active = self.active();
            active.insert(
                battle.id.clone(),
                ActiveBattle {
                    battle: battle.clone(),
                    cases,
                },
            );
            self.ctx
                .notifier
                .broadcast_all(BattleEvent::NewBattle { battle: battle.clone() }.into());
            active.len()
        };
        self.ctx.metrics.battles_created.inc();
        self.ctx.metrics.active_battles.set(active_count as i64);
        info!(
            battle_id = %battle.id,
            creator = %request.creator_id,
            mode = %battle.mode,
            cost = %battle.battle_cost,
            "battle created"
        );
        Ok(battle)
    }

    /// Each attempt that passes the check starts a new window. Expired
    /// windows are dropped on every insert.
    fn check_cooldown(&self, creator_id: &str) -> HazardResult<()> {
        let window = self.ctx.config.battles.creation_cooldown();
        let now = Instant::now();
        if let Some(last) = self.cooldowns.get(creator_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < window {
                let retry_after_ms = (window - elapsed).as_millis() as u64;
                return Err(ConflictError::RateLimited { retry_after_ms }.into());
            }
        }
        self.cooldowns
            .retain(|_, last| now.saturating_duration_since(*last) < window);
        self.cooldowns.insert(creator_id.to_string(), now);
        Ok(())
    }

    pub fn join_battle(self: &Arc<Self>, battle_id: &str, user_id: &str, seat: usize) -> HazardResult<Battle> {
        self.ctx.store.load_user(user_id)?;
        self.seat_participant(battle_id, seat, |_| Ok(Seat::human(user_id)))
    }

    /// Only the creator may fill a seat with a bot
    pub fn add_bot(self: &Arc<Self>, battle_id: &str, requester_id: &str, seat: usize) -> HazardResult<Battle> {
        self.seat_participant(battle_id, seat, |battle| {
            if battle.creator_id() != Some(requester_id) {
                return Err(HazardError::Forbidden("only the creator can add bots".to_string()));
            }
            let used = battle.bot_names();
            let available: Vec<&String> = self
                .ctx
                .config
                .battles
                .bot_names
                .iter()
                .filter(|name| !used.contains(&name.as_str()))
                .collect();
            if available.is_empty() {
                return Err(ConflictError::BotNamesExhausted.into());
            }
            let pick = self.ctx.rng.with(|rng| selector::pick_index(rng, available.len()));
            Ok(Seat::Bot(bot_profile(available[pick])))
        })
    }

    /// Shared seat-filling path for humans and bots.
    ///
    /// `choose` runs under the lock and yields the occupant. The updated
    /// record is persisted before the in-memory copy changes; filling the
    /// last seat starts the battle.
    fn seat_participant<F>(self: &Arc<Self>, battle_id: &str, index: usize, choose: F) -> HazardResult<Battle>
    where
        F: FnOnce(&Battle) -> HazardResult<Seat>,
    {
        let (battle, ready) = {
            let mut active = self.active();
            let Some(entry) = active.get_mut(battle_id) else {
                return Err(self.missing_battle(battle_id));
            };

            let mut updated = entry.battle.clone();
            let seat = choose(&updated)?;
            updated.fill_seat(index, seat)?;
            let ready = updated.is_full();
            if ready {
                updated.advance(BattleState::Ready)?;
            }
            let roster = self.roster(&updated)?;
            self.ctx.store.save_battle(&updated)?;
            entry.battle = updated.clone();

            self.ctx.notifier.broadcast_all(
                BattleEvent::UpdateBattle {
                    battle: updated.clone(),
                    users: roster,
                }
                .into(),
            );
            (updated, ready)
        };

        debug!(battle_id, seat = index, ready, "seat filled");
        if ready {
            tokio::spawn(self.clone().run_battle(battle.id.clone()));
        }
        Ok(battle)
    }

    /// Settled or started battles no longer take players
    fn missing_battle(&self, battle_id: &str) -> HazardError {
        match self.ctx.store.get_battle(battle_id) {
            Ok(Some(_)) => ConflictError::BattleNotOpen.into(),
            Ok(None) => HazardError::not_found("battle", battle_id),
            Err(e) => e,
        }
    }

    /// Countdown, rolls and settlement for a full battle
    async fn run_battle(self: Arc<Self>, battle_id: String) {
        match self.drive(&battle_id).await {
            Ok(()) => self.ctx.metrics.battles_finished.inc(),
            Err(e) => {
                error!(battle_id = %battle_id, error = %e, "battle aborted");
                self.ctx.metrics.battles_aborted.inc();
                self.abort(&battle_id);
            }
        }
    }

    async fn drive(&self, battle_id: &str) -> HazardResult<()> {
        let config = &self.ctx.config.battles;

        for count in (1..=config.countdown_from).rev() {
            self.with_battle(battle_id, |active| {
                active.battle.countdown = Some(count);
                Ok(BattleEvent::Countdown { battle: active.battle.clone() })
            })?;
            self.ctx.scheduler.sleep(config.countdown_tick()).await;
        }

        let rolls = self.with_active(battle_id, |active| {
            active.battle.countdown = None;
            active.battle.advance(BattleState::Rolling)?;
            Ok(active.cases.len())
        })?;

        for case_index in 0..rolls {
            self.with_battle(battle_id, |active| {
                let case = &active.cases[case_index];
                let seats = active.battle.users.len();
                let round = self.ctx.rng.with(|rng| {
                    (0..seats)
                        .map(|_| selector::draw(&case.items, 1, &mut *rng).map(|d| d.first().map(|i| i.to_skin())))
                        .collect::<HazardResult<Vec<Option<Skin>>>>()
                })?;
                active.battle.current_case_index = case_index;
                active.battle.rolled_skins.push(round);
                debug!(battle_id, case_index, "case rolled");
                Ok(BattleEvent::RollItems { battle: active.battle.clone() })
            })?;
            if case_index + 1 < rolls {
                self.ctx.scheduler.sleep(config.case_pause()).await;
            }
        }

        self.finish(battle_id)
    }

    /// Settle, persist, evict and announce
    fn finish(&self, battle_id: &str) -> HazardResult<()> {
        let catalog = self.ctx.store.list_skins()?;
        let rules = SettlementRules {
            consolation_percent: self.ctx.config.battles.consolation_percent,
            max_items: self.ctx.config.battles.max_allocated_items,
        };

        let mut active = self.active();
        let entry = active
            .get_mut(battle_id)
            .ok_or_else(|| HazardError::not_found("battle", battle_id))?;
        let mut battle = entry.battle.clone();
        battle.advance(BattleState::Finished)?;
        let outcome = self
            .ctx
            .rng
            .with(|rng| settlement::settle_battle(&battle, &catalog, &rules, rng))?;

        battle.winner_ids = outcome.winner_ids.clone();
        battle.is_tie = outcome.is_tie;
        battle.allocated_skins = outcome.allocated.clone();

        let winners: Vec<PublicUser> = outcome
            .winner_seats
            .iter()
            .filter_map(|&i| battle.users[i].as_ref())
            .map(|seat| self.public_profile(seat))
            .collect::<HazardResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        self.ctx.store.save_battle(&battle)?;

        active.remove(battle_id);
        self.ctx.metrics.active_battles.set(active.len() as i64);
        info!(
            battle_id,
            winners = ?battle.winner_ids,
            is_tie = battle.is_tie,
            "battle finished"
        );
        self.ctx.notifier.broadcast_all(
            BattleEvent::BattleEnded {
                battle,
                winners,
                is_tie: outcome.is_tie,
                allocated_skins: outcome.allocated,
            }
            .into(),
        );
        Ok(())
    }

    /// Mutate an active battle and broadcast the event it returns
    fn with_battle<F>(&self, battle_id: &str, f: F) -> HazardResult<()>
    where
        F: FnOnce(&mut ActiveBattle) -> HazardResult<BattleEvent>,
    {
        let mut active = self.active();
        let entry = active
            .get_mut(battle_id)
            .ok_or_else(|| HazardError::not_found("battle", battle_id))?;
        let event = f(entry)?;
        self.ctx.notifier.broadcast_all(Event::from(event));
        Ok(())
    }

    fn with_active<T, F>(&self, battle_id: &str, f: F) -> HazardResult<T>
    where
        F: FnOnce(&mut ActiveBattle) -> HazardResult<T>,
    {
        let mut active = self.active();
        let entry = active
            .get_mut(battle_id)
            .ok_or_else(|| HazardError::not_found("battle", battle_id))?;
        f(entry)
    }

    /// Evict a failed battle, persist it as aborted and tell clients.
    ///
    /// Partial rolls are discarded; the stored record never stays mid-flight.
    fn abort(&self, battle_id: &str) {
        let evicted = {
            let mut active = self.active();
            let evicted = active.remove(battle_id).map(|entry| entry.battle);
            self.ctx.metrics.active_battles.set(active.len() as i64);
            evicted
        };
        let stored = match evicted {
            Some(battle) => Some(battle),
            None => match self.ctx.store.get_battle(battle_id) {
                Ok(battle) => battle,
                Err(e) => {
                    error!(battle_id, error = %e, "aborted battle could not be loaded");
                    None
                }
            },
        };
        let Some(mut battle) = stored else {
            return;
        };

        if let Err(e) = battle.abort() {
            warn!(battle_id, error = %e, "battle left as is");
            return;
        }
        if let Err(e) = self.ctx.store.save_battle(&battle) {
            error!(battle_id, error = %e, "failed to persist aborted battle");
        }
        warn!(battle_id, "battle evicted");
        self.ctx
            .notifier
            .broadcast_all(BattleEvent::BattleAborted { battle }.into());
    }

    fn public_profile(&self, seat: &Seat) -> HazardResult<Option<PublicUser>> {
        match seat {
            Seat::Bot(profile) => Ok(Some(profile.clone())),
            Seat::Human { id } => Ok(self.ctx.store.get_user(id)?.map(|u| u.public())),
        }
    }

    fn roster(&self, battle: &Battle) -> HazardResult<Vec<Option<PublicUser>>> {
        battle
            .users
            .iter()
            .map(|seat| match seat {
                Some(seat) => self.public_profile(seat),
                None => Ok(None),
            })
            .collect()
    }

    /// Battles still in the active set, with resolved rosters
    pub fn list_active(&self) -> HazardResult<Vec<BattleView>> {
        let battles: Vec<Battle> = self.active().values().map(|a| a.battle.clone()).collect();
        let mut views = battles
            .into_iter()
            .map(|battle| {
                Ok(BattleView {
                    users: self.roster(&battle)?,
                    battle,
                })
            })
            .collect::<HazardResult<Vec<_>>>()?;
        views.sort_by(|a, b| a.battle.created_at.cmp(&b.battle.created_at));
        Ok(views)
    }

    /// Active battle first, then the persisted record
    pub fn get_battle(&self, battle_id: &str) -> HazardResult<BattleDetails> {
        let live = self.active().get(battle_id).map(|a| a.battle.clone());
        let (battle, source) = match live {
            Some(battle) => (battle, "server"),
            None => (
                self.ctx
                    .store
                    .get_battle(battle_id)?
                    .ok_or_else(|| HazardError::not_found("battle", battle_id))?,
                "database",
            ),
        };

        let mut cases = Vec::new();
        for id in &battle.cases {
            if cases.iter().any(|c: &Case| &c.id == id) {
                continue;
            }
            if let Some(case) = self.ctx.store.get_case(id)? {
                cases.push(case);
            }
        }

        Ok(BattleDetails {
            users: self.roster(&battle)?,
            battle,
            cases,
            source,
        })
    }

    pub fn active_count(&self) -> usize {
        self.active().len()
    }
}

fn bot_profile(name: &str) -> PublicUser {
    PublicUser {
        id: Uuid::new_v4().to_string(),
        username: name.to_string(),
        role: "bot".to_string(),
        exp: 0,
        level: 1,
        profile_image: format!("/boty/bot{}.png", name),
        bot: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::HazardConfig,
        context::SharedRng,
        games::types::{CaseItem, User},
        store::{MemoryStore, Store},
        testing::{RecordingNotifier, RecordingScheduler, ScriptedRng},
    };
    use std::time::Duration;

    fn engine_with(config: HazardConfig) -> (Arc<BattleEngine>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        for id in ["creator", "p2"] {
            store
                .save_user(&User::new(id, id, Money::from_cents(10_000)))
                .expect("seed user");
        }
        store
            .save_case(&Case {
                id: "c1".to_string(),
                name: "Starter".to_string(),
                case_type: "standard".to_string(),
                image: String::new(),
                items: vec![CaseItem {
                    name: "P250".to_string(),
                    price: Money::from_cents(500),
                    chance: 100.0,
                    rarity: "common".to_string(),
                    image: String::new(),
                }],
                case_price: Money::from_cents(575),
            })
            .expect("seed case");
        store
            .save_case(&Case {
                id: "broken".to_string(),
                name: "Broken".to_string(),
                case_type: "standard".to_string(),
                image: String::new(),
                items: vec![CaseItem {
                    name: "Ghost".to_string(),
                    price: Money::from_cents(100),
                    chance: 0.0,
                    rarity: "common".to_string(),
                    image: String::new(),
                }],
                case_price: Money::from_cents(115),
            })
            .expect("seed weightless case");
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = GameContext::new(
            config,
            store,
            notifier.clone(),
            Arc::new(RecordingScheduler::new()),
            SharedRng::new(ScriptedRng::new(vec![0.0])),
        )
        .expect("context");
        (BattleEngine::new(ctx), notifier)
    }

    fn request(mode: BattleMode, cases: &[&str]) -> CreateBattle {
        CreateBattle {
            cases: cases.iter().map(|c| c.to_string()).collect(),
            battle_type: BattleType::Standard,
            mode,
            visibility: Visibility::Public,
            creator_id: "creator".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_sums_repeated_cases() {
        let (engine, notifier) = engine_with(HazardConfig::testing());
        let battle = engine
            .create_battle(request(BattleMode::TwoVsTwo, &["c1", "c1", "c1"]))
            .expect("create");
        assert_eq!(battle.battle_cost, Money::from_cents(1_725));
        assert_eq!(battle.users.len(), 4);
        assert_eq!(battle.creator_id(), Some("creator"));
        assert_eq!(engine.active_count(), 1);
        assert_eq!(notifier.broadcast_kinds(), vec!["newBattle"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_cooldown_window() {
        let (engine, _) = engine_with(HazardConfig::testing());
        engine.create_battle(request(BattleMode::OneVsOne, &["c1"])).expect("first");

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let err = engine
            .create_battle(request(BattleMode::OneVsOne, &["c1"]))
            .unwrap_err();
        assert!(matches!(
            err,
            HazardError::Conflict(ConflictError::RateLimited { retry_after_ms: 3_500 })
        ));

        tokio::time::advance(Duration::from_millis(3_500)).await;
        engine.create_battle(request(BattleMode::OneVsOne, &["c1"])).expect("window elapsed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cooldowns_are_pruned() {
        let (engine, _) = engine_with(HazardConfig::testing());
        engine.create_battle(request(BattleMode::OneVsOne, &["c1"])).expect("first");
        assert_eq!(engine.cooldowns.len(), 1);

        tokio::time::advance(Duration::from_millis(5_000)).await;
        let mut other = request(BattleMode::OneVsOne, &["c1"]);
        other.creator_id = "p2".to_string();
        engine.create_battle(other).expect("second creator");
        assert_eq!(engine.cooldowns.len(), 1);
        assert!(engine.cooldowns.contains_key("p2"));
    }

    #[tokio::test]
    async fn test_integrity_failure_persists_aborted_battle() {
        let (engine, notifier) = engine_with(HazardConfig::testing());
        let battle = engine
            .create_battle(request(BattleMode::OneVsOne, &["c1", "broken"]))
            .expect("create");
        engine.add_bot(&battle.id, "creator", 1).expect("bot");

        for _ in 0..100 {
            if engine.active_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.active_count(), 0);

        let details = engine.get_battle(&battle.id).expect("details");
        assert_eq!(details.source, "database");
        assert_eq!(details.battle.state, BattleState::Aborted);
        assert!(details.battle.rolled_skins.is_empty());
        assert_eq!(
            notifier.broadcast_kinds(),
            vec![
                "newBattle",
                "updateBattle",
                "countdown",
                "countdown",
                "countdown",
                "rollItems",
                "battleAborted"
            ]
        );
        assert!(matches!(
            engine.join_battle(&battle.id, "p2", 1),
            Err(HazardError::Conflict(ConflictError::BattleNotOpen))
        ));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (engine, _) = engine_with(HazardConfig::testing());
        assert!(matches!(
            engine.create_battle(request(BattleMode::OneVsOne, &[])),
            Err(HazardError::Validation(ValidationError::CaseCount { got: 0, .. }))
        ));

        let (engine, _) = engine_with(HazardConfig::testing());
        assert!(matches!(
            engine.create_battle(request(BattleMode::OneVsOne, &["nope"])),
            Err(HazardError::NotFound { kind: "case", .. })
        ));
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test]
    async fn test_only_creator_adds_bots_until_names_run_out() {
        let mut config = HazardConfig::testing();
        config.battles.bot_names = vec!["Sigma".to_string()];
        let (engine, _) = engine_with(config);
        let battle = engine
            .create_battle(request(BattleMode::FreeForAll(3), &["c1"]))
            .expect("create");

        assert!(matches!(
            engine.add_bot(&battle.id, "p2", 1),
            Err(HazardError::Forbidden(_))
        ));

        let updated = engine.add_bot(&battle.id, "creator", 1).expect("bot");
        match &updated.users[1] {
            Some(Seat::Bot(profile)) => {
                assert_eq!(profile.username, "Sigma");
                assert_eq!(profile.profile_image, "/boty/botSigma.png");
                assert!(profile.bot);
            }
            other => panic!("expected bot seat, got {:?}", other),
        }
        assert!(matches!(
            engine.add_bot(&battle.id, "creator", 2),
            Err(HazardError::Conflict(ConflictError::BotNamesExhausted))
        ));
    }

    #[tokio::test]
    async fn test_join_rejections() {
        let (engine, _) = engine_with(HazardConfig::testing());
        let battle = engine
            .create_battle(request(BattleMode::OneVsOneVsOne, &["c1"]))
            .expect("create");

        assert!(matches!(
            engine.join_battle("missing", "p2", 1),
            Err(HazardError::NotFound { kind: "battle", .. })
        ));
        assert!(matches!(
            engine.join_battle(&battle.id, "creator", 1),
            Err(HazardError::Conflict(ConflictError::AlreadySeated))
        ));
        assert!(matches!(
            engine.join_battle(&battle.id, "p2", 0),
            Err(HazardError::Conflict(ConflictError::SeatOccupied(0)))
        ));
        assert!(matches!(
            engine.join_battle(&battle.id, "p2", 7),
            Err(HazardError::Validation(ValidationError::InvalidSeat { .. }))
        ));

        let joined = engine.join_battle(&battle.id, "p2", 2).expect("join");
        assert_eq!(joined.state, BattleState::Created);
        let details = engine.get_battle(&battle.id).expect("details");
        assert_eq!(details.source, "server");
        assert_eq!(details.users[2].as_ref().map(|u| u.username.as_str()), Some("p2"));
        assert_eq!(details.cases.len(), 1);
    }
}
