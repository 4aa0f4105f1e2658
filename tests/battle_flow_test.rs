//! End-to-end case battle: creation, bot fill, countdown, rolls, settlement

use hazard::{
    config::HazardConfig,
    context::{GameContext, SharedRng},
    games::{
        battle::{BattleMode, BattleState, BattleType, Visibility},
        battle_engine::CreateBattle,
        types::{Case, CaseItem, Money, Skin, User},
        BattleEngine,
    },
    notify::{BattleEvent, Event},
    store::{MemoryStore, Store},
    testing::{RecordingNotifier, RecordingScheduler, ScriptedRng},
};
use std::{sync::Arc, time::Duration};

fn item(name: &str, cents: i64, chance: f64) -> CaseItem {
    CaseItem {
        name: name.to_string(),
        price: Money::from_cents(cents),
        chance,
        rarity: "common".to_string(),
        image: format!("/skins/{}.png", name),
    }
}

fn seed_case(store: &MemoryStore, id: &str) {
    let items = vec![item("knife", 800, 50.0), item("sticker", 5, 50.0)];
    for i in &items {
        store.save_skin(&i.to_skin()).expect("catalog");
    }
    store
        .save_case(&Case {
            id: id.to_string(),
            name: id.to_string(),
            case_type: "standard".to_string(),
            image: String::new(),
            items,
            case_price: Money::from_cents(500),
        })
        .expect("case");
}

struct Harness {
    engine: Arc<BattleEngine>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    scheduler: Arc<RecordingScheduler>,
}

fn harness(fractions: Vec<f64>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store
        .save_user(&User::new("u1", "alice", Money::from_cents(10_000)))
        .expect("user");
    seed_case(&store, "case-a");
    seed_case(&store, "case-b");

    let notifier = Arc::new(RecordingNotifier::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let ctx = GameContext::new(
        HazardConfig::testing(),
        store.clone(),
        notifier.clone(),
        scheduler.clone(),
        SharedRng::new(ScriptedRng::new(fractions)),
    )
    .expect("context");

    Harness {
        engine: BattleEngine::new(ctx),
        store,
        notifier,
        scheduler,
    }
}

async fn wait_until_finished(store: &MemoryStore, battle_id: &str) {
    for _ in 0..1_000 {
        let finished = store
            .get_battle(battle_id)
            .expect("read")
            .map(|b| b.state == BattleState::Finished)
            .unwrap_or(false);
        if finished {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("battle {} never finished", battle_id);
}

#[tokio::test]
async fn test_one_vs_one_battle_against_bot() {
    // bot name, four rolls (case-a: knife/sticker, case-b: sticker/sticker), tie-break
    let h = harness(vec![0.0, 0.1, 0.9, 0.9, 0.9, 0.0]);

    let battle = h
        .engine
        .create_battle(CreateBattle {
            cases: vec!["case-a".to_string(), "case-b".to_string()],
            battle_type: BattleType::Standard,
            mode: BattleMode::OneVsOne,
            visibility: Visibility::Public,
            creator_id: "u1".to_string(),
        })
        .expect("create");
    assert_eq!(battle.battle_cost, Money::from_cents(1_000));
    assert_eq!(battle.users.len(), 2);

    let seated = h.engine.add_bot(&battle.id, "u1", 1).expect("bot");
    assert_eq!(seated.state, BattleState::Ready);
    assert_eq!(seated.bot_names(), vec!["Skibidi"]);
    let bot_id = seated.users[1].as_ref().expect("bot seat").participant_id().to_string();

    wait_until_finished(&h.store, &battle.id).await;

    let stored = h.store.get_battle(&battle.id).unwrap().expect("persisted");
    assert_eq!(stored.winner_ids, vec!["u1".to_string()]);
    assert!(!stored.is_tie);
    assert_eq!(stored.rolled_skins.len(), 2);

    let winner_items: Vec<&str> = stored.allocated_skins["u1"].iter().map(|s| s.name.as_str()).collect();
    assert_eq!(winner_items, vec!["knife", "sticker"]);

    let consolation: &Vec<Skin> = &stored.allocated_skins[&bot_id];
    let consolation_value: Money = consolation.iter().map(|s| s.price).sum();
    assert_eq!(consolation_value, Money::from_cents(10));
    assert!(consolation.iter().all(|s| s.name == "sticker"));

    let kinds = h.notifier.broadcast_kinds();
    assert_eq!(
        kinds,
        vec![
            "newBattle",
            "updateBattle",
            "countdown",
            "countdown",
            "countdown",
            "rollItems",
            "rollItems",
            "battleEnded",
        ]
    );

    let countdowns: Vec<Option<u32>> = h
        .notifier
        .broadcasts()
        .into_iter()
        .filter_map(|e| match e {
            Event::Battle(BattleEvent::Countdown { battle }) => Some(battle.countdown),
            _ => None,
        })
        .collect();
    assert_eq!(countdowns, vec![Some(3), Some(2), Some(1)]);

    // three countdown ticks and one pause between the two cases
    assert_eq!(
        h.scheduler.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(3),
        ]
    );

    assert_eq!(h.engine.active_count(), 0);
    let details = h.engine.get_battle(&battle.id).expect("details");
    assert_eq!(details.source, "database");
    assert_eq!(details.cases.len(), 2);
}

#[tokio::test]
async fn test_join_after_start_is_rejected() {
    let h = harness(vec![0.0]);
    h.store
        .save_user(&User::new("u2", "bob", Money::from_cents(10_000)))
        .expect("user");

    let battle = h
        .engine
        .create_battle(CreateBattle {
            cases: vec!["case-a".to_string()],
            battle_type: BattleType::Crazy,
            mode: BattleMode::OneVsOne,
            visibility: Visibility::Public,
            creator_id: "u1".to_string(),
        })
        .expect("create");
    h.engine.join_battle(&battle.id, "u2", 1).expect("join");

    wait_until_finished(&h.store, &battle.id).await;

    let err = h.engine.join_battle(&battle.id, "u2", 1).unwrap_err();
    assert!(matches!(
        err,
        hazard::HazardError::Conflict(hazard::errors::ConflictError::BattleNotOpen)
    ));
    assert!(h.engine.join_battle("missing", "u2", 1).is_err());
}
