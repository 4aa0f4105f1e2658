//! Battle settlement: winner selection and value redistribution

use crate::{
    errors::{HazardError, HazardResult},
    games::{
        battle::{Battle, BattleType},
        selector,
        types::{Money, Skin},
    },
};
use rand::{Rng, RngCore};
use std::{cmp::Reverse, collections::BTreeMap};

/// Tunables for redistribution
#[derive(Debug, Clone, Copy)]
pub struct SettlementRules {
    pub consolation_percent: i64,
    pub max_items: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleOutcome {
    pub winner_seats: Vec<usize>,
    pub winner_ids: Vec<String>,
    pub is_tie: bool,
    /// Keyed by participant id
    pub allocated: BTreeMap<String, Vec<Skin>>,
}

/// Decide winners and build every seat's payout bundle
pub fn settle_battle(
    battle: &Battle,
    catalog: &[Skin],
    rules: &SettlementRules,
    rng: &mut dyn RngCore,
) -> HazardResult<BattleOutcome> {
    let seats = battle.seats()?;
    let ids: Vec<String> = seats.iter().map(|s| s.participant_id().to_string()).collect();
    let items = seat_items(battle, seats.len());
    let totals: Vec<Money> = items.iter().map(|i| i.iter().map(|s| s.price).sum()).collect();
    let consolation = battle.battle_cost.percent(rules.consolation_percent);

    let mut allocated = BTreeMap::new();
    let (winner_seats, is_tie) = if battle.battle_type == BattleType::Razem {
        let share = totals.iter().sum::<Money>().split(seats.len());
        for id in &ids {
            allocated.insert(id.clone(), allocate(catalog, share, rules.max_items));
        }
        ((0..seats.len()).collect(), false)
    } else if battle.mode.is_team() {
        if seats.len() != 4 {
            return Err(HazardError::Integrity(format!(
                "team battle {} has {} seats",
                battle.id,
                seats.len()
            )));
        }
        let team_a = totals[0] + totals[2];
        let team_b = totals[1] + totals[3];
        let (a_wins, is_tie) = if team_a == team_b {
            (rng.gen::<f64>() < 0.5, true)
        } else if battle.battle_type.low_value_wins() {
            (team_a < team_b, false)
        } else {
            (team_a > team_b, false)
        };
        let (winners, losers) = if a_wins { ([0, 2], [1, 3]) } else { ([1, 3], [0, 2]) };

        let share = (team_a + team_b).split(2);
        for seat in winners {
            allocated.insert(ids[seat].clone(), allocate(catalog, share, rules.max_items));
        }
        for seat in losers {
            allocated.insert(ids[seat].clone(), allocate(catalog, consolation, rules.max_items));
        }
        (winners.to_vec(), is_tie)
    } else {
        let extreme = if battle.battle_type.low_value_wins() {
            totals.iter().min()
        } else {
            totals.iter().max()
        }
        .copied()
        .unwrap_or(Money::ZERO);
        let tied: Vec<usize> = (0..totals.len()).filter(|&i| totals[i] == extreme).collect();
        let is_tie = tied.len() > 1;
        let winner = tied[selector::pick_index(rng, tied.len())];

        for (seat, id) in ids.iter().enumerate() {
            let bundle = if seat == winner {
                items[seat].clone()
            } else {
                allocate(catalog, consolation, rules.max_items)
            };
            allocated.insert(id.clone(), bundle);
        }
        (vec![winner], is_tie)
    };

    Ok(BattleOutcome {
        winner_ids: winner_seats.iter().map(|&i| ids[i].clone()).collect(),
        winner_seats,
        is_tie,
        allocated,
    })
}

/// Items each seat drew, in case order
fn seat_items(battle: &Battle, seat_count: usize) -> Vec<Vec<Skin>> {
    let mut items = vec![Vec::new(); seat_count];
    for round in &battle.rolled_skins {
        for (seat, skin) in round.iter().enumerate().take(seat_count) {
            if let Some(skin) = skin {
                items[seat].push(skin.clone());
            }
        }
    }
    items
}

/// Greedy conversion of `target` into catalog items.
///
/// Repeatedly takes the most expensive item that still fits (first in
/// catalog order on equal prices), or the cheapest item when none fits,
/// up to `max_items`. Value left over becomes a "Balance" filler.
pub fn allocate(catalog: &[Skin], target: Money, max_items: usize) -> Vec<Skin> {
    let mut remaining = target;
    let mut bundle = Vec::new();

    while remaining.is_positive() && bundle.len() < max_items {
        let fitting = catalog
            .iter()
            .filter(|skin| skin.price <= remaining)
            .min_by_key(|skin| Reverse(skin.price));
        let Some(skin) = fitting.or_else(|| catalog.iter().min_by_key(|skin| skin.price)) else {
            break;
        };
        remaining -= skin.price;
        bundle.push(skin.clone());
    }

    if remaining.is_positive() {
        bundle.push(Skin::balance_filler(remaining));
    }
    bundle
}
