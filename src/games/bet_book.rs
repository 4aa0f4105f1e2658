//! Pending wagers of the current roulette round

use crate::games::types::{Color, Money, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub user_id: String,
    pub username: String,
    pub profile_image: String,
    pub level: u32,
    pub exp: u64,
    pub color: Color,
    pub amount: Money,
}

impl Bet {
    /// Bet snapshot taken from the bettor's record after the debit
    pub fn from_user(user: &User, color: Color, amount: Money) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            profile_image: user.profile_image.clone(),
            level: user.level,
            exp: user.exp,
            color,
            amount,
        }
    }
}

/// One bet per participant and color; repeat wagers accumulate
#[derive(Debug, Default)]
pub struct BetBook {
    bets: Vec<Bet>,
}

impl BetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&mut self, bet: Bet) {
        match self
            .bets
            .iter_mut()
            .find(|b| b.user_id == bet.user_id && b.color == bet.color)
        {
            Some(existing) => {
                existing.amount += bet.amount;
                existing.username = bet.username;
                existing.profile_image = bet.profile_image;
                existing.level = bet.level;
                existing.exp = bet.exp;
            }
            None => self.bets.push(bet),
        }
    }

    /// All bets, largest first
    pub fn sorted(&self) -> Vec<Bet> {
        let mut bets = self.bets.clone();
        bets.sort_by(|a, b| b.amount.cmp(&a.amount));
        bets
    }

    pub fn by_color(&self, color: Color) -> Vec<Bet> {
        self.sorted().into_iter().filter(|b| b.color == color).collect()
    }

    /// Remove and return every bet
    pub fn take(&mut self) -> Vec<Bet> {
        std::mem::take(&mut self.bets)
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }
}
