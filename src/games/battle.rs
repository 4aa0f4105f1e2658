//! Case battle record and its state transitions

use crate::{
    errors::{ConflictError, HazardError, HazardResult, ValidationError},
    games::types::{Money, PublicUser, Skin},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// How drawn value is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleType {
    /// Highest total wins
    #[serde(alias = "Standardowy")]
    Standard,
    /// Lowest total wins
    Crazy,
    /// Everything is pooled and shared evenly
    Razem,
}

impl BattleType {
    pub fn low_value_wins(self) -> bool {
        self == BattleType::Crazy
    }
}

/// Seat layout of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BattleMode {
    OneVsOne,
    OneVsOneVsOne,
    OneVsOneVsOneVsOne,
    TwoVsTwo,
    /// Unlabelled free-for-all with 2 to 4 seats
    FreeForAll(u8),
}

impl BattleMode {
    pub fn seats(self) -> usize {
        match self {
            BattleMode::OneVsOne => 2,
            BattleMode::OneVsOneVsOne => 3,
            BattleMode::OneVsOneVsOneVsOne | BattleMode::TwoVsTwo => 4,
            BattleMode::FreeForAll(n) => n as usize,
        }
    }

    pub fn is_team(self) -> bool {
        self == BattleMode::TwoVsTwo
    }
}

impl TryFrom<String> for BattleMode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for BattleMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1v1" => Ok(BattleMode::OneVsOne),
            "1v1v1" => Ok(BattleMode::OneVsOneVsOne),
            "1v1v1v1" => Ok(BattleMode::OneVsOneVsOneVsOne),
            "2v2" => Ok(BattleMode::TwoVsTwo),
            "2" => Ok(BattleMode::FreeForAll(2)),
            "3" => Ok(BattleMode::FreeForAll(3)),
            "4" => Ok(BattleMode::FreeForAll(4)),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for BattleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleMode::OneVsOne => f.write_str("1v1"),
            BattleMode::OneVsOneVsOne => f.write_str("1v1v1"),
            BattleMode::OneVsOneVsOneVsOne => f.write_str("1v1v1v1"),
            BattleMode::TwoVsTwo => f.write_str("2v2"),
            BattleMode::FreeForAll(n) => write!(f, "{}", n),
        }
    }
}

impl From<BattleMode> for String {
    fn from(mode: BattleMode) -> Self {
        mode.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[serde(alias = "Public")]
    Public,
    #[serde(alias = "Private")]
    Private,
}

/// Lifecycle; moves forward one step at a time. `Aborted` is reachable
/// from any unfinished state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleState {
    Created,
    Ready,
    Rolling,
    Finished,
    Aborted,
}

impl BattleState {
    fn next(self) -> Option<BattleState> {
        match self {
            BattleState::Created => Some(BattleState::Ready),
            BattleState::Ready => Some(BattleState::Rolling),
            BattleState::Rolling => Some(BattleState::Finished),
            BattleState::Finished | BattleState::Aborted => None,
        }
    }
}

/// Seat occupant. Bots carry their whole public profile and never touch
/// the store; humans are resolved by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seat {
    Bot(PublicUser),
    Human {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl Seat {
    pub fn human(id: impl Into<String>) -> Self {
        Seat::Human { id: id.into() }
    }

    pub fn participant_id(&self) -> &str {
        match self {
            Seat::Bot(profile) => &profile.id,
            Seat::Human { id } => id,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Seat::Bot(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battle {
    #[serde(rename = "_id")]
    pub id: String,
    /// Case ids in roll order; repeats allowed
    pub cases: Vec<String>,
    #[serde(rename = "type")]
    pub battle_type: BattleType,
    pub mode: BattleMode,
    pub visibility: Visibility,
    pub state: BattleState,
    pub battle_cost: Money,
    pub users: Vec<Option<Seat>>,
    /// `rolled_skins[case][seat]`
    pub rolled_skins: Vec<Vec<Option<Skin>>>,
    pub current_case_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
    #[serde(default)]
    pub winner_ids: Vec<String>,
    #[serde(default)]
    pub is_tie: bool,
    #[serde(default)]
    pub allocated_skins: BTreeMap<String, Vec<Skin>>,
    pub created_at: DateTime<Utc>,
}

impl Battle {
    pub fn new(
        id: String,
        cases: Vec<String>,
        battle_type: BattleType,
        mode: BattleMode,
        visibility: Visibility,
        battle_cost: Money,
        creator_id: &str,
    ) -> Self {
        let mut users = vec![None; mode.seats()];
        users[0] = Some(Seat::human(creator_id));
        Self {
            id,
            cases,
            battle_type,
            mode,
            visibility,
            state: BattleState::Created,
            battle_cost,
            users,
            rolled_skins: Vec::new(),
            current_case_index: 0,
            countdown: None,
            winner_ids: Vec::new(),
            is_tie: false,
            allocated_skins: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn creator_id(&self) -> Option<&str> {
        self.users.first().and_then(|s| s.as_ref()).map(Seat::participant_id)
    }

    pub fn is_full(&self) -> bool {
        self.users.iter().all(Option::is_some)
    }

    pub fn is_seated(&self, participant_id: &str) -> bool {
        self.users
            .iter()
            .flatten()
            .any(|seat| seat.participant_id() == participant_id)
    }

    pub fn bot_names(&self) -> Vec<&str> {
        self.users
            .iter()
            .flatten()
            .filter_map(|seat| match seat {
                Seat::Bot(profile) => Some(profile.username.as_str()),
                Seat::Human { .. } => None,
            })
            .collect()
    }

    /// Place `seat` at `index`; the battle must still be open
    pub fn fill_seat(&mut self, index: usize, seat: Seat) -> HazardResult<()> {
        if self.state != BattleState::Created {
            return Err(ConflictError::BattleNotOpen.into());
        }
        if index >= self.users.len() {
            return Err(ValidationError::InvalidSeat {
                index,
                seats: self.users.len(),
            }
            .into());
        }
        if self.is_seated(seat.participant_id()) {
            return Err(ConflictError::AlreadySeated.into());
        }
        if self.users[index].is_some() {
            return Err(ConflictError::SeatOccupied(index).into());
        }
        self.users[index] = Some(seat);
        Ok(())
    }

    /// Move to the next lifecycle state
    pub fn advance(&mut self, to: BattleState) -> HazardResult<()> {
        if self.state.next() != Some(to) {
            return Err(HazardError::Integrity(format!(
                "battle {} cannot move from {:?} to {:?}",
                self.id, self.state, to
            )));
        }
        if to >= BattleState::Ready && !self.is_full() {
            return Err(HazardError::Integrity(format!(
                "battle {} has empty seats",
                self.id
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Drop partial roll results and mark the battle as abandoned
    pub fn abort(&mut self) -> HazardResult<()> {
        if matches!(self.state, BattleState::Finished | BattleState::Aborted) {
            return Err(HazardError::Integrity(format!(
                "battle {} is already {:?}",
                self.id, self.state
            )));
        }
        self.state = BattleState::Aborted;
        self.countdown = None;
        self.rolled_skins.clear();
        self.current_case_index = 0;
        Ok(())
    }

    /// Occupied seats; errors if any is empty
    pub fn seats(&self) -> HazardResult<Vec<&Seat>> {
        self.users
            .iter()
            .enumerate()
            .map(|(i, seat)| {
                seat.as_ref().ok_or_else(|| {
                    HazardError::Integrity(format!("battle {} seat {} is empty", self.id, i))
                })
            })
            .collect()
    }
}
