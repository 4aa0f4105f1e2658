//! Core data model shared by roulette, cases and battles
//!
//! Money is kept in integer cents. On the wire it is a plain decimal
//! number with at most two fractional digits, matching what clients send.

use crate::errors::{HazardResult, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
    str::FromStr,
};

/// Amount of virtual currency in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Round a floating amount to the nearest cent
    pub fn from_f64(value: f64) -> Self {
        Money((value * 100.0).round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse a user supplied amount: digits with an optional 1-2 digit fraction
    pub fn parse(raw: &str) -> HazardResult<Self> {
        let invalid = || ValidationError::InvalidAmount(raw.to_string());
        let raw = raw.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (raw, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid().into());
        }
        let fraction_cents = match fraction {
            None => 0,
            Some(f) if (1..=2).contains(&f.len()) && f.bytes().all(|b| b.is_ascii_digit()) => {
                let digits: i64 = f.parse().map_err(|_| invalid())?;
                if f.len() == 1 { digits * 10 } else { digits }
            }
            Some(_) => return Err(invalid().into()),
        };

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(invalid)?;
        Ok(Money(cents))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn times(self, factor: i64) -> Self {
        Money(self.0 * factor)
    }

    pub fn checked_times(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Money)
    }

    /// `percent` per cent of this amount, rounded down to the cent
    pub fn percent(self, percent: i64) -> Self {
        Money(self.0 * percent / 100)
    }

    /// Even share for `parts` recipients; leftover cents are dropped
    pub fn split(self, parts: usize) -> Self {
        if parts == 0 {
            return Money::ZERO;
        }
        Money(self.0 / parts as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("amount must be finite"));
        }
        Ok(Money::from_f64(value))
    }
}

/// Roulette pocket color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    /// Simplified wheel: 0 is green, odd numbers red, even numbers black
    pub fn from_number(number: u8) -> Self {
        if number == 0 {
            Color::Green
        } else if number % 2 == 1 {
            Color::Red
        } else {
            Color::Black
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Black => "black",
            Color::Green => "green",
        }
    }
}

impl FromStr for Color {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Color::Red),
            "black" => Ok(Color::Black),
            "green" => Ok(Color::Green),
            other => Err(ValidationError::InvalidColor(other.to_string())),
        }
    }
}

/// Stored player account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub balance: Money,
    #[serde(default)]
    pub exp: u64,
    /// Spent cents not yet worth a whole experience point
    #[serde(default, skip_serializing_if = "is_zero")]
    pub exp_carry_cents: u64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub profile_image: String,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn default_role() -> String {
    "user".to_string()
}

fn default_level() -> u32 {
    1
}

impl User {
    pub fn new(id: impl Into<String>, username: impl Into<String>, balance: Money) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: default_role(),
            balance,
            exp: 0,
            exp_carry_cents: 0,
            level: 1,
            profile_image: String::new(),
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role.clone(),
            exp: self.exp,
            level: self.level,
            profile_image: self.profile_image.clone(),
            bot: false,
        }
    }
}

/// Public view of a participant, safe to broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub role: String,
    pub exp: u64,
    pub level: u32,
    pub profile_image: String,
    pub bot: bool,
}

/// Item as shown to players: catalog entries, drawn items, allocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub name: String,
    pub price: Money,
    pub rarity: String,
    pub image: String,
}

impl Skin {
    /// Synthetic filler carrying value the catalog could not cover
    pub fn balance_filler(amount: Money) -> Self {
        Skin {
            name: "Balance".to_string(),
            price: amount,
            rarity: "Money".to_string(),
            image: "/difference_money.png".to_string(),
        }
    }
}

/// Weighted entry of a case; `chance` is a percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseItem {
    pub name: String,
    pub price: Money,
    pub chance: f64,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub image: String,
}

impl CaseItem {
    pub fn to_skin(&self) -> Skin {
        Skin {
            name: self.name.clone(),
            price: self.price,
            rarity: self.rarity.clone(),
            image: self.image.clone(),
        }
    }
}

/// Loot case definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub case_type: String,
    pub image: String,
    #[serde(rename = "skins")]
    pub items: Vec<CaseItem>,
    pub case_price: Money,
}

/// Item owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub skin: Skin,
    pub case_id: String,
    pub obtained_at: DateTime<Utc>,
}

/// Inventory item after it left the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub status: String,
    pub sold_at: DateTime<Utc>,
}

/// Balance movement ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    /// Signed change: negative for spends
    pub amount: Money,
    pub balance_after: Money,
    pub action: String,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}
