//! API Request and Response Models
//!
//! Wire shapes for the HTTP endpoints. Game read models (`Battle`,
//! `RouletteSnapshot`, receipts) serialize themselves and are returned as-is.

use crate::{
    errors::ValidationError,
    games::{
        battle::{BattleMode, BattleType, Visibility},
        battle_engine::CreateBattle,
    },
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_battles: usize,
    pub websocket_clients: u64,
}

/// Generic acknowledgement for endpoints without a payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// POST /bet
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub user_id: String,
    pub color: String,
    /// Accepted as a JSON string or number; parsed as a decimal amount
    pub amount: serde_json::Value,
}

impl BetRequest {
    pub fn amount_text(&self) -> String {
        match &self.amount {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

/// POST /cases/:id/open
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenCaseRequest {
    pub user_id: String,
    #[serde(default = "default_case_count")]
    pub num_cases: usize,
}

fn default_case_count() -> usize {
    1
}

/// POST /user/:id/sell
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub item_id: String,
}

/// POST /user/:id/sellAll
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellAllRequest {
    pub item_ids: Vec<String>,
}

/// A case reference, either a bare id or a case object carrying `_id`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CaseRef {
    Id(String),
    Object {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl CaseRef {
    pub fn id(&self) -> &str {
        match self {
            CaseRef::Id(id) | CaseRef::Object { id } => id,
        }
    }
}

/// POST /createBattle
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBattleRequest {
    pub user_id: String,
    pub selected_cases: Vec<CaseRef>,
    pub battle_type: String,
    pub battle_mode: String,
    #[serde(default = "default_visibility")]
    pub battle_visibility: String,
}

fn default_visibility() -> String {
    "public".to_string()
}

fn parse_label<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
}

impl CreateBattleRequest {
    pub fn into_command(self) -> Result<CreateBattle, ValidationError> {
        let battle_type: BattleType = parse_label(&self.battle_type)
            .ok_or_else(|| ValidationError::InvalidBattleType(self.battle_type.clone()))?;
        let mode: BattleMode = self.battle_mode.parse()?;
        let visibility: Visibility = parse_label(&self.battle_visibility).ok_or_else(|| {
            ValidationError::Field(format!("invalid visibility: {}", self.battle_visibility))
        })?;

        Ok(CreateBattle {
            cases: self.selected_cases.iter().map(|c| c.id().to_string()).collect(),
            battle_type,
            mode,
            visibility,
            creator_id: self.user_id,
        })
    }
}

/// POST /joinBattle/:id and POST /addBot/:id
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    #[serde(alias = "user")]
    pub user_id: String,
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_amount_accepts_string_or_number() {
        let req: BetRequest =
            serde_json::from_str(r#"{"userId":"u","color":"red","amount":"12.50"}"#).unwrap();
        assert_eq!(req.amount_text(), "12.50");
        let req: BetRequest =
            serde_json::from_str(r#"{"userId":"u","color":"red","amount":3}"#).unwrap();
        assert_eq!(req.amount_text(), "3");
    }

    #[test]
    fn test_create_battle_request_conversion() {
        let req: CreateBattleRequest = serde_json::from_str(
            r#"{"userId":"u1","selectedCases":[{"_id":"c1","name":"x"},"c2"],
                "battleType":"Standardowy","battleMode":"2v2","battleVisibility":"private"}"#,
        )
        .unwrap();
        let cmd = req.into_command().unwrap();
        assert_eq!(cmd.cases, vec!["c1", "c2"]);
        assert_eq!(cmd.battle_type, BattleType::Standard);
        assert_eq!(cmd.mode, BattleMode::TwoVsTwo);
        assert_eq!(cmd.visibility, Visibility::Private);
        assert_eq!(cmd.creator_id, "u1");
    }

    #[test]
    fn test_create_battle_rejects_unknown_type() {
        let req: CreateBattleRequest = serde_json::from_str(
            r#"{"userId":"u1","selectedCases":["c1"],"battleType":"Mega","battleMode":"1v1"}"#,
        )
        .unwrap();
        assert!(matches!(req.into_command(), Err(ValidationError::InvalidBattleType(_))));
    }

    #[test]
    fn test_seat_request_accepts_user_alias() {
        let req: SeatRequest = serde_json::from_str(r#"{"user":"u1","index":2}"#).unwrap();
        assert_eq!(req.user_id, "u1");
        assert_eq!(req.index, 2);
    }
}
