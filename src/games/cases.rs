//! Loot cases: upload, opening and selling drawn items

use crate::{
    context::GameContext,
    errors::{HazardError, HazardResult, ValidationError},
    games::{
        selector,
        types::{Case, CaseItem, HistoryEntry, InventoryItem, Money, Skin, TransactionRecord},
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

const CHANCE_TOLERANCE: f64 = 1e-6;

/// Case definition as submitted by an administrator
#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
    pub name: String,
    #[serde(rename = "type", default)]
    pub case_type: String,
    #[serde(default)]
    pub image: String,
    #[serde(alias = "skins")]
    pub items: Vec<CaseItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseOpening {
    pub skins: Vec<InventoryItem>,
    pub new_balance: Money,
    pub level: u32,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub new_balance: Money,
    pub sold: Vec<HistoryEntry>,
    pub total: Money,
}

/// Case price: expected item value plus the house edge, rounded to cents
pub fn case_price(items: &[CaseItem], house_edge: f64) -> Money {
    let expected_cents: f64 = items
        .iter()
        .map(|item| item.price.cents() as f64 * item.chance / 100.0)
        .sum();
    Money::from_cents((expected_cents * house_edge).round() as i64)
}

/// Chances must each lie in [0, 100] and add up to exactly 100
pub fn validate_chances(items: &[CaseItem]) -> HazardResult<()> {
    for item in items {
        if !item.chance.is_finite() || !(0.0..=100.0).contains(&item.chance) {
            return Err(ValidationError::InvalidChance {
                item: item.name.clone(),
                chance: item.chance,
            }
            .into());
        }
        if item.price < Money::ZERO {
            return Err(ValidationError::Field(format!("item {} has a negative price", item.name)).into());
        }
    }
    let sum: f64 = items.iter().map(|item| item.chance).sum();
    if (sum - 100.0).abs() > CHANCE_TOLERANCE {
        return Err(ValidationError::ChanceSum(sum).into());
    }
    Ok(())
}

pub struct CaseService {
    ctx: GameContext,
}

impl CaseService {
    pub fn new(ctx: GameContext) -> Self {
        Self { ctx }
    }

    pub fn upload_case(&self, new_case: NewCase) -> HazardResult<Case> {
        if new_case.name.trim().is_empty() {
            return Err(ValidationError::Field("case name is required".to_string()).into());
        }
        validate_chances(&new_case.items)?;

        let case = Case {
            id: Uuid::new_v4().to_string(),
            case_price: case_price(&new_case.items, self.ctx.config.cases.house_edge),
            name: new_case.name,
            case_type: new_case.case_type,
            image: new_case.image,
            items: new_case.items,
        };
        self.ctx.store.save_case(&case)?;
        // Case items double as the catalog used for battle allocations
        for item in &case.items {
            self.ctx.store.save_skin(&item.to_skin())?;
        }
        info!(case_id = %case.id, name = %case.name, price = %case.case_price, "case uploaded");
        Ok(case)
    }

    pub fn get_case(&self, case_id: &str) -> HazardResult<Case> {
        self.ctx.store.load_case(case_id)
    }

    /// Draw `count` items, charge for them and put them in the inventory.
    ///
    /// The balance is checked before drawing and the debit happens only
    /// after a successful draw, so a selection failure costs nothing.
    pub fn open_case(&self, case_id: &str, user_id: &str, count: usize) -> HazardResult<CaseOpening> {
        let max = self.ctx.config.cases.max_open_count;
        if count == 0 || count > max {
            return Err(ValidationError::OpenCount { got: count, max }.into());
        }
        let case = self.ctx.store.load_case(case_id)?;
        let cost = case
            .case_price
            .checked_times(count as i64)
            .ok_or_else(|| ValidationError::InvalidAmount(format!("{} x {}", count, case.case_price)))?;
        if self.ctx.store.load_user(user_id)?.balance < cost {
            return Err(ValidationError::InsufficientBalance.into());
        }

        let drawn: Vec<Skin> = self.ctx.rng.with(|rng| {
            selector::draw(&case.items, count, rng)
                .map(|items| items.into_iter().map(CaseItem::to_skin).collect::<Vec<_>>())
        })?;
        let user = self.ctx.wallet.spend(user_id, cost)?;

        let now = Utc::now();
        let items: Vec<InventoryItem> = drawn
            .into_iter()
            .map(|skin| InventoryItem {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                skin,
                case_id: case.id.clone(),
                obtained_at: now,
            })
            .collect();
        self.ctx.store.insert_inventory(&items)?;
        self.ctx.store.record_transaction(&TransactionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: Money::ZERO - cost,
            balance_after: user.balance,
            action: format!("Opened {} x {}", count, case.name),
            destination: format!("/case/{}", case.id),
            created_at: now,
        })?;

        self.ctx.metrics.cases_opened.inc_by(count as u64);
        debug!(user_id, case_id, count, cost = %cost, "case opened");

        Ok(CaseOpening {
            skins: items,
            new_balance: user.balance,
            level: user.level,
            exp: user.exp,
        })
    }

    pub fn sell_item(&self, user_id: &str, item_id: &str) -> HazardResult<SaleReceipt> {
        self.sell(user_id, &[item_id.to_string()])
    }

    /// Sell every listed item the user owns; unknown ids are skipped
    pub fn sell_items(&self, user_id: &str, item_ids: &[String]) -> HazardResult<SaleReceipt> {
        self.sell(user_id, item_ids)
    }

    /// Items leave the inventory under the wallet lock and only the ones
    /// actually removed are credited, so a repeated sale finds nothing.
    fn sell(&self, user_id: &str, item_ids: &[String]) -> HazardResult<SaleReceipt> {
        let mut items = Vec::new();
        let mut total = Money::ZERO;
        let user = self.ctx.wallet.update(user_id, |user| {
            items = self.ctx.store.take_inventory(user_id, item_ids)?;
            if items.is_empty() {
                return Err(HazardError::not_found("item", item_ids.join(",")));
            }
            total = items.iter().map(|i| i.skin.price).sum();
            user.balance += total;
            Ok(())
        })?;

        let action = match items.as_slice() {
            [item] => format!("Sold {}", item.skin.name),
            items => format!("Sold {} items", items.len()),
        };
        let now = Utc::now();
        let sold: Vec<HistoryEntry> = items
            .into_iter()
            .map(|item| HistoryEntry {
                item,
                status: "sold".to_string(),
                sold_at: now,
            })
            .collect();
        self.ctx
            .store
            .append_history(user_id, &sold, self.ctx.config.cases.history_cap)?;
        self.ctx.store.record_transaction(&TransactionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: total,
            balance_after: user.balance,
            action,
            destination: "/inventory".to_string(),
            created_at: now,
        })?;

        self.ctx.metrics.items_sold.inc_by(sold.len() as u64);
        debug!(user_id, count = sold.len(), total = %total, "items sold");
        Ok(SaleReceipt {
            new_balance: user.balance,
            sold,
            total,
        })
    }

    pub fn inventory_history(&self, user_id: &str) -> HazardResult<Vec<HistoryEntry>> {
        self.ctx.store.list_history(user_id)
    }
}
