//! Document persistence for users, cases, battles, inventories and ledgers
//!
//! Game services only talk to the `Store` trait. `RocksStore` keeps JSON
//! documents under prefixed keys; `MemoryStore` backs tests and
//! throwaway runs.

use crate::{
    errors::{HazardError, HazardResult},
    games::{
        battle::Battle,
        types::{Case, HistoryEntry, InventoryItem, Skin, TransactionRecord, User},
    },
    storage::RocksStorage,
};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};
use tracing::debug;

const USER_PREFIX: &str = "user:";
const CASE_PREFIX: &str = "case:";
const BATTLE_PREFIX: &str = "battle:";
const INVENTORY_PREFIX: &str = "inv:";
const HISTORY_PREFIX: &str = "hist:";
const SKIN_PREFIX: &str = "skin:";
const TRANSACTION_PREFIX: &str = "txn:";

/// Persistence collaborator used by every game service
pub trait Store: Send + Sync {
    fn get_user(&self, id: &str) -> HazardResult<Option<User>>;
    fn save_user(&self, user: &User) -> HazardResult<()>;

    fn get_case(&self, id: &str) -> HazardResult<Option<Case>>;
    fn save_case(&self, case: &Case) -> HazardResult<()>;

    fn get_battle(&self, id: &str) -> HazardResult<Option<Battle>>;
    fn save_battle(&self, battle: &Battle) -> HazardResult<()>;

    fn insert_inventory(&self, items: &[InventoryItem]) -> HazardResult<()>;
    fn get_inventory_item(&self, user_id: &str, item_id: &str) -> HazardResult<Option<InventoryItem>>;
    fn list_inventory(&self, user_id: &str) -> HazardResult<Vec<InventoryItem>>;
    /// Remove the listed items and return the ones that were actually owned
    fn take_inventory(&self, user_id: &str, item_ids: &[String]) -> HazardResult<Vec<InventoryItem>>;

    /// Append entries and keep only the newest `cap` for the user
    fn append_history(&self, user_id: &str, entries: &[HistoryEntry], cap: usize) -> HazardResult<()>;
    /// Newest first
    fn list_history(&self, user_id: &str) -> HazardResult<Vec<HistoryEntry>>;

    /// Allocation catalog, in stable order
    fn list_skins(&self) -> HazardResult<Vec<Skin>>;
    fn save_skin(&self, skin: &Skin) -> HazardResult<()>;

    fn record_transaction(&self, record: &TransactionRecord) -> HazardResult<()>;
    fn list_transactions(&self, user_id: &str) -> HazardResult<Vec<TransactionRecord>>;

    fn load_user(&self, id: &str) -> HazardResult<User> {
        self.get_user(id)?.ok_or_else(|| HazardError::not_found("user", id))
    }

    fn load_case(&self, id: &str) -> HazardResult<Case> {
        self.get_case(id)?.ok_or_else(|| HazardError::not_found("case", id))
    }
}

/// RocksDB-backed store
#[derive(Clone)]
pub struct RocksStore {
    storage: RocksStorage,
}

impl RocksStore {
    pub fn new(storage: RocksStorage) -> Self {
        Self { storage }
    }

    fn read<T: DeserializeOwned>(&self, key: String) -> HazardResult<Option<T>> {
        match self.storage.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, key: String, value: &T) -> HazardResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.storage.put(key.as_bytes(), &bytes)
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> HazardResult<Vec<T>> {
        self.storage
            .scan_prefix(prefix.as_bytes())?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(HazardError::from))
            .collect()
    }
}

fn inventory_key(user_id: &str, item_id: &str) -> String {
    format!("{}{}:{}", INVENTORY_PREFIX, user_id, item_id)
}

fn history_key(entry: &HistoryEntry) -> String {
    // Timestamp first so a prefix scan returns oldest to newest.
    format!(
        "{}{}:{:020}:{}",
        HISTORY_PREFIX,
        entry.item.user_id,
        entry.sold_at.timestamp_micros().max(0),
        entry.item.id
    )
}

fn transaction_key(record: &TransactionRecord) -> String {
    format!(
        "{}{}:{:020}:{}",
        TRANSACTION_PREFIX,
        record.user_id,
        record.created_at.timestamp_micros().max(0),
        record.id
    )
}

impl Store for RocksStore {
    fn get_user(&self, id: &str) -> HazardResult<Option<User>> {
        self.read(format!("{}{}", USER_PREFIX, id))
    }

    fn save_user(&self, user: &User) -> HazardResult<()> {
        self.write(format!("{}{}", USER_PREFIX, user.id), user)
    }

    fn get_case(&self, id: &str) -> HazardResult<Option<Case>> {
        self.read(format!("{}{}", CASE_PREFIX, id))
    }

    fn save_case(&self, case: &Case) -> HazardResult<()> {
        self.write(format!("{}{}", CASE_PREFIX, case.id), case)
    }

    fn get_battle(&self, id: &str) -> HazardResult<Option<Battle>> {
        self.read(format!("{}{}", BATTLE_PREFIX, id))
    }

    fn save_battle(&self, battle: &Battle) -> HazardResult<()> {
        debug!(battle_id = %battle.id, state = ?battle.state, "persisting battle");
        self.write(format!("{}{}", BATTLE_PREFIX, battle.id), battle)
    }

    fn insert_inventory(&self, items: &[InventoryItem]) -> HazardResult<()> {
        let puts = items
            .iter()
            .map(|item| Ok((inventory_key(&item.user_id, &item.id), serde_json::to_vec(item)?)))
            .collect::<HazardResult<Vec<_>>>()?;
        self.storage.batch_write::<String, Vec<u8>>(&puts, &[])
    }

    fn get_inventory_item(&self, user_id: &str, item_id: &str) -> HazardResult<Option<InventoryItem>> {
        self.read(inventory_key(user_id, item_id))
    }

    fn list_inventory(&self, user_id: &str) -> HazardResult<Vec<InventoryItem>> {
        self.scan(&format!("{}{}:", INVENTORY_PREFIX, user_id))
    }

    fn take_inventory(&self, user_id: &str, item_ids: &[String]) -> HazardResult<Vec<InventoryItem>> {
        let mut taken = Vec::new();
        let mut deletes = Vec::new();
        for id in item_ids {
            let key = inventory_key(user_id, id);
            if let Some(item) = self.read::<InventoryItem>(key.clone())? {
                if !deletes.contains(&key) {
                    taken.push(item);
                    deletes.push(key);
                }
            }
        }
        self.storage.batch_write::<String, Vec<u8>>(&[], &deletes)?;
        Ok(taken)
    }

    fn append_history(&self, user_id: &str, entries: &[HistoryEntry], cap: usize) -> HazardResult<()> {
        let puts = entries
            .iter()
            .map(|entry| Ok((history_key(entry), serde_json::to_vec(entry)?)))
            .collect::<HazardResult<Vec<_>>>()?;
        self.storage.batch_write::<String, Vec<u8>>(&puts, &[])?;

        let prefix = format!("{}{}:", HISTORY_PREFIX, user_id);
        let rows = self.storage.scan_prefix(prefix.as_bytes())?;
        if rows.len() > cap {
            let drop_count = rows.len() - cap;
            let oldest: Vec<Vec<u8>> = rows
                .into_iter()
                .take(drop_count)
                .map(|(key, _)| key)
                .collect();
            debug!(user_id, dropped = drop_count, "trimming inventory history");
            self.storage.batch_write::<Vec<u8>, Vec<u8>>(&[], &oldest)?;
        }
        Ok(())
    }

    fn list_history(&self, user_id: &str) -> HazardResult<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self.scan(&format!("{}{}:", HISTORY_PREFIX, user_id))?;
        entries.reverse();
        Ok(entries)
    }

    fn list_skins(&self) -> HazardResult<Vec<Skin>> {
        self.scan(SKIN_PREFIX)
    }

    fn save_skin(&self, skin: &Skin) -> HazardResult<()> {
        self.write(format!("{}{}", SKIN_PREFIX, skin.name), skin)
    }

    fn record_transaction(&self, record: &TransactionRecord) -> HazardResult<()> {
        self.write(transaction_key(record), record)
    }

    fn list_transactions(&self, user_id: &str) -> HazardResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> =
            self.scan(&format!("{}{}:", TRANSACTION_PREFIX, user_id))?;
        records.reverse();
        Ok(records)
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    cases: DashMap<String, Case>,
    battles: DashMap<String, Battle>,
    inventory: DashMap<String, Vec<InventoryItem>>,
    history: DashMap<String, VecDeque<HistoryEntry>>,
    skins: RwLock<Vec<Skin>>,
    transactions: DashMap<String, Vec<TransactionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_user(&self, id: &str) -> HazardResult<Option<User>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    fn save_user(&self, user: &User) -> HazardResult<()> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn get_case(&self, id: &str) -> HazardResult<Option<Case>> {
        Ok(self.cases.get(id).map(|c| c.clone()))
    }

    fn save_case(&self, case: &Case) -> HazardResult<()> {
        self.cases.insert(case.id.clone(), case.clone());
        Ok(())
    }

    fn get_battle(&self, id: &str) -> HazardResult<Option<Battle>> {
        Ok(self.battles.get(id).map(|b| b.clone()))
    }

    fn save_battle(&self, battle: &Battle) -> HazardResult<()> {
        self.battles.insert(battle.id.clone(), battle.clone());
        Ok(())
    }

    fn insert_inventory(&self, items: &[InventoryItem]) -> HazardResult<()> {
        for item in items {
            self.inventory
                .entry(item.user_id.clone())
                .or_default()
                .push(item.clone());
        }
        Ok(())
    }

    fn get_inventory_item(&self, user_id: &str, item_id: &str) -> HazardResult<Option<InventoryItem>> {
        Ok(self
            .inventory
            .get(user_id)
            .and_then(|items| items.iter().find(|i| i.id == item_id).cloned()))
    }

    fn list_inventory(&self, user_id: &str) -> HazardResult<Vec<InventoryItem>> {
        Ok(self.inventory.get(user_id).map(|i| i.clone()).unwrap_or_default())
    }

    fn take_inventory(&self, user_id: &str, item_ids: &[String]) -> HazardResult<Vec<InventoryItem>> {
        let Some(mut items) = self.inventory.get_mut(user_id) else {
            return Ok(Vec::new());
        };
        let (taken, kept): (Vec<_>, Vec<_>) = items
            .drain(..)
            .partition(|item| item_ids.contains(&item.id));
        *items = kept;
        Ok(taken)
    }

    fn append_history(&self, user_id: &str, entries: &[HistoryEntry], cap: usize) -> HazardResult<()> {
        let mut history = self.history.entry(user_id.to_string()).or_default();
        for entry in entries {
            history.push_front(entry.clone());
        }
        history.truncate(cap);
        Ok(())
    }

    fn list_history(&self, user_id: &str) -> HazardResult<Vec<HistoryEntry>> {
        Ok(self
            .history
            .get(user_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn list_skins(&self) -> HazardResult<Vec<Skin>> {
        Ok(self.skins.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save_skin(&self, skin: &Skin) -> HazardResult<()> {
        let mut skins = self.skins.write().unwrap_or_else(PoisonError::into_inner);
        match skins.iter_mut().find(|s| s.name == skin.name) {
            Some(existing) => *existing = skin.clone(),
            None => skins.push(skin.clone()),
        }
        Ok(())
    }

    fn record_transaction(&self, record: &TransactionRecord) -> HazardResult<()> {
        self.transactions
            .entry(record.user_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_transactions(&self, user_id: &str) -> HazardResult<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .get(user_id)
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}
