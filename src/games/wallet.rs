//! Balance and progression updates
//!
//! All balance mutations go through one lock so a read-check-write on a
//! user record never interleaves with another.

use crate::{
    errors::{HazardResult, ValidationError},
    games::{progression, types::{Money, User}},
    store::Store,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// One experience point per whole currency unit spent; remainders carry over
const CENTS_PER_EXP: u64 = 100;

pub struct Wallet {
    store: Arc<dyn Store>,
    lock: Mutex<()>,
}

impl Wallet {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Debit `amount` and award experience for it.
    ///
    /// Fails without touching the record when the balance is too low.
    pub fn spend(&self, user_id: &str, amount: Money) -> HazardResult<User> {
        self.update(user_id, |user| {
            if !amount.is_positive() {
                return Err(ValidationError::NonPositiveAmount.into());
            }
            if user.balance < amount {
                return Err(ValidationError::InsufficientBalance.into());
            }
            user.balance -= amount;
            let spent = user.exp_carry_cents + amount.cents() as u64;
            let (level, exp) = progression::add_exp(user.level, user.exp, spent / CENTS_PER_EXP);
            user.level = level;
            user.exp = exp;
            user.exp_carry_cents = spent % CENTS_PER_EXP;
            Ok(())
        })
    }

    pub fn credit(&self, user_id: &str, amount: Money) -> HazardResult<User> {
        self.update(user_id, |user| {
            user.balance += amount;
            Ok(())
        })
    }

    /// Atomic read-modify-write of one user record
    pub fn update<F>(&self, user_id: &str, f: F) -> HazardResult<User>
    where
        F: FnOnce(&mut User) -> HazardResult<()>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut user = self.store.load_user(user_id)?;
        f(&mut user)?;
        self.store.save_user(&user)?;
        debug!(user_id, balance = %user.balance, level = user.level, "wallet updated");
        Ok(user)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::HazardError, store::MemoryStore};

    fn wallet_with(balance_cents: i64) -> (Wallet, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .save_user(&User::new("u1", "alice", Money::from_cents(balance_cents)))
            .expect("seed user");
        (Wallet::new(store.clone()), store)
    }

    #[test]
    fn test_spend_debits_and_levels_up() {
        let (wallet, store) = wallet_with(100_000);
        let user = wallet.spend("u1", Money::from_cents(25_000)).expect("spend");
        assert_eq!(user.balance, Money::from_cents(75_000));
        assert_eq!((user.level, user.exp), (2, 150));
        assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(75_000));
    }

    #[test]
    fn test_small_spends_accumulate_exp() {
        let (wallet, store) = wallet_with(10_000);
        for _ in 0..20 {
            wallet.spend("u1", Money::from_cents(50)).expect("spend");
        }
        let user = wallet.spend("u1", Money::from_cents(75)).expect("spend");
        assert_eq!((user.level, user.exp, user.exp_carry_cents), (1, 10, 75));

        let user = wallet.spend("u1", Money::from_cents(25)).expect("spend");
        assert_eq!((user.exp, user.exp_carry_cents), (11, 0));
        assert_eq!(store.load_user("u1").unwrap().exp, 11);
    }

    #[test]
    fn test_spend_rejects_overdraft_without_mutation() {
        let (wallet, store) = wallet_with(500);
        let err = wallet.spend("u1", Money::from_cents(501)).unwrap_err();
        assert!(matches!(err, HazardError::Validation(ValidationError::InsufficientBalance)));
        assert_eq!(store.load_user("u1").unwrap().balance, Money::from_cents(500));
    }

    #[test]
    fn test_credit_unknown_user() {
        let (wallet, _) = wallet_with(0);
        assert!(matches!(
            wallet.credit("nobody", Money::from_cents(1)),
            Err(HazardError::NotFound { .. })
        ));
    }
}
