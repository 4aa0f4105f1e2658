//! Shared collaborators handed to every game service

use crate::{
    config::HazardConfig,
    errors::{ConfigurationError, HazardResult},
    games::wallet::Wallet,
    metrics::GameMetrics,
    notify::Notifier,
    scheduler::Scheduler,
    store::Store,
};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

/// Randomness source shared by the selector, the wheel and tie breaks
#[derive(Clone)]
pub struct SharedRng(Arc<Mutex<Box<dyn RngCore + Send>>>);

impl SharedRng {
    pub fn new<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self(Arc::new(Mutex::new(Box::new(rng))))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Run `f` with exclusive access to the generator
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard)
    }
}

/// Everything a game service needs from the outside world
#[derive(Clone)]
pub struct GameContext {
    pub config: Arc<HazardConfig>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: Arc<dyn Scheduler>,
    pub rng: SharedRng,
    pub wallet: Arc<Wallet>,
    pub metrics: GameMetrics,
}

impl GameContext {
    pub fn new(
        config: HazardConfig,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<dyn Scheduler>,
        rng: SharedRng,
    ) -> HazardResult<Self> {
        config.validate()?;
        let metrics = GameMetrics::new().map_err(|e| ConfigurationError::InvalidValue {
            field: "metrics".to_string(),
            reason: e.to_string(),
        })?;
        let wallet = Arc::new(Wallet::new(store.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            notifier,
            scheduler,
            rng,
            wallet,
            metrics,
        })
    }
}
