//! Error types for the hazard game server
//!
//! One root error with a sub-enum per failure family, so services can
//! propagate with `?` and the API layer can map each family to a status.

use thiserror::Error;

/// Root error type for all game operations
#[derive(Debug, Error)]
pub enum HazardError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Broken internal invariant. Nothing was committed.
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Rejected input
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("invalid chance {chance} for item {item}")]
    InvalidChance { item: String, chance: f64 },

    #[error("chances must sum to 100, got {0}")]
    ChanceSum(f64),

    #[error("invalid seat index {index} for {seats} seats")]
    InvalidSeat { index: usize, seats: usize },

    #[error("battle needs between 1 and {max} cases, got {got}")]
    CaseCount { got: usize, max: usize },

    #[error("between 1 and {max} cases can be opened at once, got {got}")]
    OpenCount { got: usize, max: usize },

    #[error("invalid battle mode: {0}")]
    InvalidMode(String),

    #[error("invalid battle type: {0}")]
    InvalidBattleType(String),

    #[error("{0}")]
    Field(String),
}

/// Request is well formed but the current state refuses it
#[derive(Debug, Error, PartialEq)]
pub enum ConflictError {
    #[error("the wheel is spinning")]
    RoundSpinning,

    #[error("the round is being settled")]
    RoundProcessing,

    #[error("seat {0} is already occupied")]
    SeatOccupied(usize),

    #[error("participant already seated in this battle")]
    AlreadySeated,

    #[error("battle is no longer accepting players")]
    BattleNotOpen,

    #[error("no bot names left")]
    BotNamesExhausted,

    #[error("too many battles created, retry in {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database: {0}")]
    DatabaseOpenFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("corrupted record: {0}")]
    CorruptedData(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl HazardError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        HazardError::NotFound { kind, id: id.into() }
    }
}

impl From<rocksdb::Error> for HazardError {
    fn from(err: rocksdb::Error) -> Self {
        HazardError::Storage(StorageError::WriteFailed(err.to_string()))
    }
}

impl From<serde_json::Error> for HazardError {
    fn from(err: serde_json::Error) -> Self {
        HazardError::Storage(StorageError::CorruptedData(err.to_string()))
    }
}

/// Result type alias for game operations
pub type HazardResult<T> = Result<T, HazardError>;
