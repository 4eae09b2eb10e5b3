use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub title: String,
    pub description: String,
}

impl FieldError {
    pub fn new(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Why a reward cannot be redeemed right now.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    InsufficientStock,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnavailableReason::NotFound => "not found",
            UnavailableReason::Inactive => "inactive",
            UnavailableReason::NotYetValid => "not yet valid",
            UnavailableReason::Expired => "expired",
            UnavailableReason::InsufficientStock => "insufficient stock",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug, Serialize)]
pub enum TallyError {
    #[error("Account {0} not found")]
    AccountNotFound(String),
    #[error("Transaction {0} not found")]
    TransactionNotFound(String),
    #[error("Insufficient funds: balance {current_balance}, requested debit {requested}")]
    InsufficientFunds { current_balance: Decimal, requested: Decimal },
    #[error("Reward {reward_id} unavailable: {reason}")]
    RewardUnavailable { reward_id: String, reason: UnavailableReason },
    #[error("Redemption denied: {0}")]
    RedemptionDenied(String),
    #[error("Redemption limit exceeded for reward {reward_id}: limit {limit}, already redeemed {already_redeemed}")]
    RedemptionLimitExceeded {
        reward_id: String,
        limit: u32,
        already_redeemed: u32,
    },
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Concurrent modification of {0}")]
    ConcurrencyConflict(String),
    #[error("Invalid input for field `{0}`: {1:?}")]
    InvalidInput(String, FieldError),
    #[error("Group {0} not found")]
    GroupNotFound(String),
    #[error("Level {0} not found")]
    LevelNotFound(String),
    #[error("Level number {1} already exists in group {0}")]
    DuplicateLevel(String, u32),
    #[error("Account {0} still has transactions")]
    AccountInUse(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Logging error: {0}")]
    LoggingError(String),
    #[error("Cache error: {0}")]
    CacheError(String),
}

impl TallyError {
    pub fn invalid_input(field: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        TallyError::InvalidInput(field.to_string(), FieldError::new(field, title, description))
    }

    pub fn reward_unavailable(reward_id: &str, reason: UnavailableReason) -> Self {
        TallyError::RewardUnavailable {
            reward_id: reward_id.to_string(),
            reason,
        }
    }

    /// Whether the whole operation may be repeated from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TallyError::ConcurrencyConflict(_))
    }
}
