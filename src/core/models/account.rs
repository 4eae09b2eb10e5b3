use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Points balance of one user inside one group.
///
/// `currency_code` is frozen at creation; a group that later switches its bonus
/// type keeps existing accounts in the old unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub balance: Decimal,
    pub currency_code: String,
    pub last_transaction_at: Option<DateTime<Utc>>,
    /// Incremented once per applied transaction.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: String, user_id: &str, group_id: &str, currency_code: &str, now: DateTime<Utc>) -> Self {
        Account {
            id,
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            balance: Decimal::ZERO,
            currency_code: currency_code.to_string(),
            last_transaction_at: None,
            version: 0,
            created_at: now,
        }
    }
}

/// How a caller names the account to adjust.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountRef {
    Id(String),
    Owner { user_id: String, group_id: String },
}

impl AccountRef {
    pub fn owner(user_id: &str, group_id: &str) -> Self {
        AccountRef::Owner {
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
        }
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "{}", id),
            AccountRef::Owner { user_id, group_id } => write!(f, "{}@{}", user_id, group_id),
        }
    }
}

/// Result of replaying an account's transaction log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LedgerAudit {
    pub account_id: String,
    pub transaction_count: usize,
    pub recorded_balance: Decimal,
    pub replayed_balance: Decimal,
    /// First transaction whose `balance_after` disagrees with the running sum.
    pub first_mismatch: Option<String>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.first_mismatch.is_none() && self.recorded_balance == self.replayed_balance
    }
}
