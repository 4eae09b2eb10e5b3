use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    TaskReward,
    TaskPenalty,
    RewardPurchase,
    ManualCredit,
    ManualDebit,
    ThankYouSent,
    ThankYouReceived,
    InitialBalance,
    ProposalBonus,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::TaskReward => "TASK_REWARD",
            TransactionType::TaskPenalty => "TASK_PENALTY",
            TransactionType::RewardPurchase => "REWARD_PURCHASE",
            TransactionType::ManualCredit => "MANUAL_CREDIT",
            TransactionType::ManualDebit => "MANUAL_DEBIT",
            TransactionType::ThankYouSent => "THANK_YOU_SENT",
            TransactionType::ThankYouReceived => "THANK_YOU_RECEIVED",
            TransactionType::InitialBalance => "INITIAL_BALANCE",
            TransactionType::ProposalBonus => "PROPOSAL_BONUS",
            TransactionType::Refund => "REFUND",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.to_ascii_uppercase().as_str() {
            "TASK_REWARD" => TransactionType::TaskReward,
            "TASK_PENALTY" => TransactionType::TaskPenalty,
            "REWARD_PURCHASE" | "REDEMPTION" => TransactionType::RewardPurchase,
            "MANUAL_CREDIT" => TransactionType::ManualCredit,
            "MANUAL_DEBIT" => TransactionType::ManualDebit,
            "THANK_YOU_SENT" => TransactionType::ThankYouSent,
            "THANK_YOU_RECEIVED" => TransactionType::ThankYouReceived,
            "INITIAL_BALANCE" => TransactionType::InitialBalance,
            "PROPOSAL_BONUS" => TransactionType::ProposalBonus,
            "REFUND" => TransactionType::Refund,
            other => return Err(format!("unknown transaction type `{}`", other)),
        };
        Ok(parsed)
    }
}

/// The task, reward or adjustment a ledger entry came from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntity {
    pub entity_type: String,
    pub entity_id: String,
}

impl SourceEntity {
    pub fn new(entity_type: &str, entity_id: &str) -> Self {
        SourceEntity {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub type_code: TransactionType,
    pub description: Option<String>,
    pub source: Option<SourceEntity>,
    pub related_user_id: Option<String>,
    pub balance_after: Decimal,
    /// Account version produced by this entry; orders entries sharing a timestamp.
    pub sequence: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of a ledger entry.
#[derive(Clone, Debug, Default)]
pub struct EntryDetails {
    pub description: Option<String>,
    pub source: Option<SourceEntity>,
    pub related_user_id: Option<String>,
}

impl EntryDetails {
    pub fn described(description: impl Into<String>) -> Self {
        EntryDetails {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: SourceEntity) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_related_user(mut self, user_id: &str) -> Self {
        self.related_user_id = Some(user_id.to_string());
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub type_code: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.from.is_none_or(|from| transaction.created_at >= from)
            && self.to.is_none_or(|to| transaction.created_at <= to)
            && self.type_code.is_none_or(|t| transaction.type_code == t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Page { offset, limit }
    }

    pub fn all() -> Self {
        Page {
            offset: 0,
            limit: usize::MAX,
        }
    }
}
