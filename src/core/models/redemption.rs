use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RedemptionStatus {
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RedemptionRecord {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub group_id: String,
    pub account_id: String,
    pub transaction_id: String,
    pub quantity: u32,
    /// Frozen at redemption time.
    pub points_spent: Decimal,
    pub status: RedemptionStatus,
    pub redeemed_at: DateTime<Utc>,
}

impl RedemptionRecord {
    pub fn is_completed(&self) -> bool {
        self.status == RedemptionStatus::Completed
    }
}
