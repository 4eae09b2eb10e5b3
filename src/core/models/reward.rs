use crate::core::errors::UnavailableReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub cost: Decimal,
    /// `None` means unlimited.
    pub stock: Option<u32>,
    pub max_per_user: Option<u32>,
    pub is_recurring: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    /// Checks the active flag and the validity window at `as_of`. Stock is not considered.
    pub fn availability(&self, as_of: DateTime<Utc>) -> Result<(), UnavailableReason> {
        if !self.active {
            return Err(UnavailableReason::Inactive);
        }
        if self.valid_from.is_some_and(|from| as_of < from) {
            return Err(UnavailableReason::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| as_of > until) {
            return Err(UnavailableReason::Expired);
        }
        Ok(())
    }

    /// Total quantity one user may hold, if bounded.
    pub fn per_user_cap(&self) -> Option<u32> {
        if self.is_recurring {
            self.max_per_user
        } else {
            Some(1)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewReward {
    pub group_id: String,
    pub name: String,
    pub description: Option<String>,
    pub cost: Decimal,
    pub stock: Option<u32>,
    pub max_per_user: Option<u32>,
    pub is_recurring: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewReward {
    pub fn new(group_id: &str, name: &str, cost: Decimal) -> Self {
        NewReward {
            group_id: group_id.to_string(),
            name: name.to_string(),
            description: None,
            cost,
            stock: None,
            max_per_user: None,
            is_recurring: true,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_max_per_user(mut self, max_per_user: u32) -> Self {
        self.max_per_user = Some(max_per_user);
        self
    }

    pub fn once_per_user(mut self) -> Self {
        self.is_recurring = false;
        self
    }

    pub fn valid_between(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }
}

/// Partial update; `None` leaves a field untouched. Nullable fields take `Some(None)` to clear.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RewardUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub cost: Option<Decimal>,
    pub stock: Option<Option<u32>>,
    pub max_per_user: Option<Option<u32>>,
    pub is_recurring: Option<bool>,
    pub valid_from: Option<Option<DateTime<Utc>>>,
    pub valid_until: Option<Option<DateTime<Utc>>>,
    pub active: Option<bool>,
}
