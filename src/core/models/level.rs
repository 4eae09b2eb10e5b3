use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A level threshold configured for a group.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Level {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub level_number: u32,
    pub required_points: Decimal,
}

/// Cached derivation of a user's level from their balance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserLevel {
    pub user_id: String,
    pub group_id: String,
    pub level: Option<Level>,
    pub balance: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl UserLevel {
    /// Fresh while no transaction was applied after the computation.
    pub fn is_fresh(&self, last_transaction_at: Option<DateTime<Utc>>) -> bool {
        last_transaction_at.is_none_or(|at| self.computed_at >= at)
    }
}

/// A level a user has reached in a group. At most one row per (user, group) is current.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LevelAchievement {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub level_id: String,
    pub level_number: u32,
    pub level_name: String,
    pub balance: Decimal,
    pub achieved_at: DateTime<Utc>,
    pub is_current: bool,
}

/// Highest level whose threshold `points` reaches. Thresholds may come in any order.
pub fn level_for_points(points: Decimal, levels: &[Level]) -> Option<&Level> {
    levels
        .iter()
        .filter(|level| level.required_points <= points)
        .max_by(|a, b| {
            a.required_points
                .cmp(&b.required_points)
                .then(a.level_number.cmp(&b.level_number))
        })
}
