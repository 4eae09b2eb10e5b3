pub mod cache_keys;
pub mod in_memory;

use crate::core::errors::TallyError;
use crate::core::models::{
    level::UserLevel,
    rating::{RatingRow, RatingType},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-side cache for gamification views. Never consulted by ledger writes.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_user_level(&self, user_id: &str, group_id: &str) -> Result<Option<UserLevel>, TallyError>;
    async fn save_user_level(&self, user_level: &UserLevel) -> Result<(), TallyError>;
    async fn get_leaderboard(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<RatingRow>>, TallyError>;
    async fn save_leaderboard(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
        rows: &[RatingRow],
        ttl: std::time::Duration,
    ) -> Result<(), TallyError>;
    async fn invalidate_group(&self, group_id: &str) -> Result<(), TallyError>;
}
