use crate::core::errors::TallyError;
use crate::core::models::{
    level::UserLevel,
    rating::{RatingRow, RatingType},
};
use crate::infrastructure::cache::{Cache, cache_keys};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
enum Entry {
    UserLevel(UserLevel),
    Leaderboard(Vec<RatingRow>),
}

#[derive(Clone, Default)]
pub struct InMemoryCache {
    /// Value plus optional expiry.
    cache: Arc<RwLock<HashMap<String, (Entry, Option<DateTime<Utc>>)>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, key: &str) -> Option<Entry> {
        let cache = self.cache.read().await;
        match cache.get(key) {
            Some((entry, expiry)) if expiry.is_none_or(|e| e > Utc::now()) => Some(entry.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_user_level(&self, user_id: &str, group_id: &str) -> Result<Option<UserLevel>, TallyError> {
        match self.get(&cache_keys::user_level_key(user_id, group_id)).await {
            Some(Entry::UserLevel(level)) => Ok(Some(level)),
            Some(Entry::Leaderboard(_)) => Err(TallyError::CacheError(format!(
                "Unexpected leaderboard entry for user level {}",
                user_id
            ))),
            None => Ok(None),
        }
    }

    async fn save_user_level(&self, user_level: &UserLevel) -> Result<(), TallyError> {
        let mut cache = self.cache.write().await;
        cache.insert(
            cache_keys::user_level_key(&user_level.user_id, &user_level.group_id),
            (Entry::UserLevel(user_level.clone()), None),
        );
        Ok(())
    }

    async fn get_leaderboard(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<Option<Vec<RatingRow>>, TallyError> {
        match self
            .get(&cache_keys::leaderboard_key(group_id, rating_type, period_start))
            .await
        {
            Some(Entry::Leaderboard(rows)) => Ok(Some(rows)),
            Some(Entry::UserLevel(_)) => Err(TallyError::CacheError(format!(
                "Unexpected user level entry for leaderboard of {}",
                group_id
            ))),
            None => Ok(None),
        }
    }

    async fn save_leaderboard(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
        rows: &[RatingRow],
        ttl: std::time::Duration,
    ) -> Result<(), TallyError> {
        let expiry = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| TallyError::CacheError(format!("Failed to convert TTL: {}", e)))?;
        let mut cache = self.cache.write().await;
        cache.insert(
            cache_keys::leaderboard_key(group_id, rating_type, period_start),
            (Entry::Leaderboard(rows.to_vec()), Some(expiry)),
        );
        Ok(())
    }

    async fn invalidate_group(&self, group_id: &str) -> Result<(), TallyError> {
        let prefixes = cache_keys::group_prefix(group_id);
        let mut cache = self.cache.write().await;
        cache.retain(|key, (_, expiry)| {
            !prefixes.iter().any(|p| key.starts_with(p.as_str())) && expiry.is_none_or(|e| e > Utc::now())
        });
        Ok(())
    }
}
