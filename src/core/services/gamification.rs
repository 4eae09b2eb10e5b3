use super::TallyService;
use crate::constants::{LEVEL_ACHIEVED, LEVEL_CREATED, MAX_NAME_LENGTH, RATINGS_RECOMPUTED};
use crate::core::errors::TallyError;
use crate::core::models::{
    account::Account,
    level::{Level, LevelAchievement, UserLevel, level_for_points},
    rating::{RatingRow, RatingType, rank_scores},
    transaction::{Page, TransactionFilter},
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::Storage;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    pub async fn create_level(
        &self,
        group_id: &str,
        name: &str,
        level_number: u32,
        required_points: Decimal,
    ) -> Result<Level, TallyError> {
        self.validate_id("group_id", group_id)?;
        self.validate_string_input("name", name, MAX_NAME_LENGTH)?;
        if required_points.is_sign_negative() || required_points.normalize().scale() > 2 {
            return Err(TallyError::invalid_input(
                "required_points",
                "Invalid Threshold",
                "required_points must be non-negative with at most 2 decimal places",
            ));
        }
        if self.storage.get_group_settings(group_id).await?.is_none() {
            return Err(TallyError::GroupNotFound(group_id.to_string()));
        }
        let existing = self.storage.list_levels(group_id).await?;
        if existing.iter().any(|l| l.level_number == level_number) {
            return Err(TallyError::DuplicateLevel(group_id.to_string(), level_number));
        }

        let level = Level {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            name: name.trim().to_string(),
            level_number,
            required_points,
        };
        self.storage.save_level(level.clone()).await?;
        // Cached user levels were derived from the old thresholds.
        if let Err(e) = self.cache.invalidate_group(group_id).await {
            warn!(group_id, error = %e, "failed to invalidate gamification cache");
        }

        info!(group_id, level_number, required_points = %required_points, "level created");
        self.log_and_audit(
            Some(group_id),
            LEVEL_CREATED,
            json!({
                "level_id": level.id,
                "name": level.name,
                "level_number": level_number,
                "required_points": required_points.to_string(),
            }),
            None,
        )
        .await;
        Ok(level)
    }

    /// Levels of a group ordered by level number.
    pub async fn list_levels(&self, group_id: &str) -> Result<Vec<Level>, TallyError> {
        let mut levels = self.storage.list_levels(group_id).await?;
        levels.sort_by_key(|l| l.level_number);
        Ok(levels)
    }

    pub async fn get_level_for_points(&self, points: Decimal, group_id: &str) -> Result<Option<Level>, TallyError> {
        let levels = self.storage.list_levels(group_id).await?;
        Ok(level_for_points(points, &levels).cloned())
    }

    /// Current level of a member. A user without an account counts as zero points.
    pub async fn get_user_level(&self, user_id: &str, group_id: &str) -> Result<UserLevel, TallyError> {
        let account = self.storage.get_account_by_owner(user_id, group_id).await?;
        let last_transaction_at = account.as_ref().and_then(|a| a.last_transaction_at);
        match self.cache.get_user_level(user_id, group_id).await {
            Ok(Some(cached)) if cached.is_fresh(last_transaction_at) => {
                debug!(user_id, group_id, "user level served from cache");
                return Ok(cached);
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, group_id, error = %e, "user level cache read failed"),
        }

        let levels = self.storage.list_levels(group_id).await?;
        let balance = account.map_or(Decimal::ZERO, |a| a.balance);
        let user_level = derive_user_level(user_id, group_id, balance, &levels);
        self.record_level_rise(&user_level).await?;
        if let Err(e) = self.cache.save_user_level(&user_level).await {
            warn!(user_id, group_id, error = %e, "user level cache write failed");
        }
        Ok(user_level)
    }

    /// Recomputes and caches the level of every account in the group.
    pub async fn refresh_group_levels(&self, group_id: &str) -> Result<Vec<UserLevel>, TallyError> {
        let accounts = self.storage.list_group_accounts(group_id).await?;
        let levels = self.storage.list_levels(group_id).await?;
        let user_levels: Vec<UserLevel> = accounts
            .iter()
            .map(|a| derive_user_level(&a.user_id, group_id, a.balance, &levels))
            .collect();
        try_join_all(user_levels.iter().map(|ul| self.record_level_rise(ul))).await?;
        try_join_all(user_levels.iter().map(|ul| self.cache.save_user_level(ul))).await?;
        info!(group_id, count = user_levels.len(), "group levels refreshed");
        Ok(user_levels)
    }

    /// The level the user holds in the group, if any was ever reached.
    pub async fn get_current_level_achievement(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<LevelAchievement>, TallyError> {
        self.storage.current_level_achievement(user_id, group_id).await
    }

    /// Levels the user reached in the group, oldest first.
    pub async fn get_user_level_history(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Vec<LevelAchievement>, TallyError> {
        self.validate_id("user_id", user_id)?;
        self.validate_id("group_id", group_id)?;
        self.storage.level_history(user_id, group_id).await
    }

    /// Persists a newly reached level. Falling below a threshold keeps the earned level current.
    async fn record_level_rise(&self, user_level: &UserLevel) -> Result<(), TallyError> {
        let Some(level) = &user_level.level else {
            return Ok(());
        };
        let achievement = LevelAchievement {
            id: Uuid::new_v4().to_string(),
            user_id: user_level.user_id.clone(),
            group_id: user_level.group_id.clone(),
            level_id: level.id.clone(),
            level_number: level.level_number,
            level_name: level.name.clone(),
            balance: user_level.balance,
            achieved_at: user_level.computed_at,
            is_current: true,
        };
        let Some(stored) = self.storage.record_level_achievement(achievement).await? else {
            return Ok(());
        };

        info!(
            user_id = %stored.user_id,
            group_id = %stored.group_id,
            level_number = stored.level_number,
            "level achieved"
        );
        self.log_and_audit(
            Some(&stored.group_id),
            LEVEL_ACHIEVED,
            json!({
                "achievement_id": stored.id,
                "level_id": stored.level_id,
                "level_number": stored.level_number,
                "balance": stored.balance.to_string(),
            }),
            Some(&stored.user_id),
        )
        .await;
        Ok(())
    }

    /// Scores and ranks every account of the group and stores the snapshot.
    ///
    /// Running totals replace the one current row per user; periodic types store one
    /// row per user and period, replaced when recomputed inside the same period.
    pub async fn recompute_ratings(
        &self,
        group_id: &str,
        rating_type: RatingType,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RatingRow>, TallyError> {
        let accounts = self.storage.list_group_accounts(group_id).await?;
        let period = rating_type.period_containing(as_of);
        let scores: Vec<(String, Decimal)> = match period {
            None => accounts.iter().map(|a| (a.user_id.clone(), a.balance)).collect(),
            Some((start, end)) => {
                try_join_all(accounts.iter().map(|a| self.period_score(a, start, end))).await?
            }
        };

        let snapshot_at = Utc::now();
        let rows: Vec<RatingRow> = rank_scores(scores)
            .into_iter()
            .map(|(user_id, score, rank)| RatingRow {
                id: Uuid::new_v4().to_string(),
                user_id,
                group_id: group_id.to_string(),
                rating_type,
                score,
                rank,
                period_start: period.map(|(start, _)| start),
                period_end: period.map(|(_, end)| end),
                snapshot_at,
            })
            .collect();
        self.storage.save_ratings(rows.clone()).await?;
        let period_start = period.map(|(start, _)| start);
        if let Err(e) = self
            .cache
            .save_leaderboard(group_id, rating_type, period_start, &rows, self.settings.leaderboard_cache_ttl)
            .await
        {
            warn!(group_id, rating_type = %rating_type, error = %e, "leaderboard cache write failed");
        }

        info!(group_id, rating_type = %rating_type, users = rows.len(), "ratings recomputed");
        self.log_and_audit(
            Some(group_id),
            RATINGS_RECOMPUTED,
            json!({
                "rating_type": rating_type.as_str(),
                "period_start": period_start,
                "users": rows.len(),
            }),
            None,
        )
        .await;
        Ok(rows)
    }

    async fn period_score(
        &self,
        account: &Account,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(String, Decimal), TallyError> {
        let filter = TransactionFilter {
            from: Some(start),
            ..Default::default()
        };
        let score: Decimal = self
            .storage
            .list_transactions(&account.id, &filter, Page::all())
            .await?
            .iter()
            .filter(|t| t.created_at < end)
            .map(|t| t.amount)
            .sum();
        Ok((account.user_id.clone(), score))
    }

    /// Top `limit` rows. Periodic types read the period containing `period`, or the
    /// latest stored period when none is given.
    pub async fn get_leaderboard(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<RatingRow>, TallyError> {
        let period_start = match (rating_type.is_periodic(), period) {
            (false, _) => None,
            (true, Some(at)) => rating_type.period_containing(at).map(|(start, _)| start),
            (true, None) => match self.storage.latest_rating_period(group_id, rating_type).await? {
                Some(start) => Some(start),
                None => return Ok(Vec::new()),
            },
        };

        let cached = match self.cache.get_leaderboard(group_id, rating_type, period_start).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(group_id, rating_type = %rating_type, error = %e, "leaderboard cache read failed");
                None
            }
        };
        let mut rows = match cached {
            Some(rows) => rows,
            None => {
                let mut rows = self.storage.list_ratings(group_id, rating_type, period_start).await?;
                rows.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.user_id.cmp(&b.user_id)));
                if let Err(e) = self
                    .cache
                    .save_leaderboard(group_id, rating_type, period_start, &rows, self.settings.leaderboard_cache_ttl)
                    .await
                {
                    warn!(group_id, rating_type = %rating_type, error = %e, "leaderboard cache write failed");
                }
                rows
            }
        };
        rows.truncate(limit);
        Ok(rows)
    }

    /// Every stored snapshot of a user for one rating type, oldest period first.
    pub async fn get_rating_history(
        &self,
        user_id: &str,
        group_id: &str,
        rating_type: RatingType,
    ) -> Result<Vec<RatingRow>, TallyError> {
        self.storage.rating_history(user_id, group_id, rating_type).await
    }
}

fn derive_user_level(user_id: &str, group_id: &str, balance: Decimal, levels: &[Level]) -> UserLevel {
    UserLevel {
        user_id: user_id.to_string(),
        group_id: group_id.to_string(),
        level: level_for_points(balance, levels).cloned(),
        balance,
        computed_at: Utc::now(),
    }
}
