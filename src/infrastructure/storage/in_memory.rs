use crate::core::errors::{TallyError, UnavailableReason};
use crate::core::models::{
    account::Account,
    audit::GroupAudit,
    group::GroupSettings,
    level::{Level, LevelAchievement},
    rating::{RatingRow, RatingType},
    redemption::RedemptionRecord,
    reward::Reward,
    transaction::{Page, Transaction, TransactionFilter},
};
use crate::infrastructure::storage::{LedgerBatch, Storage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type OwnerKey = (String, String);

/// Tables guarded by independent locks. Multi-table writes take them in declaration order.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    group_settings: Arc<RwLock<HashMap<String, GroupSettings>>>,
    accounts_by_owner: Arc<RwLock<HashMap<OwnerKey, String>>>,
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    rewards: Arc<RwLock<HashMap<String, Reward>>>,
    transactions: Arc<RwLock<HashMap<String, Vec<Transaction>>>>,
    redemptions: Arc<RwLock<Vec<RedemptionRecord>>>,
    levels: Arc<RwLock<HashMap<String, Vec<Level>>>>,
    level_achievements: Arc<RwLock<Vec<LevelAchievement>>>,
    ratings: Arc<RwLock<Vec<RatingRow>>>,
    group_audits: Arc<RwLock<HashMap<String, Vec<GroupAudit>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_group_settings(&self, settings: GroupSettings) -> Result<(), TallyError> {
        let mut group_settings = self.group_settings.write().await;
        group_settings.insert(settings.group_id.clone(), settings);
        Ok(())
    }

    async fn get_group_settings(&self, group_id: &str) -> Result<Option<GroupSettings>, TallyError> {
        let group_settings = self.group_settings.read().await;
        Ok(group_settings.get(group_id).cloned())
    }

    async fn create_account_if_not_exists(&self, account: Account) -> Result<Account, TallyError> {
        let mut accounts_by_owner = self.accounts_by_owner.write().await;
        let mut accounts = self.accounts.write().await;
        let key = (account.user_id.clone(), account.group_id.clone());
        if let Some(existing) = accounts_by_owner.get(&key).and_then(|id| accounts.get(id)) {
            return Ok(existing.clone());
        }
        accounts_by_owner.insert(key, account.id.clone());
        accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, TallyError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(account_id).cloned())
    }

    async fn get_account_by_owner(&self, user_id: &str, group_id: &str) -> Result<Option<Account>, TallyError> {
        let accounts_by_owner = self.accounts_by_owner.read().await;
        let accounts = self.accounts.read().await;
        Ok(accounts_by_owner
            .get(&(user_id.to_string(), group_id.to_string()))
            .and_then(|account_id| accounts.get(account_id).cloned()))
    }

    async fn list_group_accounts(&self, group_id: &str) -> Result<Vec<Account>, TallyError> {
        let accounts = self.accounts.read().await;
        let mut group_accounts: Vec<Account> = accounts.values().filter(|a| a.group_id == group_id).cloned().collect();
        group_accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(group_accounts)
    }

    async fn list_user_accounts(&self, user_id: &str) -> Result<Vec<Account>, TallyError> {
        let accounts = self.accounts.read().await;
        let mut user_accounts: Vec<Account> = accounts.values().filter(|a| a.user_id == user_id).cloned().collect();
        user_accounts.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(user_accounts)
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), TallyError> {
        let mut accounts_by_owner = self.accounts_by_owner.write().await;
        let mut accounts = self.accounts.write().await;
        let transactions = self.transactions.read().await;
        if transactions.get(account_id).is_some_and(|entries| !entries.is_empty()) {
            return Err(TallyError::AccountInUse(account_id.to_string()));
        }
        let account = accounts
            .remove(account_id)
            .ok_or_else(|| TallyError::AccountNotFound(account_id.to_string()))?;
        accounts_by_owner.remove(&(account.user_id, account.group_id));
        Ok(())
    }

    async fn list_transactions(
        &self,
        account_id: &str,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, TallyError> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .get(account_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|t| filter.matches(t))
                    .skip(page.offset)
                    .take(page.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, TallyError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.values().flatten().find(|t| t.id == transaction_id).cloned())
    }

    async fn save_reward(&self, reward: Reward) -> Result<(), TallyError> {
        let mut rewards = self.rewards.write().await;
        rewards.insert(reward.id.clone(), reward);
        Ok(())
    }

    async fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>, TallyError> {
        let rewards = self.rewards.read().await;
        Ok(rewards.get(reward_id).cloned())
    }

    async fn list_rewards(&self, group_id: &str) -> Result<Vec<Reward>, TallyError> {
        let rewards = self.rewards.read().await;
        let mut group_rewards: Vec<Reward> = rewards.values().filter(|r| r.group_id == group_id).cloned().collect();
        group_rewards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(group_rewards)
    }

    async fn completed_redemption_quantity(&self, user_id: &str, reward_id: &str) -> Result<u32, TallyError> {
        let redemptions = self.redemptions.read().await;
        let total = completed_quantity(redemptions.iter(), user_id, reward_id);
        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }

    async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>, TallyError> {
        let redemptions = self.redemptions.read().await;
        Ok(redemptions.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }

    async fn commit(&self, batch: LedgerBatch) -> Result<(), TallyError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut accounts = self.accounts.write().await;
        let mut rewards = self.rewards.write().await;
        let mut transactions = self.transactions.write().await;
        let mut redemptions = self.redemptions.write().await;

        for write in &batch.accounts {
            let stored = accounts
                .get(&write.account.id)
                .ok_or_else(|| TallyError::AccountNotFound(write.account.id.clone()))?;
            if stored.version != write.expected_version {
                return Err(TallyError::ConcurrencyConflict(format!("account {}", write.account.id)));
            }
        }
        for transaction in &batch.transactions {
            if !accounts.contains_key(&transaction.account_id) {
                return Err(TallyError::AccountNotFound(transaction.account_id.clone()));
            }
        }

        let mut requested: HashMap<&str, u64> = HashMap::new();
        for decrement in &batch.stock_decrements {
            *requested.entry(decrement.reward_id.as_str()).or_default() += u64::from(decrement.quantity);
        }
        for (reward_id, quantity) in &requested {
            let reward = rewards
                .get(*reward_id)
                .ok_or_else(|| TallyError::reward_unavailable(reward_id, UnavailableReason::NotFound))?;
            if reward.stock.is_some_and(|stock| u64::from(stock) < *quantity) {
                return Err(TallyError::reward_unavailable(reward_id, UnavailableReason::InsufficientStock));
            }
        }

        for cap in &batch.per_user_caps {
            let already_redeemed = completed_quantity(redemptions.iter(), &cap.user_id, &cap.reward_id);
            let pending = completed_quantity(batch.redemptions.iter(), &cap.user_id, &cap.reward_id);
            if already_redeemed + pending > u64::from(cap.limit) {
                return Err(TallyError::RedemptionLimitExceeded {
                    reward_id: cap.reward_id.clone(),
                    limit: cap.limit,
                    already_redeemed: u32::try_from(already_redeemed).unwrap_or(u32::MAX),
                });
            }
        }

        for (reward_id, quantity) in requested {
            if let Some(reward) = rewards.get_mut(reward_id) {
                if let Some(stock) = reward.stock.as_mut() {
                    *stock = u32::try_from(u64::from(*stock) - quantity).unwrap_or(0);
                }
            }
        }
        for write in batch.accounts {
            accounts.insert(write.account.id.clone(), write.account);
        }
        for transaction in batch.transactions {
            transactions
                .entry(transaction.account_id.clone())
                .or_default()
                .push(transaction);
        }
        redemptions.extend(batch.redemptions);
        Ok(())
    }

    async fn save_level(&self, level: Level) -> Result<(), TallyError> {
        let mut levels = self.levels.write().await;
        let group_levels = levels.entry(level.group_id.clone()).or_default();
        group_levels.retain(|l| l.id != level.id);
        group_levels.push(level);
        Ok(())
    }

    async fn list_levels(&self, group_id: &str) -> Result<Vec<Level>, TallyError> {
        let levels = self.levels.read().await;
        Ok(levels.get(group_id).cloned().unwrap_or_default())
    }

    async fn record_level_achievement(
        &self,
        achievement: LevelAchievement,
    ) -> Result<Option<LevelAchievement>, TallyError> {
        let mut level_achievements = self.level_achievements.write().await;
        let mut current = level_achievements
            .iter_mut()
            .filter(|a| a.user_id == achievement.user_id && a.group_id == achievement.group_id && a.is_current);
        if let Some(previous) = current.next() {
            if previous.level_number >= achievement.level_number {
                return Ok(None);
            }
            previous.is_current = false;
        }
        let stored = LevelAchievement {
            is_current: true,
            ..achievement
        };
        level_achievements.push(stored.clone());
        Ok(Some(stored))
    }

    async fn current_level_achievement(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<LevelAchievement>, TallyError> {
        let level_achievements = self.level_achievements.read().await;
        Ok(level_achievements
            .iter()
            .find(|a| a.user_id == user_id && a.group_id == group_id && a.is_current)
            .cloned())
    }

    async fn level_history(&self, user_id: &str, group_id: &str) -> Result<Vec<LevelAchievement>, TallyError> {
        let level_achievements = self.level_achievements.read().await;
        let mut history: Vec<LevelAchievement> = level_achievements
            .iter()
            .filter(|a| a.user_id == user_id && a.group_id == group_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.achieved_at.cmp(&b.achieved_at).then(a.level_number.cmp(&b.level_number)));
        Ok(history)
    }

    async fn save_ratings(&self, rows: Vec<RatingRow>) -> Result<(), TallyError> {
        let mut ratings = self.ratings.write().await;
        for row in rows {
            let existing = ratings.iter_mut().find(|r| {
                r.user_id == row.user_id
                    && r.group_id == row.group_id
                    && r.rating_type == row.rating_type
                    && r.period_start == row.period_start
            });
            match existing {
                Some(slot) => *slot = row,
                None => ratings.push(row),
            }
        }
        Ok(())
    }

    async fn list_ratings(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<Vec<RatingRow>, TallyError> {
        let ratings = self.ratings.read().await;
        Ok(ratings
            .iter()
            .filter(|r| r.group_id == group_id && r.rating_type == rating_type && r.period_start == period_start)
            .cloned()
            .collect())
    }

    async fn latest_rating_period(
        &self,
        group_id: &str,
        rating_type: RatingType,
    ) -> Result<Option<DateTime<Utc>>, TallyError> {
        let ratings = self.ratings.read().await;
        Ok(ratings
            .iter()
            .filter(|r| r.group_id == group_id && r.rating_type == rating_type)
            .filter_map(|r| r.period_start)
            .max())
    }

    async fn rating_history(
        &self,
        user_id: &str,
        group_id: &str,
        rating_type: RatingType,
    ) -> Result<Vec<RatingRow>, TallyError> {
        let ratings = self.ratings.read().await;
        let mut history: Vec<RatingRow> = ratings
            .iter()
            .filter(|r| r.user_id == user_id && r.group_id == group_id && r.rating_type == rating_type)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.period_start.cmp(&b.period_start).then(a.snapshot_at.cmp(&b.snapshot_at)));
        Ok(history)
    }

    async fn save_group_audit(&self, audit: GroupAudit) -> Result<(), TallyError> {
        let mut group_audits = self.group_audits.write().await;
        group_audits.entry(audit.group_id.clone()).or_default().push(audit);
        Ok(())
    }

    async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, TallyError> {
        let group_audits = self.group_audits.read().await;
        Ok(group_audits.get(group_id).cloned().unwrap_or_default())
    }
}

fn completed_quantity<'a>(
    redemptions: impl Iterator<Item = &'a RedemptionRecord>,
    user_id: &str,
    reward_id: &str,
) -> u64 {
    redemptions
        .filter(|r| r.user_id == user_id && r.reward_id == reward_id && r.is_completed())
        .map(|r| u64::from(r.quantity))
        .sum()
}
