use crate::core::errors::TallyError;
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
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// New state of an account, applied only if the stored version still equals `expected_version`.
#[derive(Clone, Debug)]
pub struct AccountWrite {
    pub account: Account,
    pub expected_version: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockDecrement {
    pub reward_id: String,
    pub quantity: u32,
}

/// Rejects the batch if the user's completed quantity of the reward, plus this batch's
/// redemptions of it, would exceed `limit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerUserCap {
    pub user_id: String,
    pub reward_id: String,
    pub limit: u32,
}

/// Everything one ledger operation writes. `Storage::commit` applies it all or nothing.
#[derive(Clone, Debug, Default)]
pub struct LedgerBatch {
    pub accounts: Vec<AccountWrite>,
    pub transactions: Vec<Transaction>,
    pub stock_decrements: Vec<StockDecrement>,
    pub per_user_caps: Vec<PerUserCap>,
    pub redemptions: Vec<RedemptionRecord>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.transactions.is_empty()
            && self.stock_decrements.is_empty()
            && self.redemptions.is_empty()
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_group_settings(&self, settings: GroupSettings) -> Result<(), TallyError>;
    async fn get_group_settings(&self, group_id: &str) -> Result<Option<GroupSettings>, TallyError>;

    /// Inserts the account unless one exists for the same (user, group); returns the stored row.
    async fn create_account_if_not_exists(&self, account: Account) -> Result<Account, TallyError>;
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, TallyError>;
    async fn get_account_by_owner(&self, user_id: &str, group_id: &str) -> Result<Option<Account>, TallyError>;
    async fn list_group_accounts(&self, group_id: &str) -> Result<Vec<Account>, TallyError>;
    async fn list_user_accounts(&self, user_id: &str) -> Result<Vec<Account>, TallyError>;
    /// Fails with `AccountInUse` while transactions reference the account.
    async fn delete_account(&self, account_id: &str) -> Result<(), TallyError>;

    /// Transactions of one account in commit order.
    async fn list_transactions(
        &self,
        account_id: &str,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, TallyError>;

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<Transaction>, TallyError>;

    async fn save_reward(&self, reward: Reward) -> Result<(), TallyError>;
    async fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>, TallyError>;
    async fn list_rewards(&self, group_id: &str) -> Result<Vec<Reward>, TallyError>;

    /// Sum of quantities over the user's completed redemptions of a reward.
    async fn completed_redemption_quantity(&self, user_id: &str, reward_id: &str) -> Result<u32, TallyError>;
    async fn list_redemptions(&self, user_id: &str) -> Result<Vec<RedemptionRecord>, TallyError>;

    /// Applies the batch atomically. Stale account versions yield `ConcurrencyConflict`,
    /// stock that would go negative yields `RewardUnavailable`, a breached cap yields
    /// `RedemptionLimitExceeded`; in every case nothing is written.
    async fn commit(&self, batch: LedgerBatch) -> Result<(), TallyError>;

    async fn save_level(&self, level: Level) -> Result<(), TallyError>;
    async fn list_levels(&self, group_id: &str) -> Result<Vec<Level>, TallyError>;

    /// Stores the achievement as the user's current one in its group, unless the current
    /// row already has an equal or higher level number. Returns the stored row, if any.
    async fn record_level_achievement(
        &self,
        achievement: LevelAchievement,
    ) -> Result<Option<LevelAchievement>, TallyError>;
    async fn current_level_achievement(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Option<LevelAchievement>, TallyError>;
    /// Every achievement of the user in the group, oldest first.
    async fn level_history(&self, user_id: &str, group_id: &str) -> Result<Vec<LevelAchievement>, TallyError>;

    /// Replaces rows with the same (user, group, type, period_start) and appends the rest.
    async fn save_ratings(&self, rows: Vec<RatingRow>) -> Result<(), TallyError>;
    async fn list_ratings(
        &self,
        group_id: &str,
        rating_type: RatingType,
        period_start: Option<DateTime<Utc>>,
    ) -> Result<Vec<RatingRow>, TallyError>;
    async fn latest_rating_period(
        &self,
        group_id: &str,
        rating_type: RatingType,
    ) -> Result<Option<DateTime<Utc>>, TallyError>;
    async fn rating_history(
        &self,
        user_id: &str,
        group_id: &str,
        rating_type: RatingType,
    ) -> Result<Vec<RatingRow>, TallyError>;

    async fn save_group_audit(&self, audit: GroupAudit) -> Result<(), TallyError>;
    async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, TallyError>;
}

pub mod in_memory;
