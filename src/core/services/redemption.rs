use super::TallyService;
use super::ledger::prepare_entry;
use crate::constants::{MAX_AMOUNT, REWARD_REDEEMED, SOURCE_REWARD};
use crate::core::errors::{TallyError, UnavailableReason};
use crate::core::models::{
    redemption::{RedemptionRecord, RedemptionStatus},
    transaction::{EntryDetails, SourceEntity, TransactionType},
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{AccountWrite, LedgerBatch, PerUserCap, StockDecrement, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    /// Spends points on `quantity` units of a reward.
    ///
    /// The debit, the stock decrement and the completed record commit together; a failure
    /// at any step leaves balance, stock and history untouched.
    pub async fn redeem_reward(
        &self,
        user_id: &str,
        reward_id: &str,
        group_id: &str,
        quantity: u32,
    ) -> Result<RedemptionRecord, TallyError> {
        if quantity == 0 {
            return Err(TallyError::invalid_input(
                "quantity",
                "Invalid Quantity",
                "Quantity must be at least 1",
            ));
        }
        self.validate_id("user_id", user_id)?;
        self.validate_id("reward_id", reward_id)?;
        self.validate_id("group_id", group_id)?;

        let record = self
            .with_retry("redeem_reward", || self.try_redeem(user_id, reward_id, group_id, quantity))
            .await?;

        info!(
            redemption_id = %record.id,
            user_id,
            reward_id,
            quantity,
            points_spent = %record.points_spent,
            "reward redeemed"
        );
        self.log_and_audit(
            Some(group_id),
            REWARD_REDEEMED,
            json!({
                "redemption_id": record.id,
                "reward_id": reward_id,
                "transaction_id": record.transaction_id,
                "quantity": quantity,
                "points_spent": record.points_spent.to_string(),
            }),
            Some(user_id),
        )
        .await;
        Ok(record)
    }

    async fn try_redeem(
        &self,
        user_id: &str,
        reward_id: &str,
        group_id: &str,
        quantity: u32,
    ) -> Result<RedemptionRecord, TallyError> {
        let now = Utc::now();
        let reward = self.get_available_reward(reward_id, now).await?;
        if reward.group_id != group_id {
            return Err(TallyError::RedemptionDenied(format!(
                "reward {} does not belong to group {}",
                reward_id, group_id
            )));
        }
        if reward.stock.is_some_and(|stock| stock < quantity) {
            return Err(TallyError::reward_unavailable(reward_id, UnavailableReason::InsufficientStock));
        }
        let cap = reward.per_user_cap();
        if let Some(limit) = cap {
            let already_redeemed = self.storage.completed_redemption_quantity(user_id, reward_id).await?;
            if already_redeemed.checked_add(quantity).is_none_or(|total| total > limit) {
                return Err(TallyError::RedemptionLimitExceeded {
                    reward_id: reward_id.to_string(),
                    limit,
                    already_redeemed,
                });
            }
        }

        let total_cost = reward
            .cost
            .checked_mul(Decimal::from(quantity))
            .filter(|total| *total <= Decimal::from(MAX_AMOUNT))
            .ok_or_else(|| {
                TallyError::invalid_input(
                    "quantity",
                    "Redemption Too Large",
                    format!("Total cost of {} x {} cannot exceed {}", quantity, reward.name, MAX_AMOUNT),
                )
            })?;

        let account = self.get_or_create_account(user_id, &reward.group_id).await?;
        let debt_limit = self.debt_limit(&reward.group_id).await?;

        let _guard = self.account_locks.lock(&account.id).await;
        let account = self.get_account(&account.id).await?;
        let details = EntryDetails::described(format!("Redeemed {} x {}", quantity, reward.name))
            .with_source(SourceEntity::new(SOURCE_REWARD, &reward.id));
        let (updated, transaction) =
            prepare_entry(&account, -total_cost, TransactionType::RewardPurchase, details, debt_limit, now)?;

        let record = RedemptionRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            reward_id: reward.id.clone(),
            group_id: reward.group_id.clone(),
            account_id: account.id.clone(),
            transaction_id: transaction.id.clone(),
            quantity,
            points_spent: total_cost,
            status: RedemptionStatus::Completed,
            redeemed_at: transaction.created_at,
        };
        let batch = LedgerBatch {
            accounts: vec![AccountWrite {
                account: updated,
                expected_version: account.version,
            }],
            transactions: vec![transaction],
            stock_decrements: reward
                .stock
                .map(|_| StockDecrement {
                    reward_id: reward.id.clone(),
                    quantity,
                })
                .into_iter()
                .collect(),
            per_user_caps: cap
                .map(|limit| PerUserCap {
                    user_id: user_id.to_string(),
                    reward_id: reward.id.clone(),
                    limit,
                })
                .into_iter()
                .collect(),
            redemptions: vec![record.clone()],
        };
        self.storage.commit(batch).await?;
        Ok(record)
    }

    /// A user's redemptions, oldest first, optionally restricted to one group.
    pub async fn list_redemptions(
        &self,
        user_id: &str,
        group_id: Option<&str>,
    ) -> Result<Vec<RedemptionRecord>, TallyError> {
        let mut redemptions: Vec<RedemptionRecord> = self
            .storage
            .list_redemptions(user_id)
            .await?
            .into_iter()
            .filter(|r| group_id.is_none_or(|gid| r.group_id == gid))
            .collect();
        redemptions.sort_by(|a, b| a.redeemed_at.cmp(&b.redeemed_at));
        Ok(redemptions)
    }
}
