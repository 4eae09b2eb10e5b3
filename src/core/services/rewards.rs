use super::TallyService;
use crate::constants::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH, REWARD_CREATED, REWARD_UPDATED};
use crate::core::errors::{TallyError, UnavailableReason};
use crate::core::models::reward::{NewReward, Reward, RewardUpdate};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::Storage;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    pub async fn create_reward(&self, new_reward: NewReward, created_by: &str) -> Result<Reward, TallyError> {
        self.validate_id("group_id", &new_reward.group_id)?;
        self.validate_id("created_by", created_by)?;
        if self.storage.get_group_settings(&new_reward.group_id).await?.is_none() {
            return Err(TallyError::GroupNotFound(new_reward.group_id));
        }

        let now = Utc::now();
        let reward = Reward {
            id: Uuid::new_v4().to_string(),
            group_id: new_reward.group_id,
            name: new_reward.name.trim().to_string(),
            description: new_reward.description,
            cost: new_reward.cost,
            stock: new_reward.stock,
            max_per_user: new_reward.max_per_user,
            is_recurring: new_reward.is_recurring,
            valid_from: new_reward.valid_from,
            valid_until: new_reward.valid_until,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.validate_reward(&reward)?;
        self.storage.save_reward(reward.clone()).await?;

        info!(reward_id = %reward.id, group_id = %reward.group_id, cost = %reward.cost, "reward created");
        self.log_and_audit(
            Some(&reward.group_id),
            REWARD_CREATED,
            json!({
                "reward_id": reward.id,
                "name": reward.name,
                "cost": reward.cost.to_string(),
                "stock": reward.stock,
                "max_per_user": reward.max_per_user,
                "is_recurring": reward.is_recurring,
            }),
            Some(created_by),
        )
        .await;
        Ok(reward)
    }

    pub async fn update_reward(
        &self,
        reward_id: &str,
        update: RewardUpdate,
        updated_by: &str,
    ) -> Result<Reward, TallyError> {
        self.validate_id("updated_by", updated_by)?;
        let mut reward = self
            .storage
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| TallyError::reward_unavailable(reward_id, UnavailableReason::NotFound))?;

        if let Some(name) = update.name {
            reward.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            reward.description = description;
        }
        if let Some(cost) = update.cost {
            reward.cost = cost;
        }
        if let Some(stock) = update.stock {
            reward.stock = stock;
        }
        if let Some(max_per_user) = update.max_per_user {
            reward.max_per_user = max_per_user;
        }
        if let Some(is_recurring) = update.is_recurring {
            reward.is_recurring = is_recurring;
        }
        if let Some(valid_from) = update.valid_from {
            reward.valid_from = valid_from;
        }
        if let Some(valid_until) = update.valid_until {
            reward.valid_until = valid_until;
        }
        if let Some(active) = update.active {
            reward.active = active;
        }
        self.validate_reward(&reward)?;
        reward.updated_at = Utc::now();
        self.storage.save_reward(reward.clone()).await?;

        info!(reward_id, active = reward.active, "reward updated");
        self.log_and_audit(
            Some(&reward.group_id),
            REWARD_UPDATED,
            json!({
                "reward_id": reward.id,
                "cost": reward.cost.to_string(),
                "stock": reward.stock,
                "active": reward.active,
            }),
            Some(updated_by),
        )
        .await;
        Ok(reward)
    }

    pub async fn deactivate_reward(&self, reward_id: &str, updated_by: &str) -> Result<Reward, TallyError> {
        let update = RewardUpdate {
            active: Some(false),
            ..Default::default()
        };
        self.update_reward(reward_id, update, updated_by).await
    }

    /// Loads a reward that is active and inside its validity window at `as_of`.
    pub async fn get_available_reward(&self, reward_id: &str, as_of: DateTime<Utc>) -> Result<Reward, TallyError> {
        let reward = self
            .storage
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| TallyError::reward_unavailable(reward_id, UnavailableReason::NotFound))?;
        reward
            .availability(as_of)
            .map_err(|reason| TallyError::reward_unavailable(reward_id, reason))?;
        Ok(reward)
    }

    /// All rewards of a group, or with `available_as_of` only those redeemable at that instant.
    pub async fn list_rewards(
        &self,
        group_id: &str,
        available_as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<Reward>, TallyError> {
        let rewards = self.storage.list_rewards(group_id).await?;
        Ok(match available_as_of {
            Some(as_of) => rewards
                .into_iter()
                .filter(|r| r.availability(as_of).is_ok() && r.stock != Some(0))
                .collect(),
            None => rewards,
        })
    }

    fn validate_reward(&self, reward: &Reward) -> Result<(), TallyError> {
        self.validate_string_input("name", &reward.name, MAX_NAME_LENGTH)?;
        if let Some(description) = &reward.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(TallyError::invalid_input(
                    "description",
                    "Description Too Long",
                    format!("description cannot exceed {} characters", MAX_DESCRIPTION_LENGTH),
                ));
            }
        }
        self.validate_amount_input("cost", reward.cost, true)?;
        if reward.max_per_user == Some(0) {
            return Err(TallyError::invalid_input(
                "max_per_user",
                "Invalid Limit",
                "max_per_user must be greater than 0 when set",
            ));
        }
        if let (Some(from), Some(until)) = (reward.valid_from, reward.valid_until) {
            if from > until {
                return Err(TallyError::invalid_input(
                    "valid_until",
                    "Invalid Validity Window",
                    "valid_until cannot be earlier than valid_from",
                ));
            }
        }
        Ok(())
    }
}
