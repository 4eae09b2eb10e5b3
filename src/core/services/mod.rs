mod gamification;
mod ledger;
mod redemption;
mod rewards;
mod thanks;

use crate::config::{CONFIG, LedgerSettings};
use crate::constants::{GROUP_CONFIGURED, MAX_AMOUNT};
use crate::core::errors::TallyError;
use crate::core::models::{
    audit::{AppLog, GroupAudit},
    group::{DebtLimit, GroupSettings},
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::Storage;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// In-process serialization of read-modify-write cycles per account.
///
/// Entries live only while some caller holds or waits for the account's lock.
#[derive(Default)]
struct AccountLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// Held account lock. Dropping it releases the lock and prunes the idle registry entry.
struct AccountGuard<'a> {
    registry: &'a AccountLocks,
    account_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock(&self, account_id: &str) -> AccountGuard<'_> {
        let handle = self.registry().entry(account_id.to_string()).or_default().clone();
        AccountGuard {
            registry: self,
            account_id: account_id.to_string(),
            guard: Some(handle.lock_owned().await),
        }
    }

    /// Locks several accounts in id order so two callers never wait on each other crosswise.
    async fn lock_all(&self, account_ids: &[&str]) -> Vec<AccountGuard<'_>> {
        let mut ids = account_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registry().len()
    }
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.registry.registry();
        // The map's own reference is the only one left when nobody holds or awaits the lock.
        if locks.get(&self.account_id).is_some_and(|handle| Arc::strong_count(handle) == 1) {
            locks.remove(&self.account_id);
        }
    }
}

pub struct TallyService<L: LoggingService, S: Storage, C: Cache> {
    storage: S,
    logging: L,
    cache: C,
    settings: LedgerSettings,
    account_locks: AccountLocks,
}

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    pub fn new(storage: S, logging: L, cache: C, settings: LedgerSettings) -> Self {
        TallyService {
            storage,
            logging,
            cache,
            settings,
            account_locks: AccountLocks::default(),
        }
    }

    /// Builds the service with tunables read from the environment.
    pub fn from_env(storage: S, logging: L, cache: C) -> Self {
        Self::new(storage, logging, cache, LedgerSettings::from(&*CONFIG))
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    #[cfg(test)]
    pub(crate) fn account_lock_entries(&self) -> usize {
        self.account_locks.len()
    }

    /// Registers the settings the group-management side owns: currency and debt limit.
    pub async fn configure_group(&self, settings: GroupSettings) -> Result<GroupSettings, TallyError> {
        self.validate_id("group_id", &settings.group_id)?;
        if let Some(code) = &settings.currency_code {
            self.validate_string_input("currency_code", code, 32)?;
        }
        if let DebtLimit::Limited(limit) = settings.debt_limit {
            if limit < Decimal::ZERO {
                return Err(TallyError::invalid_input(
                    "debt_limit",
                    "Invalid Debt Limit",
                    "Debt limit cannot be negative",
                ));
            }
        }
        self.storage.save_group_settings(settings.clone()).await?;
        self.log_and_audit(
            Some(&settings.group_id),
            GROUP_CONFIGURED,
            json!({
                "group_id": settings.group_id,
                "currency_code": settings.currency_code,
                "debt_limit": settings.debt_limit.to_string(),
            }),
            None,
        )
        .await;
        Ok(settings)
    }

    pub async fn get_app_logs(&self) -> Result<Vec<AppLog>, TallyError> {
        self.logging.get_logs().await
    }

    pub async fn get_app_logs_for_action(&self, action: &str) -> Result<Vec<AppLog>, TallyError> {
        self.logging.get_logs_for_action(action).await
    }

    pub async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, TallyError> {
        self.storage.get_group_audits(group_id).await
    }

    async fn debt_limit(&self, group_id: &str) -> Result<DebtLimit, TallyError> {
        Ok(self
            .storage
            .get_group_settings(group_id)
            .await?
            .map(|settings| settings.debt_limit)
            .unwrap_or_default())
    }

    /// Runs `attempt` until it stops failing with a concurrency conflict or the budget runs out.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, TallyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TallyError>>,
    {
        let max_attempts = self.settings.commit_max_attempts.max(1);
        let mut backoff = self.settings.commit_backoff;
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && tries < max_attempts => {
                    warn!(operation, attempt = tries, error = %e, "commit conflict, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    /// Writes the business audit trail. The ledger write has already committed, so
    /// failures here are reported but do not fail the operation.
    async fn log_and_audit(
        &self,
        group_id: Option<&str>,
        action: &str,
        log_details: serde_json::Value,
        user_id: Option<&str>,
    ) {
        if let Err(e) = self.logging.log_action(action, log_details.clone(), user_id).await {
            warn!(action, error = %e, "failed to write app log");
        }
        if let Some(gid) = group_id {
            let audit = GroupAudit {
                id: Uuid::new_v4().to_string(),
                group_id: gid.to_string(),
                action: action.to_string(),
                user_id: user_id.map(String::from),
                details: serde_json::from_value(log_details).unwrap_or_default(),
                timestamp: Utc::now(),
            };
            if let Err(e) = self.storage.save_group_audit(audit).await {
                warn!(action, group_id = gid, error = %e, "failed to write group audit");
            }
        }
        debug!(action, "audit recorded");
    }

    fn validate_id(&self, field: &str, value: &str) -> Result<(), TallyError> {
        if value.trim().is_empty() {
            return Err(TallyError::invalid_input(
                field,
                format!("Invalid {}", field),
                format!("{} cannot be empty", field),
            ));
        }
        Ok(())
    }

    fn validate_string_input(&self, field: &str, value: &str, max_length: usize) -> Result<(), TallyError> {
        self.validate_id(field, value)?;
        if value.chars().count() > max_length {
            return Err(TallyError::invalid_input(
                field,
                format!("{} Too Long", field),
                format!("{} cannot exceed {} characters", field, max_length),
            ));
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(TallyError::invalid_input(
                field,
                format!("Invalid {}", field),
                format!("{} contains invalid characters", field),
            ));
        }
        Ok(())
    }

    /// Non-zero, at most two fractional digits, bounded magnitude; `positive` also rejects debits.
    fn validate_amount_input(&self, field: &str, amount: Decimal, positive: bool) -> Result<(), TallyError> {
        if amount.is_zero() {
            return Err(TallyError::invalid_input(field, "Invalid Amount", "Amount cannot be zero"));
        }
        if positive && amount.is_sign_negative() {
            return Err(TallyError::invalid_input(
                field,
                "Invalid Amount",
                "Amount must be greater than 0",
            ));
        }
        if amount.abs() > Decimal::from(MAX_AMOUNT) {
            return Err(TallyError::invalid_input(
                field,
                "Amount Too Large",
                format!("Amount cannot exceed {}", MAX_AMOUNT),
            ));
        }
        if amount.normalize().scale() > 2 {
            return Err(TallyError::invalid_input(
                field,
                "Invalid Amount",
                "Amount cannot have more than 2 decimal places",
            ));
        }
        Ok(())
    }
}
