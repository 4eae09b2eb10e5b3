use super::TallyService;
use crate::constants::{ACCOUNT_CREATED, BALANCE_ADJUSTED, MANUAL_ADJUSTMENT, MAX_DESCRIPTION_LENGTH, SOURCE_BONUS_ADJUSTMENT};
use crate::core::errors::TallyError;
use crate::core::models::{
    account::{Account, AccountRef, LedgerAudit},
    group::DebtLimit,
    transaction::{EntryDetails, Page, SourceEntity, Transaction, TransactionFilter, TransactionType},
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{AccountWrite, LedgerBatch, Storage};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

/// Builds the entry and the account state it produces without touching storage.
///
/// Debits that would take the balance past `debt_limit` fail with `InsufficientFunds`.
/// The entry is never dated before the account's previous one.
pub(super) fn prepare_entry(
    account: &Account,
    amount: Decimal,
    type_code: TransactionType,
    details: EntryDetails,
    debt_limit: DebtLimit,
    now: DateTime<Utc>,
) -> Result<(Account, Transaction), TallyError> {
    let new_balance = account.balance + amount;
    if amount.is_sign_negative() && !debt_limit.permits(new_balance) {
        return Err(TallyError::InsufficientFunds {
            current_balance: account.balance,
            requested: amount.abs(),
        });
    }
    let created_at = account.last_transaction_at.map_or(now, |last| last.max(now));
    let transaction = Transaction {
        id: Uuid::new_v4().to_string(),
        account_id: account.id.clone(),
        amount,
        type_code,
        description: details.description,
        source: details.source,
        related_user_id: details.related_user_id,
        balance_after: new_balance,
        sequence: account.version + 1,
        created_at,
    };
    let updated = Account {
        balance: new_balance,
        last_transaction_at: Some(created_at),
        version: account.version + 1,
        ..account.clone()
    };
    Ok((updated, transaction))
}

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    pub async fn get_or_create_account(&self, user_id: &str, group_id: &str) -> Result<Account, TallyError> {
        self.validate_id("user_id", user_id)?;
        self.validate_id("group_id", group_id)?;
        if let Some(account) = self.storage.get_account_by_owner(user_id, group_id).await? {
            return Ok(account);
        }

        let settings = self
            .storage
            .get_group_settings(group_id)
            .await?
            .ok_or_else(|| TallyError::ConfigurationError(format!("Group {} is not configured", group_id)))?;
        let currency_code = settings
            .currency_code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| TallyError::ConfigurationError(format!("Group {} has no active bonus type", group_id)))?;

        let candidate = Account::new(Uuid::new_v4().to_string(), user_id, group_id, &currency_code, Utc::now());
        let account = self.storage.create_account_if_not_exists(candidate.clone()).await?;
        if account.id == candidate.id {
            info!(account_id = %account.id, user_id, group_id, "account created");
            self.log_and_audit(
                Some(group_id),
                ACCOUNT_CREATED,
                json!({
                    "account_id": account.id,
                    "currency_code": account.currency_code,
                }),
                Some(user_id),
            )
            .await;
        }
        Ok(account)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, TallyError> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| TallyError::AccountNotFound(account_id.to_string()))
    }

    pub async fn list_accounts(&self, group_id: &str) -> Result<Vec<Account>, TallyError> {
        self.storage.list_group_accounts(group_id).await
    }

    /// Every account the user holds, one per group.
    pub async fn list_user_accounts(&self, user_id: &str) -> Result<Vec<Account>, TallyError> {
        self.validate_id("user_id", user_id)?;
        self.storage.list_user_accounts(user_id).await
    }

    async fn resolve_account(&self, account: &AccountRef) -> Result<Account, TallyError> {
        match account {
            AccountRef::Id(account_id) => self.get_account(account_id).await,
            AccountRef::Owner { user_id, group_id } => self.get_or_create_account(user_id, group_id).await,
        }
    }

    /// Appends one entry to an account's log and moves its balance by `amount`.
    pub async fn adjust_balance(
        &self,
        account: &AccountRef,
        amount: Decimal,
        type_code: TransactionType,
        details: EntryDetails,
    ) -> Result<(Account, Transaction), TallyError> {
        self.validate_amount_input("amount", amount, false)?;
        if let Some(description) = &details.description {
            self.validate_string_input("description", description, MAX_DESCRIPTION_LENGTH)?;
        }
        let resolved = self.resolve_account(account).await?;
        let debt_limit = self.debt_limit(&resolved.group_id).await?;

        let (updated, transaction) = self
            .with_retry("adjust_balance", || {
                self.try_adjust(&resolved.id, amount, type_code, &details, debt_limit)
            })
            .await?;

        info!(
            account_id = %updated.id,
            amount = %amount,
            type_code = %type_code,
            balance = %updated.balance,
            "balance adjusted"
        );
        self.log_and_audit(
            Some(&updated.group_id),
            BALANCE_ADJUSTED,
            json!({
                "account_id": updated.id,
                "transaction_id": transaction.id,
                "amount": amount.to_string(),
                "type_code": type_code.as_str(),
                "balance_after": transaction.balance_after.to_string(),
            }),
            Some(&updated.user_id),
        )
        .await;
        Ok((updated, transaction))
    }

    async fn try_adjust(
        &self,
        account_id: &str,
        amount: Decimal,
        type_code: TransactionType,
        details: &EntryDetails,
        debt_limit: DebtLimit,
    ) -> Result<(Account, Transaction), TallyError> {
        let _guard = self.account_locks.lock(account_id).await;
        let account = self.get_account(account_id).await?;
        let (updated, transaction) = prepare_entry(&account, amount, type_code, details.clone(), debt_limit, Utc::now())?;
        self.storage
            .commit(LedgerBatch {
                accounts: vec![AccountWrite {
                    account: updated.clone(),
                    expected_version: account.version,
                }],
                transactions: vec![transaction.clone()],
                ..Default::default()
            })
            .await?;
        Ok((updated, transaction))
    }

    /// Transactions of an account in commit order. Without a page, the configured default size applies.
    pub async fn list_transactions(
        &self,
        account_id: &str,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> Result<Vec<Transaction>, TallyError> {
        self.get_account(account_id).await?;
        let page = page.unwrap_or_else(|| Page::new(0, self.settings.default_page_size));
        debug!(account_id, offset = page.offset, limit = page.limit, "listing transactions");
        self.storage.list_transactions(account_id, filter, page).await
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> Result<Transaction, TallyError> {
        self.storage
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| TallyError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Administrative credit or debit, typed by the sign of `amount`.
    pub async fn manual_adjustment(
        &self,
        account_id: &str,
        amount: Decimal,
        reason: &str,
        admin_user_id: &str,
    ) -> Result<(Account, Transaction), TallyError> {
        self.validate_id("admin_user_id", admin_user_id)?;
        self.validate_string_input("reason", reason, MAX_DESCRIPTION_LENGTH)?;
        let type_code = if amount.is_sign_negative() {
            TransactionType::ManualDebit
        } else {
            TransactionType::ManualCredit
        };
        let adjustment_id = Uuid::new_v4().to_string();
        let details =
            EntryDetails::described(reason).with_source(SourceEntity::new(SOURCE_BONUS_ADJUSTMENT, &adjustment_id));

        let (account, transaction) = self
            .adjust_balance(&AccountRef::Id(account_id.to_string()), amount, type_code, details)
            .await?;
        self.log_and_audit(
            Some(&account.group_id),
            MANUAL_ADJUSTMENT,
            json!({
                "adjustment_id": adjustment_id,
                "account_id": account.id,
                "transaction_id": transaction.id,
                "amount": amount.to_string(),
                "reason": reason,
            }),
            Some(admin_user_id),
        )
        .await;
        Ok((account, transaction))
    }

    /// Replays the account's log and compares every `balance_after` and the final balance.
    pub async fn audit_account(&self, account_id: &str) -> Result<LedgerAudit, TallyError> {
        let account = self.get_account(account_id).await?;
        let mut transactions = self
            .storage
            .list_transactions(account_id, &TransactionFilter::default(), Page::all())
            .await?;
        transactions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.sequence.cmp(&b.sequence)));

        let mut running = Decimal::ZERO;
        let mut first_mismatch = None;
        for transaction in &transactions {
            running += transaction.amount;
            if first_mismatch.is_none() && transaction.balance_after != running {
                first_mismatch = Some(transaction.id.clone());
            }
        }
        Ok(LedgerAudit {
            account_id: account.id,
            transaction_count: transactions.len(),
            recorded_balance: account.balance,
            replayed_balance: running,
            first_mismatch,
        })
    }
}
