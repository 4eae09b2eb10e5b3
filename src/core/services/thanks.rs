use super::TallyService;
use super::ledger::prepare_entry;
use crate::constants::{MAX_DESCRIPTION_LENGTH, SOURCE_THANKS, THANKS_SENT};
use crate::core::errors::TallyError;
use crate::core::models::{
    group::DebtLimit,
    thanks::ThanksReceipt,
    transaction::{EntryDetails, SourceEntity, TransactionType},
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{AccountWrite, LedgerBatch, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

impl<L: LoggingService, S: Storage, C: Cache> TallyService<L, S, C> {
    /// Moves `amount` points from one member to another as a single commit.
    pub async fn send_thanks(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        group_id: &str,
        amount: Decimal,
        message: Option<&str>,
    ) -> Result<ThanksReceipt, TallyError> {
        self.validate_id("from_user_id", from_user_id)?;
        self.validate_id("to_user_id", to_user_id)?;
        self.validate_amount_input("amount", amount, true)?;
        if from_user_id == to_user_id {
            return Err(TallyError::invalid_input(
                "to_user_id",
                "Invalid Recipient",
                "Cannot send thanks to yourself",
            ));
        }
        if let Some(message) = message {
            self.validate_string_input("message", message, MAX_DESCRIPTION_LENGTH)?;
        }

        let sender = self.get_or_create_account(from_user_id, group_id).await?;
        let receiver = self.get_or_create_account(to_user_id, group_id).await?;
        let debt_limit = self.debt_limit(group_id).await?;
        let thanks_id = Uuid::new_v4().to_string();

        let receipt = self
            .with_retry("send_thanks", || {
                self.try_send_thanks(&sender.id, &receiver.id, &thanks_id, amount, message, debt_limit)
            })
            .await?;

        info!(from_user_id, to_user_id, group_id, amount = %amount, "thanks sent");
        self.log_and_audit(
            Some(group_id),
            THANKS_SENT,
            json!({
                "thanks_id": thanks_id,
                "to_user_id": to_user_id,
                "amount": amount.to_string(),
                "sent_transaction_id": receipt.sent.id,
                "received_transaction_id": receipt.received.id,
            }),
            Some(from_user_id),
        )
        .await;
        Ok(receipt)
    }

    async fn try_send_thanks(
        &self,
        sender_id: &str,
        receiver_id: &str,
        thanks_id: &str,
        amount: Decimal,
        message: Option<&str>,
        debt_limit: DebtLimit,
    ) -> Result<ThanksReceipt, TallyError> {
        let _guards = self.account_locks.lock_all(&[sender_id, receiver_id]).await;
        let sender = self.get_account(sender_id).await?;
        let receiver = self.get_account(receiver_id).await?;
        let now = Utc::now();
        let source = SourceEntity::new(SOURCE_THANKS, thanks_id);

        let sent_details = EntryDetails {
            description: message.map(String::from),
            ..Default::default()
        }
        .with_source(source.clone())
        .with_related_user(&receiver.user_id);
        let (updated_sender, sent) =
            prepare_entry(&sender, -amount, TransactionType::ThankYouSent, sent_details, debt_limit, now)?;

        let received_details = EntryDetails {
            description: message.map(String::from),
            ..Default::default()
        }
        .with_source(source)
        .with_related_user(&sender.user_id);
        let (updated_receiver, received) = prepare_entry(
            &receiver,
            amount,
            TransactionType::ThankYouReceived,
            received_details,
            debt_limit,
            now,
        )?;

        self.storage
            .commit(LedgerBatch {
                accounts: vec![
                    AccountWrite {
                        account: updated_sender.clone(),
                        expected_version: sender.version,
                    },
                    AccountWrite {
                        account: updated_receiver.clone(),
                        expected_version: receiver.version,
                    },
                ],
                transactions: vec![sent.clone(), received.clone()],
                ..Default::default()
            })
            .await?;
        Ok(ThanksReceipt {
            sender: updated_sender,
            receiver: updated_receiver,
            sent,
            received,
        })
    }
}
