use crate::core::errors::{TallyError, UnavailableReason};
use crate::core::models::{
    account::Account,
    redemption::{RedemptionRecord, RedemptionStatus},
    reward::Reward,
    transaction::{Page, Transaction, TransactionFilter, TransactionType},
};
use crate::infrastructure::storage::{
    AccountWrite, LedgerBatch, PerUserCap, StockDecrement, Storage, in_memory::InMemoryStorage,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn account(id: &str, user_id: &str) -> Account {
    Account::new(id.to_string(), user_id, "g1", "POINTS", Utc::now())
}

fn reward(id: &str, stock: Option<u32>) -> Reward {
    let now = Utc::now();
    Reward {
        id: id.to_string(),
        group_id: "g1".to_string(),
        name: "Pizza".to_string(),
        description: None,
        cost: dec!(10),
        stock,
        max_per_user: None,
        is_recurring: true,
        valid_from: None,
        valid_until: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

fn entry(account: &Account, amount: Decimal) -> (AccountWrite, Transaction) {
    let transaction = Transaction {
        id: format!("tx-{}-{}", account.id, account.version + 1),
        account_id: account.id.clone(),
        amount,
        type_code: TransactionType::TaskReward,
        description: None,
        source: None,
        related_user_id: None,
        balance_after: account.balance + amount,
        sequence: account.version + 1,
        created_at: Utc::now(),
    };
    let write = AccountWrite {
        account: Account {
            balance: account.balance + amount,
            version: account.version + 1,
            last_transaction_at: Some(transaction.created_at),
            ..account.clone()
        },
        expected_version: account.version,
    };
    (write, transaction)
}

fn redemption(account: &Account, reward_id: &str, transaction_id: &str, quantity: u32) -> RedemptionRecord {
    RedemptionRecord {
        id: format!("r-{}", transaction_id),
        user_id: account.user_id.clone(),
        reward_id: reward_id.to_string(),
        group_id: account.group_id.clone(),
        account_id: account.id.clone(),
        transaction_id: transaction_id.to_string(),
        quantity,
        points_spent: dec!(10) * Decimal::from(quantity),
        status: RedemptionStatus::Completed,
        redeemed_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_create_account_if_not_exists_returns_existing_row() {
    let storage = InMemoryStorage::new();
    let first = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    let second = storage.create_account_if_not_exists(account("a2", "alice")).await.unwrap();
    assert_eq!(first.id, "a1");
    assert_eq!(second.id, "a1");
    assert!(storage.get_account("a2").await.unwrap().is_none());
    assert_eq!(storage.list_group_accounts("g1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account_with_transactions_is_rejected() {
    let storage = InMemoryStorage::new();
    let used = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    storage.create_account_if_not_exists(account("a2", "bob")).await.unwrap();
    let (write, transaction) = entry(&used, dec!(5));
    storage
        .commit(LedgerBatch {
            accounts: vec![write],
            transactions: vec![transaction],
            ..Default::default()
        })
        .await
        .unwrap();

    let result = storage.delete_account("a1").await;
    assert!(matches!(result, Err(TallyError::AccountInUse(id)) if id == "a1"));
    assert!(storage.get_account("a1").await.unwrap().is_some());

    storage.delete_account("a2").await.unwrap();
    assert!(storage.get_account_by_owner("bob", "g1").await.unwrap().is_none());
    assert!(matches!(
        storage.delete_account("a2").await,
        Err(TallyError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_stale_version_rejects_whole_batch() {
    let storage = InMemoryStorage::new();
    let alice = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    let bob = storage.create_account_if_not_exists(account("a2", "bob")).await.unwrap();

    let (first, first_tx) = entry(&alice, dec!(5));
    storage
        .commit(LedgerBatch {
            accounts: vec![first],
            transactions: vec![first_tx],
            ..Default::default()
        })
        .await
        .unwrap();

    // Built from the pre-commit snapshot of alice.
    let (stale, stale_tx) = entry(&alice, dec!(7));
    let (fresh, fresh_tx) = entry(&bob, dec!(3));
    let result = storage
        .commit(LedgerBatch {
            accounts: vec![fresh, stale],
            transactions: vec![fresh_tx, stale_tx],
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(TallyError::ConcurrencyConflict(_))));

    let bob = storage.get_account("a2").await.unwrap().unwrap();
    assert_eq!(bob.balance, Decimal::ZERO);
    assert_eq!(bob.version, 0);
    let alice = storage.get_account("a1").await.unwrap().unwrap();
    assert_eq!(alice.balance, dec!(5));
    let bob_history = storage
        .list_transactions("a2", &TransactionFilter::default(), Page::all())
        .await
        .unwrap();
    assert!(bob_history.is_empty());
}

#[tokio::test]
async fn test_stock_overdraw_rejects_batch() {
    let storage = InMemoryStorage::new();
    storage.save_reward(reward("rw", Some(1))).await.unwrap();
    let alice = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    let (write, transaction) = entry(&alice, dec!(-20));
    let record = redemption(&alice, "rw", &transaction.id, 2);

    let result = storage
        .commit(LedgerBatch {
            accounts: vec![write],
            transactions: vec![transaction],
            stock_decrements: vec![StockDecrement {
                reward_id: "rw".to_string(),
                quantity: 2,
            }],
            redemptions: vec![record],
            ..Default::default()
        })
        .await;
    match result {
        Err(TallyError::RewardUnavailable { reason, .. }) => assert_eq!(reason, UnavailableReason::InsufficientStock),
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
    assert_eq!(storage.get_reward("rw").await.unwrap().unwrap().stock, Some(1));
    assert_eq!(storage.get_account("a1").await.unwrap().unwrap().version, 0);
    assert!(storage.list_redemptions("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_per_user_cap_counts_completed_and_pending_quantity() {
    let storage = InMemoryStorage::new();
    storage.save_reward(reward("rw", None)).await.unwrap();
    let alice = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    let cap = PerUserCap {
        user_id: "alice".to_string(),
        reward_id: "rw".to_string(),
        limit: 3,
    };

    let (write, transaction) = entry(&alice, dec!(-20));
    let record = redemption(&alice, "rw", &transaction.id, 2);
    storage
        .commit(LedgerBatch {
            accounts: vec![write.clone()],
            transactions: vec![transaction],
            per_user_caps: vec![cap.clone()],
            redemptions: vec![record],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(storage.completed_redemption_quantity("alice", "rw").await.unwrap(), 2);

    let (second_write, second_tx) = entry(&write.account, dec!(-20));
    let second = redemption(&alice, "rw", &second_tx.id, 2);
    let result = storage
        .commit(LedgerBatch {
            accounts: vec![second_write],
            transactions: vec![second_tx],
            per_user_caps: vec![cap],
            redemptions: vec![second],
            ..Default::default()
        })
        .await;
    assert!(matches!(
        result,
        Err(TallyError::RedemptionLimitExceeded {
            limit: 3,
            already_redeemed: 2,
            ..
        })
    ));
    assert_eq!(storage.get_account("a1").await.unwrap().unwrap().version, 1);
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let storage = InMemoryStorage::new();
    storage.commit(LedgerBatch::default()).await.unwrap();
    assert!(storage.list_group_accounts("g1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_per_user_cap_holds_for_maximal_pending_quantity() {
    let storage = InMemoryStorage::new();
    storage.save_reward(reward("rw", Some(u32::MAX))).await.unwrap();
    let alice = storage.create_account_if_not_exists(account("a1", "alice")).await.unwrap();
    let cap = PerUserCap {
        user_id: "alice".to_string(),
        reward_id: "rw".to_string(),
        limit: 5,
    };

    let (write, transaction) = entry(&alice, dec!(-10));
    let record = redemption(&alice, "rw", &transaction.id, 1);
    storage
        .commit(LedgerBatch {
            accounts: vec![write.clone()],
            transactions: vec![transaction],
            per_user_caps: vec![cap.clone()],
            redemptions: vec![record],
            ..Default::default()
        })
        .await
        .unwrap();

    let (second_write, second_tx) = entry(&write.account, dec!(-10));
    let huge = redemption(&alice, "rw", &second_tx.id, u32::MAX);
    let result = storage
        .commit(LedgerBatch {
            accounts: vec![second_write.clone()],
            transactions: vec![second_tx.clone()],
            per_user_caps: vec![cap],
            redemptions: vec![huge.clone()],
            ..Default::default()
        })
        .await;
    assert!(matches!(
        result,
        Err(TallyError::RedemptionLimitExceeded {
            limit: 5,
            already_redeemed: 1,
            ..
        })
    ));

    // Two decrements that together exceed u32 range.
    let result = storage
        .commit(LedgerBatch {
            accounts: vec![second_write],
            transactions: vec![second_tx],
            stock_decrements: vec![
                StockDecrement {
                    reward_id: "rw".to_string(),
                    quantity: u32::MAX,
                },
                StockDecrement {
                    reward_id: "rw".to_string(),
                    quantity: 1,
                },
            ],
            redemptions: vec![huge],
            ..Default::default()
        })
        .await;
    assert!(matches!(
        result,
        Err(TallyError::RewardUnavailable {
            reason: UnavailableReason::InsufficientStock,
            ..
        })
    ));
    assert_eq!(storage.completed_redemption_quantity("alice", "rw").await.unwrap(), 1);
    assert_eq!(storage.get_reward("rw").await.unwrap().unwrap().stock, Some(u32::MAX));
    assert_eq!(storage.get_account("a1").await.unwrap().unwrap().version, 1);
}
