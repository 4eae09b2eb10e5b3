mod model_tests;
mod storage_tests;

use crate::config::{CONFIG, LedgerSettings};
use crate::core::models::{
    account::{Account, AccountRef},
    group::{DebtLimit, GroupSettings},
    transaction::{EntryDetails, TransactionType},
};
use crate::core::services::TallyService;
use crate::infrastructure::cache::in_memory::InMemoryCache;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub type TestService = TallyService<InMemoryLogging, InMemoryStorage, InMemoryCache>;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&CONFIG.log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

pub fn test_settings() -> LedgerSettings {
    LedgerSettings {
        commit_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn create_test_service() -> TestService {
    init_tracing();
    TallyService::new(
        InMemoryStorage::new(),
        InMemoryLogging::new(),
        InMemoryCache::new(),
        test_settings(),
    )
}

pub async fn setup_group(service: &TestService, group_id: &str, debt_limit: DebtLimit) {
    service
        .configure_group(GroupSettings::new(group_id, "POINTS").with_debt_limit(debt_limit))
        .await
        .unwrap();
}

pub async fn credit(service: &TestService, user_id: &str, group_id: &str, amount: Decimal) -> Account {
    let (account, _) = service
        .adjust_balance(
            &AccountRef::owner(user_id, group_id),
            amount,
            TransactionType::TaskReward,
            EntryDetails::described("task completed"),
        )
        .await
        .unwrap();
    account
}
