pub mod in_memory;

use crate::core::errors::TallyError;
use crate::core::models::audit::AppLog;
use async_trait::async_trait;

/// Business audit trail of ledger mutations, separate from diagnostic tracing.
#[async_trait]
pub trait LoggingService: Send + Sync {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), TallyError>;
    async fn get_logs(&self) -> Result<Vec<AppLog>, TallyError>;
    async fn get_logs_for_action(&self, action: &str) -> Result<Vec<AppLog>, TallyError>;
}
