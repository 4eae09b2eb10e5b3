use crate::core::errors::TallyError;
use crate::core::models::audit::AppLog;
use crate::infrastructure::logging::LoggingService;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryLogging {
    logs: Arc<RwLock<Vec<AppLog>>>,
}

impl InMemoryLogging {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoggingService for InMemoryLogging {
    async fn log_action(
        &self,
        action: &str,
        details: serde_json::Value,
        user_id: Option<&str>,
    ) -> Result<(), TallyError> {
        let details = serde_json::from_value(details)
            .map_err(|e| TallyError::LoggingError(format!("Audit details must be a JSON object: {}", e)))?;
        let mut logs = self.logs.write().await;
        logs.push(AppLog {
            id: Uuid::new_v4().to_string(),
            action: action.to_string(),
            user_id: user_id.map(String::from),
            details,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn get_logs(&self) -> Result<Vec<AppLog>, TallyError> {
        let logs = self.logs.read().await;
        Ok(logs.clone())
    }

    async fn get_logs_for_action(&self, action: &str) -> Result<Vec<AppLog>, TallyError> {
        let logs = self.logs.read().await;
        Ok(logs.iter().filter(|log| log.action == action).cloned().collect())
    }
}
