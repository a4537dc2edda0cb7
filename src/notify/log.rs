// src/notify/log.rs
use async_trait::async_trait;
use tracing::info;

use super::{NotificationSink, NotifyError};

/// Writes notifications to the log only. Used when no command channel is
/// configured.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, subject_id: &str, message: &str) -> Result<(), NotifyError> {
        info!(subject = subject_id, "notify: {}", message);
        Ok(())
    }

    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        info!("broadcast: {}", message);
        Ok(())
    }
}
