// src/notify/mod.rs
pub mod command_channel;
pub mod log;
pub mod messages;

use async_trait::async_trait;
use thiserror::Error;

pub use command_channel::CommandChannelSink;
pub use self::log::TracingSink;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound messages to identity holders. The transport behind it is an
/// adapter; the verification flow only ever talks to this trait.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, subject_id: &str, message: &str) -> Result<(), NotifyError>;

    async fn broadcast(&self, message: &str) -> Result<(), NotifyError>;

    /// Perks for a freshly verified subject. Transports that can do more than
    /// send text override this.
    async fn grant_benefits(&self, subject_id: &str) -> Result<(), NotifyError> {
        self.notify(subject_id, &messages::benefits_granted()).await
    }
}
