// src/notify/command_channel.rs
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{messages, NotificationSink, NotifyError};

/// Sends server console commands over a plain TCP line channel, one
/// connection per command.
pub struct CommandChannelSink {
    address: String,
    connect_timeout: Duration,
}

impl CommandChannelSink {
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Self {
        Self {
            address: format!("{host}:{port}"),
            connect_timeout,
        }
    }

    async fn execute(&self, command: &str) -> Result<(), NotifyError> {
        let mut stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(&self.address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Command channel {} unreachable: {}", self.address, e);
                return Err(NotifyError::Transport(e.to_string()));
            }
            Err(_) => {
                warn!("Command channel {} connect timed out", self.address);
                return Err(NotifyError::Transport("connect timed out".into()));
            }
        };

        let line = format!("{}\n", single_line(command));
        stream.write_all(line.as_bytes()).await?;
        stream.shutdown().await?;

        debug!(command = %line.trim_end(), "Command sent");
        Ok(())
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn tellraw(subject_id: &str, message: &str, bold: bool) -> String {
    let component = if bold {
        json!({ "text": message, "bold": true })
    } else {
        json!({ "text": message })
    };
    format!("tellraw {subject_id} {component}")
}

#[async_trait]
impl NotificationSink for CommandChannelSink {
    async fn notify(&self, subject_id: &str, message: &str) -> Result<(), NotifyError> {
        self.execute(&tellraw(subject_id, message, false)).await
    }

    async fn broadcast(&self, message: &str) -> Result<(), NotifyError> {
        self.execute(&format!("say {message}")).await
    }

    async fn grant_benefits(&self, subject_id: &str) -> Result<(), NotifyError> {
        self.execute(&format!(
            "effect give {subject_id} minecraft:glowing 999999 0 true"
        ))
        .await?;
        self.execute(&tellraw(subject_id, &messages::benefits_granted(), true))
            .await
    }
}
