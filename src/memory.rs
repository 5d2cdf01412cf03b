//! Long-term conversational memory, stored by an external service.
//!
//! After each completed reply the full turn sequence is sent to a
//! Mem0-compatible API keyed by user id. Writes are best effort: they run on
//! their own task, failures are logged, and nothing is read back here.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::chat::Message;
use crate::config::MemoryConfig;
use crate::error::ProviderError;

#[async_trait]
pub trait MemoryRecorder: Send + Sync {
    /// Persist `messages` (oldest first) under `user_id`.
    async fn record(&self, user_id: &str, messages: &[Message]) -> Result<(), ProviderError>;
}

/// Build the configured recorder, or `None` when memory is disabled.
pub fn create_recorder(config: &MemoryConfig) -> Option<Arc<dyn MemoryRecorder>> {
    if !config.enabled {
        return None;
    }
    if config.api_key.is_empty() {
        tracing::warn!("memory enabled but no API key configured; memory writes disabled");
        return None;
    }
    Some(Arc::new(Mem0Recorder::new(config)))
}

pub struct Mem0Recorder {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct AddMemoriesRequest<'a> {
    messages: &'a [Message],
    user_id: &'a str,
}

impl Mem0Recorder {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl MemoryRecorder for Mem0Recorder {
    async fn record(&self, user_id: &str, messages: &[Message]) -> Result<(), ProviderError> {
        let resp = self
            .client
            .post(format!("{}/v1/memories/", self.base_url))
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&AddMemoriesRequest { messages, user_id })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }
        Ok(())
    }
}

/// Fire-and-forget write. The returned handle may be awaited or dropped;
/// the task never panics and only logs on failure.
pub fn record_in_background(
    recorder: Arc<dyn MemoryRecorder>,
    user_id: String,
    messages: Vec<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        match recorder.record(&user_id, &messages).await {
            Ok(()) => tracing::debug!(
                user_id = %user_id,
                messages = messages.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "memory updated"
            ),
            Err(e) => tracing::warn!(
                user_id = %user_id,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "memory update failed"
            ),
        }
    })
}
