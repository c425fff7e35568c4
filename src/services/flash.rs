//! Transient status messages
//!
//! Messages are queued per session and handed out once. Unread messages
//! expire after ten minutes.

use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_SESSIONS: u64 = 10_000;
const MESSAGE_TTL: Duration = Duration::from_secs(600);

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            text: text.into(),
        }
    }
}

/// Per-session message queue
pub struct FlashStore {
    cache: Cache<String, Vec<FlashMessage>>,
}

impl std::fmt::Debug for FlashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashStore")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl Default for FlashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashStore {
    pub fn new() -> Self {
        Self::with_ttl(MESSAGE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Queue a message for the session
    pub async fn push(&self, session: &str, message: FlashMessage) {
        self.cache
            .entry(session.to_string())
            .and_upsert_with(|existing| async move {
                let mut queue = existing.map(|entry| entry.into_value()).unwrap_or_default();
                queue.push(message);
                queue
            })
            .await;
    }

    /// Remove and return every queued message for the session, oldest first.
    /// Expired queues count as empty.
    pub async fn take(&self, session: &str) -> Vec<FlashMessage> {
        let result = self
            .cache
            .entry(session.to_string())
            .and_compute_with(|existing| async move {
                match existing {
                    Some(_) => Op::Remove,
                    None => Op::Nop,
                }
            })
            .await;

        match result {
            CompResult::Removed(entry) => entry.into_value(),
            _ => Vec::new(),
        }
    }
}
