// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-visible notification side channel.
//!
//! Every provider operation reports its outcome here in addition to its
//! return value. Front ends subscribe and render toasts; callers that only
//! care about the `Result` can ignore the channel entirely.

use crate::error::AuthError;
use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered notices per subscriber before the oldest are dropped.
const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Cloneable handle publishing notices to all subscribers.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    /// Receive every notice published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(message = %message, "Notice");
        self.publish(Notice {
            level: NoticeLevel::Success,
            message,
        });
    }

    pub fn failure(&self, error: &AuthError) {
        tracing::info!(error = %error, "Operation failed");
        self.publish(Notice {
            level: NoticeLevel::Error,
            message: error.user_message(),
        });
    }

    /// Publish a notice for `result` and hand it back unchanged.
    pub fn report<T>(
        &self,
        result: Result<T, AuthError>,
        on_success: impl FnOnce(&T) -> String,
    ) -> Result<T, AuthError> {
        match &result {
            Ok(value) => self.success(on_success(value)),
            Err(e) => self.failure(e),
        }
        result
    }

    fn publish(&self, notice: Notice) {
        // No subscribers is fine: the notice is also in the trace log.
        let _ = self.tx.send(notice);
    }
}
