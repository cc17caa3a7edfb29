//! One-shot delivery of the editing context a freshly spawned tool window
//! belongs to. The host resolves it once; the window waits with a deadline
//! instead of polling.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::ToolWindowConfig;
use crate::error::ToolWindowError;
use crate::record::ContextKey;

pub struct ContextPublisher {
    sender: oneshot::Sender<ContextKey>,
}

pub struct ContextWaiter {
    receiver: oneshot::Receiver<ContextKey>,
}

#[must_use]
pub fn context_handoff() -> (ContextPublisher, ContextWaiter) {
    let (sender, receiver) = oneshot::channel();
    (ContextPublisher { sender }, ContextWaiter { receiver })
}

impl ContextPublisher {
    /// Returns `false` when the waiting side already gave up.
    pub fn publish(self, context: ContextKey) -> bool {
        self.sender.send(context).is_ok()
    }
}

impl ContextWaiter {
    /// Waits for the configured `context_handoff_timeout_ms`.
    pub async fn wait_with(self, config: &ToolWindowConfig) -> Result<ContextKey, ToolWindowError> {
        self.wait(config.context_handoff_timeout()).await
    }

    pub async fn wait(self, timeout: Duration) -> Result<ContextKey, ToolWindowError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(context)) => Ok(context),
            Ok(Err(_)) => Err(ToolWindowError::ContextHandoffDropped),
            Err(_) => {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(waited_ms, "book context was not injected in time");
                Err(ToolWindowError::ContextHandoffTimedOut(waited_ms))
            }
        }
    }
}
