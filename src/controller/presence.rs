use super::ServerController;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Coalesces player count changes into one presence refresh per window.
pub(crate) struct PresenceDebouncer {
    delay: Duration,
    scheduled: Arc<AtomicBool>,
}

impl PresenceDebouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule a refresh unless one is already pending.
    pub(crate) fn trigger(&self, controller: ServerController) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let scheduled = self.scheduled.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Changes from here on schedule another refresh.
            scheduled.store(false, Ordering::Release);

            let total = controller.total_online_players().await;
            if let Err(e) = controller
                .collaborators()
                .notifier
                .update_presence(total)
                .await
            {
                tracing::warn!(error = %e, "Failed to update presence");
            }
        });
    }
}
