//! ---
//! dbfo_section: "05-networking-external-interfaces"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Best-effort operator notifications."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fmt;
use std::sync::Arc;

use dbfo_resilience::RetryExecutor;
use tracing::{info, warn};

use crate::control_plane::NotificationService;

/// Longest subject the pub/sub service accepts.
pub const MAX_SUBJECT_CHARS: usize = 100;

/// Publishes operator alerts. Never fails the caller.
pub struct Notifier {
    service: Arc<dyn NotificationService>,
    executor: RetryExecutor,
    topic_id: String,
}

impl Notifier {
    pub fn new(
        service: Arc<dyn NotificationService>,
        executor: RetryExecutor,
        topic_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            executor,
            topic_id: topic_id.into(),
        }
    }

    /// Publish `body` under `subject`. Publish failures are logged and dropped.
    pub async fn notify(&self, subject: &str, body: &str) {
        let subject = truncate_subject(subject);
        let result = self
            .executor
            .execute("notification.publish", || {
                self.service.publish(&self.topic_id, &subject, body)
            })
            .await;
        match result {
            Ok(message_id) => {
                info!(topic = %self.topic_id, %message_id, subject = %subject, "operator notification published");
            }
            Err(err) => {
                warn!(topic = %self.topic_id, subject = %subject, error = %err, "failed to publish operator notification");
            }
        }
    }
}

fn truncate_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("topic_id", &self.topic_id)
            .finish_non_exhaustive()
    }
}
