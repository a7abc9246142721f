use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Emits every notification as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        let payload = serde_json::to_string(&notification).unwrap_or_default();
        match &notification {
            Notification::OrderFailed { .. }
            | Notification::PaymentOutstanding { .. }
            | Notification::RefundRequired { .. }
            | Notification::LowStock { .. } => {
                warn!(target: "notifications", %payload, "notification");
            }
            _ => info!(target: "notifications", %payload, "notification"),
        }
    }
}

/// Keeps notifications in memory so tests can assert on them.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().await.push(notification);
    }
}
