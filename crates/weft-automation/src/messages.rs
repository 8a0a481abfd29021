//! Scheduled messages — the simpler sibling of the workflow scheduler.
//!
//! A message is either one-shot (`run_at` in the future, delivered exactly
//! once) or recurring (`run_at` advances by its interval on every delivery).
//! Delivery and the state update happen in the same sequential pass, so one
//! due time never produces two deliveries.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use weft_core::traits::Notifier;

use crate::persistence::MessageStore;
use crate::workflow::short_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Active,
    Delivered,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Active => "active",
            MessageStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "delivered" => MessageStatus::Delivered,
            _ => MessageStatus::Active,
        }
    }
}

/// A message queued for future (or repeated) delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub owner_id: String,
    pub message: String,
    /// Next delivery time. None means "due on every tick" for recurring
    /// messages.
    pub run_at: Option<DateTime<Utc>>,
    pub repeat: bool,
    pub repeat_interval_minutes: u32,
    pub status: MessageStatus,
    pub run_count: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledMessage {
    /// One-shot message delivered at `run_at`.
    pub fn once(owner_id: &str, message: &str, run_at: DateTime<Utc>) -> Self {
        Self {
            id: short_id("msg"),
            owner_id: owner_id.to_string(),
            message: message.to_string(),
            run_at: Some(run_at),
            repeat: false,
            repeat_interval_minutes: 0,
            status: MessageStatus::Active,
            run_count: 0,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    /// Recurring message every `interval_minutes`, starting at
    /// `first_run_at` (or the next tick when None).
    pub fn recurring(
        owner_id: &str,
        message: &str,
        first_run_at: Option<DateTime<Utc>>,
        interval_minutes: u32,
    ) -> Self {
        Self {
            id: short_id("msg"),
            owner_id: owner_id.to_string(),
            message: message.to_string(),
            run_at: first_run_at,
            repeat: true,
            repeat_interval_minutes: interval_minutes,
            status: MessageStatus::Active,
            run_count: 0,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Periodic delivery pass over due messages.
pub struct MessageDispatcher {
    store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
}

impl MessageDispatcher {
    pub fn new(store: Arc<dyn MessageStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Deliver everything due. Returns the number of deliveries made.
    pub async fn tick(&self) -> usize {
        let now = Utc::now();
        let due = match self.store.due_messages(now) {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("Failed to load due messages: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for message in due {
            let text = format!("📬 *Scheduled message*\n\n{}", message.message);
            if let Err(e) = self.notifier.notify(&message.owner_id, &text).await {
                // Stays active; retried on the next tick.
                tracing::warn!("⚠️ Failed to deliver scheduled message {}: {e}", message.id);
                continue;
            }

            let update = if message.repeat && message.repeat_interval_minutes > 0 {
                let next = now + Duration::minutes(message.repeat_interval_minutes as i64);
                self.store.reschedule(&message.id, now, next)
            } else {
                self.store.mark_delivered(&message.id, now)
            };
            if let Err(e) = update {
                tracing::error!("Failed to update scheduled message {}: {e}", message.id);
                continue;
            }

            tracing::info!("📬 Delivered scheduled message {} to {}", message.id, message.owner_id);
            delivered += 1;
        }
        delivered
    }
}

/// Spawn the dispatcher loop as a background tokio task.
pub fn spawn_message_dispatcher(
    dispatcher: Arc<MessageDispatcher>,
    check_interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("📮 Message dispatcher started (check every {check_interval_secs}s)");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));
        loop {
            interval.tick().await;
            dispatcher.tick().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AutomationDb;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use weft_core::error::{Result, WeftError};

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, owner_id: &str, text: &str) -> Result<()> {
            if self.fail {
                return Err(WeftError::Notify("channel down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((owner_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn temp_store(name: &str) -> (std::path::PathBuf, Arc<AutomationDb>) {
        let dir = std::env::temp_dir().join(format!("weft-msg-test-{name}"));
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("test.db");
        std::fs::remove_file(&path).ok();
        (dir, Arc::new(AutomationDb::open(&path).unwrap()))
    }

    #[tokio::test]
    async fn test_one_shot_delivered_exactly_once() {
        let (dir, store) = temp_store("one-shot");
        let notifier = RecordingNotifier::ok();
        let dispatcher = MessageDispatcher::new(store.clone(), notifier.clone());

        let msg = ScheduledMessage::once(
            "tg:7",
            "check the deploy",
            Utc::now() - Duration::minutes(2),
        );
        store.create_message(&msg).unwrap();

        assert_eq!(dispatcher.tick().await, 1);
        assert_eq!(notifier.count(), 1);

        let stored = &store.messages_for_owner("tg:7").unwrap()[0];
        assert_eq!(stored.status, MessageStatus::Delivered);
        assert_eq!(stored.run_count, 1);

        // A second tick must not re-deliver.
        assert_eq!(dispatcher.tick().await, 0);
        assert_eq!(notifier.count(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_recurring_advances_and_stays_active() {
        let (dir, store) = temp_store("recurring");
        let notifier = RecordingNotifier::ok();
        let dispatcher = MessageDispatcher::new(store.clone(), notifier.clone());

        let msg = ScheduledMessage::recurring(
            "tg:7",
            "stretch!",
            Some(Utc::now() - Duration::minutes(1)),
            60,
        );
        store.create_message(&msg).unwrap();

        let before = Utc::now();
        assert_eq!(dispatcher.tick().await, 1);

        let stored = &store.messages_for_owner("tg:7").unwrap()[0];
        assert_eq!(stored.status, MessageStatus::Active);
        assert_eq!(stored.run_count, 1);
        let next = stored.run_at.unwrap();
        assert!(next >= before + Duration::minutes(60));
        assert!(next <= Utc::now() + Duration::minutes(60));

        // Rescheduled into the future: nothing due right now.
        assert_eq!(dispatcher.tick().await, 0);
        assert_eq!(notifier.count(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_message_active() {
        let (dir, store) = temp_store("fail");
        let notifier = RecordingNotifier::failing();
        let dispatcher = MessageDispatcher::new(store.clone(), notifier);

        let msg =
            ScheduledMessage::once("tg:7", "important", Utc::now() - Duration::minutes(1));
        store.create_message(&msg).unwrap();

        assert_eq!(dispatcher.tick().await, 0);
        let stored = &store.messages_for_owner("tg:7").unwrap()[0];
        assert_eq!(stored.status, MessageStatus::Active);
        assert_eq!(stored.run_count, 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
