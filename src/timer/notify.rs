// src/timer/notify.rs — User-visible timer notifications (toasts)

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const OUTBOX_CAPACITY: usize = 64;

/// Which remote mutation a sync notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Save,
    Delete,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Save => f.write_str("save"),
            SyncOperation::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Saved {
        task_id: String,
        task_title: Option<String>,
        seconds: u64,
        formatted: String,
    },
    SyncFailed {
        task_id: String,
        operation: SyncOperation,
        error: String,
        will_retry: bool,
    },
    Reverted {
        task_id: String,
        operation: SyncOperation,
        seconds: u64,
    },
}

impl Notification {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notification::Saved { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Notification::Saved {
                task_id,
                task_title,
                formatted,
                ..
            } => format!(
                "Saved {} on \"{}\"",
                formatted,
                task_title.as_deref().unwrap_or(task_id)
            ),
            Notification::SyncFailed {
                operation,
                error,
                will_retry: true,
                ..
            } => format!("Could not {operation} time record ({error}); will retry"),
            Notification::SyncFailed {
                operation, error, ..
            } => format!("Could not {operation} time record ({error})"),
            Notification::Reverted {
                operation: SyncOperation::Save,
                seconds,
                ..
            } => format!(
                "Gave up saving {}; removed it from the list",
                super::format::format_duration(*seconds)
            ),
            Notification::Reverted {
                operation: SyncOperation::Delete,
                seconds,
                ..
            } => format!(
                "Gave up deleting {}; restored it to the list",
                super::format::format_duration(*seconds)
            ),
        }
    }
}

/// Bounded queue of notifications waiting for the presentation layer.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Notification>,
}

impl Outbox {
    pub fn push(&mut self, notification: Notification) {
        if notification.is_error() {
            tracing::warn!("{}", notification.message());
        } else {
            tracing::info!("{}", notification.message());
        }
        if self.queue.len() == OUTBOX_CAPACITY {
            self.queue.pop_front();
        }
        self.queue.push_back(notification);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(seconds: u64) -> Notification {
        Notification::Saved {
            task_id: "t1".into(),
            task_title: Some("Write report".into()),
            seconds,
            formatted: crate::timer::format::format_duration(seconds),
        }
    }

    #[test]
    fn test_saved_message_uses_title() {
        assert_eq!(saved(75).message(), "Saved 00:01:15 on \"Write report\"");
        assert!(!saved(75).is_error());
    }

    #[test]
    fn test_outbox_bounded() {
        let mut outbox = Outbox::default();
        for i in 0..(OUTBOX_CAPACITY as u64 + 5) {
            outbox.push(saved(i));
        }
        assert_eq!(outbox.len(), OUTBOX_CAPACITY);
        let drained = outbox.drain();
        assert_eq!(drained[0], saved(5));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_serialized_tag() {
        let n = Notification::Reverted {
            task_id: "t1".into(),
            operation: SyncOperation::Delete,
            seconds: 3,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "reverted");
        assert_eq!(json["operation"], "delete");
    }
}
