use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;

use super::{ChannelNotifier, Notification};

/// Bounded, in-memory history of recent notifications.
#[derive(Clone)]
pub struct NotificationLog {
    entries: Arc<RwLock<VecDeque<Notification>>>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, notification: Notification) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification);
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        match self.entries.read() {
            Ok(entries) => entries.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background task that moves notifications from the channel into a log.
pub struct NotificationWriter {
    rx: mpsc::Receiver<Notification>,
    log: NotificationLog,
}

impl NotificationWriter {
    pub fn new(rx: mpsc::Receiver<Notification>, log: NotificationLog) -> Self {
        Self { rx, log }
    }

    /// Run until every sender is dropped. Spawn this as a background task.
    pub async fn run(mut self) {
        tracing::debug!("Notification writer started");

        while let Some(notification) = self.rx.recv().await {
            tracing::info!(level = ?notification.level, "{}", notification.message);
            self.log.push(notification);
        }

        tracing::debug!("Notification writer shutting down");
    }
}

/// Create a notifier, the log it feeds, and the writer that connects them.
///
/// Spawn the writer with `tokio::spawn(writer.run())`.
pub fn create_notification_system(
    history: usize,
    buffer_size: usize,
    default_duration: Duration,
) -> (ChannelNotifier, NotificationLog, NotificationWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let notifier = ChannelNotifier::new(tx).with_default_duration(default_duration);
    let log = NotificationLog::new(history);
    let writer = NotificationWriter::new(rx, log.clone());
    (notifier, log, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;

    #[test]
    fn test_log_is_bounded_and_newest_first() {
        let log = NotificationLog::new(2);
        log.push(Notification::info("a"));
        log.push(Notification::info("b"));
        log.push(Notification::info("c"));

        let messages: Vec<String> = log.recent(10).into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["c", "b"]);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_writer_drains_channel_into_log() {
        let (notifier, log, writer) =
            create_notification_system(10, 10, Duration::from_millis(5000));
        let task = tokio::spawn(writer.run());

        notifier.notify(Notification::success("\"Game\" installed successfully!"));
        drop(notifier);
        task.await.unwrap();

        let recent = log.recent(5);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].duration_ms, Some(5000));
    }
}
