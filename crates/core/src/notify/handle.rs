use std::time::Duration;

use tokio::sync::mpsc;

use super::{Notification, Notifier};

/// Forwards notifications into a channel.
///
/// Cheap to clone. A full or closed channel drops the notification and logs
/// the failure; the sender is never blocked.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
    default_duration: Option<Duration>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self {
            tx,
            default_duration: None,
        }
    }

    /// Duration applied to notifications that do not set their own.
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = Some(duration);
        self
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, mut notification: Notification) {
        if notification.duration_ms.is_none() {
            notification.duration_ms = self.default_duration.map(|d| d.as_millis() as u64);
        }
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!("Failed to deliver notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;

    #[tokio::test]
    async fn test_forwards_with_default_duration() {
        let (tx, mut rx) = mpsc::channel(4);
        let notifier = ChannelNotifier::new(tx).with_default_duration(Duration::from_secs(5));

        notifier.notify(Notification::success("done"));
        notifier.notify(Notification::error("bad").with_duration(Duration::from_secs(1)));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NotificationLevel::Success);
        assert_eq!(first.duration_ms, Some(5000));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.duration_ms, Some(1000));
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let notifier = ChannelNotifier::new(tx);

        notifier.notify(Notification::info("one"));
        notifier.notify(Notification::info("two"));

        assert_eq!(rx.recv().await.unwrap().message, "one");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        ChannelNotifier::new(tx).notify(Notification::info("nobody listening"));
    }
}
