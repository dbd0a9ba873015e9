//! Timed, dismissible notifications.
//!
//! The alert channel is the wizard's user-facing feedback contract: a
//! fire-and-forget `notify` with a level, a message and an optional
//! lifetime. Transient alerts dismiss themselves when their lifetime
//! elapses; sticky alerts (no lifetime) stay until explicitly dismissed.
//! Rendering is the host's concern - the channel only owns the state and
//! the posted/dismissed signals.

use std::sync::Arc;
use std::time::Duration;

use drover_core::Signal;
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable identity of one posted alert.
    pub struct AlertId;
}

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Neutral information.
    Info,
    /// An operation completed.
    Success,
    /// Something needs user attention.
    Warning,
    /// An operation failed.
    Error,
}

/// One posted notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Severity.
    pub level: AlertLevel,
    /// Human-readable message.
    pub message: String,
    /// Lifetime; `None` means sticky until dismissed.
    pub duration: Option<Duration>,
}

struct ChannelInner {
    alerts: Mutex<SlotMap<AlertId, Alert>>,
    handle: tokio::runtime::Handle,
    posted: Signal<(AlertId, Alert)>,
    dismissed: Signal<AlertId>,
}

/// The wizard's notification sink.
///
/// Cheap to clone; all clones share the same alert table and signals, so
/// spawned tasks (submission dispatch, expiry timers) can post through
/// their own handle.
#[derive(Clone)]
pub struct AlertChannel {
    inner: Arc<ChannelInner>,
}

impl AlertChannel {
    /// Create a channel; expiry tasks are spawned onto `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                alerts: Mutex::new(SlotMap::with_key()),
                handle,
                posted: Signal::new(),
                dismissed: Signal::new(),
            }),
        }
    }

    /// Post a notification.
    ///
    /// With `Some(duration)` the alert dismisses itself after the duration
    /// elapses (if not dismissed earlier); with `None` it stays until
    /// [`dismiss`](Self::dismiss).
    pub fn notify(
        &self,
        level: AlertLevel,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> AlertId {
        let alert = Alert {
            level,
            message: message.into(),
            duration,
        };
        let id = self.inner.alerts.lock().insert(alert.clone());
        tracing::debug!(
            target: "drover::alert",
            ?level,
            message = %alert.message,
            sticky = duration.is_none(),
            "alert posted"
        );
        self.inner.posted.emit((id, alert));

        if let Some(duration) = duration {
            let channel = self.clone();
            self.inner.handle.spawn(async move {
                tokio::time::sleep(duration).await;
                // Dismiss only if still present; a manual dismissal wins.
                channel.dismiss(id);
            });
        }
        id
    }

    /// Dismiss an alert.
    ///
    /// Returns `false` if the alert was already gone.
    pub fn dismiss(&self, id: AlertId) -> bool {
        let removed = self.inner.alerts.lock().remove(id).is_some();
        if removed {
            self.inner.dismissed.emit(id);
        }
        removed
    }

    /// All currently visible alerts.
    pub fn active(&self) -> Vec<(AlertId, Alert)> {
        self.inner
            .alerts
            .lock()
            .iter()
            .map(|(id, a)| (id, a.clone()))
            .collect()
    }

    /// Number of currently visible alerts.
    pub fn active_count(&self) -> usize {
        self.inner.alerts.lock().len()
    }

    /// Signal emitted when an alert is posted.
    pub fn posted(&self) -> &Signal<(AlertId, Alert)> {
        &self.inner.posted
    }

    /// Signal emitted when an alert is dismissed.
    pub fn dismissed(&self) -> &Signal<AlertId> {
        &self.inner.dismissed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn channel() -> AlertChannel {
        AlertChannel::new(tokio::runtime::Handle::current())
    }

    #[tokio::test]
    async fn test_notify_and_dismiss() {
        let alerts = channel();
        let posted = Arc::new(AtomicU32::new(0));
        let posted_clone = posted.clone();
        alerts.posted().connect(move |_| {
            posted_clone.fetch_add(1, Ordering::SeqCst);
        });

        let id = alerts.notify(AlertLevel::Info, "saved", None);
        assert_eq!(posted.load(Ordering::SeqCst), 1);
        assert_eq!(alerts.active_count(), 1);

        assert!(alerts.dismiss(id));
        assert_eq!(alerts.active_count(), 0);
        assert!(!alerts.dismiss(id));
    }

    #[tokio::test]
    async fn test_transient_alert_expires() {
        let alerts = channel();
        let dismissed = Arc::new(AtomicU32::new(0));
        let dismissed_clone = dismissed.clone();
        alerts.dismissed().connect(move |_| {
            dismissed_clone.fetch_add(1, Ordering::SeqCst);
        });

        alerts.notify(
            AlertLevel::Error,
            "network hiccup",
            Some(Duration::from_millis(20)),
        );
        assert_eq!(alerts.active_count(), 1);

        for _ in 0..100 {
            if alerts.active_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(alerts.active_count(), 0);
        assert_eq!(dismissed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sticky_alert_does_not_expire() {
        let alerts = channel();
        alerts.notify(AlertLevel::Warning, "fields need attention", None);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(alerts.active_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_dismiss_beats_expiry() {
        let alerts = channel();
        let dismissed = Arc::new(AtomicU32::new(0));
        let dismissed_clone = dismissed.clone();
        alerts.dismissed().connect(move |_| {
            dismissed_clone.fetch_add(1, Ordering::SeqCst);
        });

        let id = alerts.notify(AlertLevel::Info, "done", Some(Duration::from_millis(30)));
        assert!(alerts.dismiss(id));

        tokio::time::sleep(Duration::from_millis(60)).await;
        // The expiry task found the alert already gone; only one dismissal
        assert_eq!(dismissed.load(Ordering::SeqCst), 1);
    }
}
