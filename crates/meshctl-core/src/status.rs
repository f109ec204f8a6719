// ── Per-instance network status ──

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;
use crate::model::NetworkStatus;

/// Shared, observable `NetworkStatus` for one controller instance.
#[derive(Debug, Clone)]
pub(crate) struct StatusCell {
    tx: Arc<watch::Sender<NetworkStatus>>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(NetworkStatus::NotStarted);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn get(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }

    /// Atomically move `NotStarted → Starting`.
    pub(crate) fn begin_start(&self) -> Result<(), CoreError> {
        let mut observed = NetworkStatus::NotStarted;
        let moved = self.tx.send_if_modified(|status| {
            observed = *status;
            if *status == NetworkStatus::NotStarted {
                *status = NetworkStatus::Starting;
                true
            } else {
                false
            }
        });
        if moved {
            debug!("network status: not_started -> starting");
            Ok(())
        } else {
            Err(CoreError::AlreadyStarted {
                status: observed.to_string(),
            })
        }
    }

    /// Move forward to `next` if that is a legal step. Returns whether the
    /// status changed.
    pub(crate) fn advance(&self, next: NetworkStatus) -> bool {
        self.tx.send_if_modified(|status| {
            if status.can_advance_to(next) {
                debug!(from = %status, to = %next, "network status");
                *status = next;
                true
            } else {
                false
            }
        })
    }

    /// Unconditional transition, for stop and start-failure rollback.
    pub(crate) fn set(&self, next: NetworkStatus) {
        self.tx.send_if_modified(|status| {
            let changed = *status != next;
            *status = next;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_start_is_exclusive() {
        let cell = StatusCell::new();
        assert!(cell.begin_start().is_ok());
        assert!(matches!(
            cell.begin_start(),
            Err(CoreError::AlreadyStarted { ref status }) if status == "starting"
        ));
        assert_eq!(cell.get(), NetworkStatus::Starting);
    }

    #[test]
    fn advance_never_moves_backwards() {
        let cell = StatusCell::new();
        cell.set(NetworkStatus::Ready);
        assert!(!cell.advance(NetworkStatus::Started));
        assert_eq!(cell.get(), NetworkStatus::Ready);

        assert!(cell.advance(NetworkStatus::Resetting));
        assert!(cell.advance(NetworkStatus::Starting));
        assert_eq!(cell.get(), NetworkStatus::Starting);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();
        cell.begin_start().ok();
        rx.changed().await.ok();
        assert_eq!(*rx.borrow_and_update(), NetworkStatus::Starting);
    }
}
