// ── Timeout-bounded lifecycle protocols ──
//
// Network start, node inclusion and node exclusion all ask the hardware to
// do something and then wait for the notification feed to confirm it. Each
// wait is a small state machine driven by watch-channel wakeups and an
// absolute deadline on the tokio clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::driver::MeshDriver;
use crate::error::CoreError;
use crate::model::{
    NetworkStatus, NodeId, NodeRecord, OperationKind, PendingOperation, StartOutcome,
};
use crate::status::StatusCell;
use crate::store::{NodeRegistry, Sentinel};

pub(crate) struct LifecycleCoordinator {
    driver: Arc<dyn MeshDriver>,
    registry: Arc<NodeRegistry>,
    status: StatusCell,
    pending: DashMap<OperationKind, PendingOperation>,
    generation: AtomicU64,
    network_ready_timeout: Duration,
    operation_timeout: Duration,
    poll_interval: Duration,
}

/// Removes its pending-operation entry on drop unless a newer wait of the
/// same kind replaced it.
struct PendingGuard<'a> {
    pending: &'a DashMap<OperationKind, PendingOperation>,
    kind: OperationKind,
    generation: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .remove_if(&self.kind, |_, op| op.generation == self.generation);
    }
}

impl LifecycleCoordinator {
    pub(crate) fn new(
        driver: Arc<dyn MeshDriver>,
        registry: Arc<NodeRegistry>,
        status: StatusCell,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            driver,
            registry,
            status,
            pending: DashMap::new(),
            generation: AtomicU64::new(0),
            network_ready_timeout: config.network_ready_timeout,
            operation_timeout: config.operation_timeout,
            poll_interval: config.poll_interval,
        }
    }

    // ── Network start ────────────────────────────────────────────────

    /// `NotStarted → Starting → {Ready, TimedOutButRunning}`.
    pub(crate) async fn start_network(&self) -> Result<StartOutcome, CoreError> {
        self.status.begin_start()?;

        if let Err(e) = self.driver.start() {
            self.status.set(NetworkStatus::NotStarted);
            return Err(CoreError::rejected("network start", &e));
        }

        let started = Instant::now();
        let deadline = started + self.network_ready_timeout;
        let _guard = self.track(OperationKind::AwaitNetworkReady, deadline, None);
        info!(
            timeout_secs = self.network_ready_timeout.as_secs(),
            "network starting, waiting for readiness"
        );

        let mut status_rx = self.status.subscribe();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u32;
        let mut driver_ready = false;

        loop {
            tokio::select! {
                biased;
                () = tokio::time::sleep_until(deadline) => {
                    let waited = started.elapsed();
                    warn!(
                        waited_ms = waited.as_millis(),
                        nodes = self.driver.nodes_count(),
                        "network not ready before the deadline, continuing anyway"
                    );
                    return Ok(StartOutcome::TimedOutButRunning { waited });
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        return Err(CoreError::Internal("status channel closed".into()));
                    }
                    if *status_rx.borrow_and_update() == NetworkStatus::Ready {
                        return Ok(self.ready_outcome(started, polls));
                    }
                }
                _ = ticker.tick(), if !driver_ready => {
                    polls += 1;
                    if self.driver.is_ready() {
                        // The registry is only usable once the dispatcher
                        // has applied NetworkReady; keep waiting on status.
                        driver_ready = true;
                        if *status_rx.borrow_and_update() == NetworkStatus::Ready {
                            return Ok(self.ready_outcome(started, polls));
                        }
                        debug!(polls, "driver reports ready, waiting for the ready notification");
                    } else {
                        debug!(polls, "network not ready yet");
                    }
                }
            }
        }
    }

    fn ready_outcome(&self, started: Instant, polls: u32) -> StartOutcome {
        let after = started.elapsed();
        info!(
            after_ms = after.as_millis(),
            polls,
            nodes = self.driver.nodes_count(),
            "network ready"
        );
        StartOutcome::Ready { after, polls }
    }

    // ── Node inclusion / exclusion ───────────────────────────────────

    pub(crate) async fn add_node(&self) -> Result<Arc<NodeRecord>, CoreError> {
        self.await_membership_change(OperationKind::AwaitNodeAdded).await
    }

    pub(crate) async fn remove_node(&self) -> Result<Arc<NodeRecord>, CoreError> {
        self.await_membership_change(OperationKind::AwaitNodeRemoved).await
    }

    /// `Idle → AwaitingPhysicalAction → {Completed, TimedOut}`.
    ///
    /// Completes on the first published record that is not the one observed
    /// before the command was issued. There is no correlation token, so any
    /// inclusion (or exclusion) that lands during the wait is attributed to
    /// it.
    async fn await_membership_change(
        &self,
        kind: OperationKind,
    ) -> Result<Arc<NodeRecord>, CoreError> {
        if !self.status.get().is_running() {
            return Err(CoreError::NetworkDown);
        }

        let mut rx = match kind {
            OperationKind::AwaitNodeRemoved => self.registry.subscribe_removed(),
            _ => self.registry.subscribe_added(),
        };
        let sentinel: Sentinel = rx.borrow_and_update().clone();
        let deadline = Instant::now() + self.operation_timeout;
        let _guard = self.track(kind, deadline, sentinel.as_ref().map(|r| r.id));

        let submitted = match kind {
            OperationKind::AwaitNodeRemoved => self.driver.remove_node(),
            _ => self.driver.add_node(),
        };
        match submitted {
            Ok(true) => {}
            Ok(false) => return Err(CoreError::refused(kind.verb())),
            Err(e) => return Err(CoreError::rejected(kind.verb(), &e)),
        }
        info!(
            operation = kind.verb(),
            timeout_secs = self.operation_timeout.as_secs(),
            "waiting for physical action on the node"
        );

        match wait_for_change(&mut rx, sentinel.as_ref(), deadline).await {
            WaitResult::Changed(record) => {
                info!(operation = kind.verb(), node = %record.id, "physical action completed");
                Ok(record)
            }
            WaitResult::Closed => Err(CoreError::Internal("registry channel closed".into())),
            WaitResult::TimedOut => {
                if let Err(e) = self.driver.cancel_command() {
                    warn!(error = %e, operation = kind.verb(), "cancel command failed");
                }
                warn!(
                    operation = kind.verb(),
                    timeout_secs = self.operation_timeout.as_secs(),
                    "no physical action before the deadline, command cancelled"
                );
                Err(CoreError::Timeout {
                    operation: kind.verb().to_owned(),
                    timeout_secs: self.operation_timeout.as_secs(),
                })
            }
        }
    }

    // ── Reset / stop ─────────────────────────────────────────────────

    /// The only refusal is a non-empty network without `force`; whether a
    /// stopped controller can be reset is the driver's call.
    pub(crate) fn hard_reset(&self, force: bool) -> Result<NetworkStatus, CoreError> {
        let nodes = self.driver.nodes_count();
        if nodes > 1 {
            if !force {
                return Err(CoreError::NetworkNotEmpty { nodes: nodes - 1 });
            }
            warn!(nodes, "forcing hard reset on a network with included nodes");
        }
        self.driver
            .hard_reset()
            .map_err(|e| CoreError::rejected("hard reset", &e))?;
        info!("controller hard reset issued");
        Ok(self.status.get())
    }

    pub(crate) fn soft_reset(&self) -> Result<NetworkStatus, CoreError> {
        self.driver
            .soft_reset()
            .map_err(|e| CoreError::rejected("soft reset", &e))?;
        info!("controller soft reset issued");
        Ok(self.status.get())
    }

    /// Stop the driver and forget all node state. The instance can be
    /// started again afterwards.
    pub(crate) fn stop_network(&self) -> Result<NetworkStatus, CoreError> {
        self.driver
            .stop()
            .map_err(|e| CoreError::rejected("network stop", &e))?;
        self.status.set(NetworkStatus::NotStarted);
        self.registry.clear();
        info!("network stopped");
        Ok(NetworkStatus::NotStarted)
    }

    // ── Introspection ────────────────────────────────────────────────

    /// Outstanding waits, earliest deadline first.
    pub(crate) fn pending_operations(&self) -> Vec<PendingOperation> {
        let mut ops: Vec<PendingOperation> = self.pending.iter().map(|e| *e.value()).collect();
        ops.sort_by_key(|op| op.deadline);
        ops
    }

    fn track(
        &self,
        kind: OperationKind,
        deadline: Instant,
        sentinel: Option<NodeId>,
    ) -> PendingGuard<'_> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = self.pending.insert(
            kind,
            PendingOperation {
                kind,
                deadline,
                sentinel,
                generation,
            },
        ) {
            debug!(operation = %kind, previous = previous.generation, "pending wait overwritten");
        }
        PendingGuard {
            pending: &self.pending,
            kind,
            generation,
        }
    }
}

enum WaitResult {
    Changed(Arc<NodeRecord>),
    TimedOut,
    Closed,
}

/// Wait until `rx` publishes a record other than `sentinel`, by reference.
async fn wait_for_change(
    rx: &mut watch::Receiver<Sentinel>,
    sentinel: Option<&Arc<NodeRecord>>,
    deadline: Instant,
) -> WaitResult {
    loop {
        match tokio::time::timeout_at(deadline, rx.changed()).await {
            Err(_) => return WaitResult::TimedOut,
            Ok(Err(_)) => return WaitResult::Closed,
            Ok(Ok(())) => {
                let current = rx.borrow_and_update().clone();
                if let Some(record) = current {
                    let same = sentinel.is_some_and(|s| Arc::ptr_eq(s, &record));
                    if !same {
                        return WaitResult::Changed(record);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_ignores_republished_sentinel() {
        let (tx, mut rx) = watch::channel::<Sentinel>(None);
        let sentinel = Arc::new(NodeRecord::new(NodeId::new(2)));
        tx.send_replace(Some(Arc::clone(&sentinel)));
        rx.borrow_and_update();

        let deadline = Instant::now() + Duration::from_secs(5);
        let waiter = tokio::spawn(async move {
            matches!(
                wait_for_change(&mut rx, Some(&sentinel), deadline).await,
                WaitResult::TimedOut
            )
        });

        // Same reference again: not a change.
        tx.send_modify(|_| {});
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_completes_on_new_record_with_same_id() {
        let (tx, mut rx) = watch::channel::<Sentinel>(None);
        let sentinel = Arc::new(NodeRecord::new(NodeId::new(5)));
        tx.send_replace(Some(Arc::clone(&sentinel)));
        rx.borrow_and_update();

        let fresh = Arc::new(NodeRecord::new(NodeId::new(5)));
        tx.send_replace(Some(Arc::clone(&fresh)));

        let deadline = Instant::now() + Duration::from_secs(5);
        match wait_for_change(&mut rx, Some(&sentinel), deadline).await {
            WaitResult::Changed(record) => assert!(Arc::ptr_eq(&record, &fresh)),
            _ => panic!("expected a change"),
        }
    }
}
