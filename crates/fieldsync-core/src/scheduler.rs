//! Decides when a sync pass runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::network::NetworkState;
use crate::queue::{QueueManager, SyncSummary};
use crate::Result;

/// Why a pass was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    Reconnect,
    Interval,
    Demand,
}

/// Background trigger loop for one [`QueueManager`].
pub struct SyncScheduler;

impl SyncScheduler {
    /// Start the loop on the current tokio runtime.
    ///
    /// Passes are spawned as independent tasks and may overlap; the queue
    /// manager's single-flight guard turns the overlapping ones into no-ops.
    pub fn spawn(queue: Arc<QueueManager>, interval: Duration) -> SchedulerHandle {
        let demand = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut network = queue.network().subscribe();
        let initial = *network.borrow_and_update();

        let task = tokio::spawn(run_loop(
            queue.clone(),
            network,
            initial,
            interval,
            demand.clone(),
            shutdown_rx,
        ));

        SchedulerHandle {
            queue,
            demand,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Control handle returned by [`SyncScheduler::spawn`]. Dropping it also
/// stops the loop.
pub struct SchedulerHandle {
    queue: Arc<QueueManager>,
    demand: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to start a pass as soon as possible.
    pub fn request_sync(&self) {
        self.demand.notify_one();
    }

    /// Run a pass inline and return its summary.
    pub async fn sync_now(&self) -> Result<SyncSummary> {
        self.queue.sync_all().await
    }

    /// Stop the trigger loop. A pass already running is left to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {error}");
        }
    }
}

async fn run_loop(
    queue: Arc<QueueManager>,
    mut network: watch::Receiver<NetworkState>,
    mut previous: NetworkState,
    interval: Duration,
    demand: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("Sync scheduler started (interval {}s)", interval.as_secs());
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => start_pass(&queue, Trigger::Interval),
            () = demand.notified() => start_pass(&queue, Trigger::Demand),
            changed = network.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *network.borrow_and_update();
                let reconnected = !previous.is_online() && current.is_online();
                previous = current;
                if reconnected && has_pending_work(&queue).await {
                    start_pass(&queue, Trigger::Reconnect);
                }
            }
        }
    }
    tracing::info!("Sync scheduler stopped");
}

async fn has_pending_work(queue: &QueueManager) -> bool {
    match queue.get_pending_counts().await {
        Ok(counts) => counts.total() > 0,
        Err(error) => {
            tracing::warn!("Failed to read pending counts after reconnect: {error}");
            false
        }
    }
}

fn start_pass(queue: &Arc<QueueManager>, trigger: Trigger) {
    let queue = queue.clone();
    tokio::spawn(async move {
        tracing::debug!("Starting sync pass ({trigger:?})");
        match queue.sync_all().await {
            Ok(summary) if summary.note.is_none() => {
                tracing::debug!("Sync pass ({trigger:?}) complete: {summary:?}");
            }
            Ok(summary) => tracing::debug!("Sync pass ({trigger:?}) skipped: {:?}", summary.note),
            Err(error) => tracing::warn!("Sync pass ({trigger:?}) failed: {error}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DraftInput, Payload, SyncStatus};
    use crate::network::{NetworkMonitor, StaticProbe};
    use crate::remote::MemoryBackend;
    use crate::services::LocalStore;

    struct Harness {
        probe: Arc<StaticProbe>,
        backend: MemoryBackend,
        queue: Arc<QueueManager>,
    }

    async fn harness(online: bool) -> Harness {
        let probe = Arc::new(StaticProbe::new(online));
        let network = Arc::new(NetworkMonitor::new(probe.clone(), Duration::from_millis(10)));
        network.check_now().await;
        let backend = MemoryBackend::new();
        let store = LocalStore::open_in_memory().await.unwrap();
        let queue = Arc::new(QueueManager::new(store, backend.backend(), network));
        Harness {
            probe,
            backend,
            queue,
        }
    }

    async fn save(queue: &QueueManager, id: &str) {
        let input = DraftInput::new(id.parse().unwrap(), "case-1", Payload::new()).unwrap();
        queue.save_draft(&input).await.unwrap();
    }

    async fn wait_until_synced(queue: &QueueManager, id: &str) -> bool {
        for _ in 0..100 {
            let draft = queue.get_draft(&id.parse().unwrap()).await.unwrap().unwrap();
            if draft.status() == SyncStatus::Synced {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn demand_triggers_pass() {
        let h = harness(true).await;
        save(&h.queue, "d1").await;

        let handle = SyncScheduler::spawn(h.queue.clone(), Duration::from_secs(3600));
        handle.request_sync();

        assert!(wait_until_synced(&h.queue, "d1").await);
        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_triggers_pass_when_work_is_pending() {
        let h = harness(false).await;
        save(&h.queue, "d1").await;

        let handle = SyncScheduler::spawn(h.queue.clone(), Duration::from_secs(3600));
        h.probe.set_online(true);
        h.queue.network().check_now().await;

        assert!(wait_until_synced(&h.queue, "d1").await);
        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_without_pending_work_makes_no_calls() {
        let h = harness(false).await;

        let handle = SyncScheduler::spawn(h.queue.clone(), Duration::from_secs(3600));
        h.probe.set_online(true);
        h.queue.network().check_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.backend.call_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interval_acts_as_safety_net() {
        let h = harness(true).await;
        save(&h.queue, "d1").await;

        let handle = SyncScheduler::spawn(h.queue.clone(), Duration::from_millis(20));

        assert!(wait_until_synced(&h.queue, "d1").await);
        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_now_returns_summary() {
        let h = harness(true).await;
        save(&h.queue, "d1").await;

        let handle = SyncScheduler::spawn(h.queue.clone(), Duration::from_secs(3600));
        let summary = handle.sync_now().await.unwrap();

        assert_eq!(summary.synced_drafts, 1);
        handle.shutdown().await;
    }
}
