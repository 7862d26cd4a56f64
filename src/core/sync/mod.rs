mod snapshot;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::events::{EventBus, topics};
use crate::core::notify::NotificationCenter;
use crate::core::notify::types::NotificationRequest;
use crate::core::remote::RemoteGateway;
use crate::core::store::types::Severity;
use crate::core::store::{DataStore, slots};
use crate::storage::KvStore;

/// How long a finished cycle shows `Success` before settling back to idle.
const SUCCESS_LINGER_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Success,
    Error,
    Offline,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        }
    }
}

/// A mutation captured while disconnected, waiting for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineChange {
    pub payload: Value,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub status: SyncStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub pending: usize,
    pub last_error: Option<String>,
}

struct SyncInner {
    status: SyncStatus,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    queue: Vec<OfflineChange>,
}

/// Tracks connectivity, runs the periodic reconciliation cycle against the
/// simulated remote, queues changes made while offline, and replays them
/// FIFO on the next successful cycle. Only one cycle is ever in flight.
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct SyncManager {
    store: Arc<DataStore>,
    kv: Arc<dyn KvStore>,
    bus: Arc<EventBus>,
    remote: Arc<dyn RemoteGateway>,
    notify: NotificationCenter,
    inner: Arc<Mutex<SyncInner>>,
    online: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
    retries: Arc<AtomicU32>,
    loop_handle: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl SyncManager {
    pub async fn new(
        store: Arc<DataStore>,
        kv: Arc<dyn KvStore>,
        bus: Arc<EventBus>,
        remote: Arc<dyn RemoteGateway>,
        notify: NotificationCenter,
    ) -> Self {
        let queue: Vec<OfflineChange> = match kv.get(slots::OFFLINE_QUEUE).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(
                    "offline queue slot holds corrupt data, starting empty: {}",
                    e
                );
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to read offline queue, starting empty: {}", e);
                Vec::new()
            }
        };
        Self {
            store,
            kv,
            bus,
            remote,
            notify,
            inner: Arc::new(Mutex::new(SyncInner {
                status: SyncStatus::Idle,
                last_success: None,
                last_error: None,
                queue,
            })),
            online: Arc::new(AtomicBool::new(true)),
            in_flight: Arc::new(AtomicBool::new(false)),
            retries: Arc::new(AtomicU32::new(0)),
            loop_handle: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Capture store mutations into the offline queue while disconnected.
    pub fn attach(&self) {
        let mgr = self.clone();
        self.bus.subscribe(topics::STORE_CHANGED, move |payload| {
            if mgr.online.load(Ordering::SeqCst) {
                return;
            }
            let mgr = mgr.clone();
            let change = payload.clone();
            tokio::spawn(async move {
                if let Err(e) = mgr.queue_change(change).await {
                    warn!("failed to queue offline change: {}", e);
                }
            });
        });
    }

    /// Spawn the periodic reconciliation loop. Interval and enablement come
    /// from settings, re-read every tick so changes apply without restart.
    pub fn start(&self) {
        let mgr = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let settings = mgr.store.sync_settings().await;
                tokio::time::sleep(Duration::from_millis(settings.sync_interval_ms)).await;
                if !settings.auto_sync || !mgr.online.load(Ordering::SeqCst) {
                    continue;
                }
                let _ = mgr.reconcile().await;
            }
        });
        if let Some(previous) = self.loop_handle.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Flip connectivity. Going offline preempts whatever the cycle was
    /// doing; coming back clears to idle (never success), resets retry
    /// bookkeeping, and immediately attempts one reconciliation.
    pub async fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }
        self.bus
            .publish(topics::CONNECTIVITY, &json!({ "online": online }));
        if online {
            info!("connectivity restored");
            self.retries.store(0, Ordering::SeqCst);
            self.set_status(SyncStatus::Idle, None).await;
            let _ = self.reconcile().await;
        } else {
            info!("connectivity lost, queueing mutations");
            self.set_status(SyncStatus::Offline, None).await;
        }
    }

    /// One reconciliation cycle. Returns Ok(false) when skipped because a
    /// cycle is already in flight or the manager is offline.
    pub async fn reconcile(&self) -> Result<bool> {
        if !self.online.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("reconciliation already in flight, skipping");
            return Ok(false);
        }
        self.set_status(SyncStatus::Syncing, None).await;

        let outcome = self.remote.round_trip("reconcile").await;

        // Connectivity may have dropped mid-flight; offline wins.
        if !self.online.load(Ordering::SeqCst) {
            self.in_flight.store(false, Ordering::SeqCst);
            return Ok(false);
        }

        match outcome {
            Ok(()) => {
                let replayed = self.drain_queue().await;
                {
                    let mut inner = self.inner.lock().await;
                    inner.last_success = Some(Utc::now());
                    inner.last_error = None;
                }
                self.retries.store(0, Ordering::SeqCst);
                if let Err(e) = self.store.synchronize().await {
                    warn!("post-reconciliation store sync failed: {}", e);
                }
                self.set_status(SyncStatus::Success, None).await;
                if replayed > 0 {
                    info!("reconciliation replayed {} offline change(s)", replayed);
                }
                self.in_flight.store(false, Ordering::SeqCst);
                self.schedule_idle_revert();
                Ok(true)
            }
            Err(e) => {
                self.set_status(SyncStatus::Error, Some(e.to_string())).await;
                self.in_flight.store(false, Ordering::SeqCst);
                self.schedule_retry().await;
                Err(e)
            }
        }
    }

    /// Append a change to the durable offline queue.
    pub async fn queue_change(&self, payload: Value) -> Result<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            inner.queue.push(OfflineChange {
                payload,
                queued_at: Utc::now(),
            });
            inner.queue.clone()
        };
        self.persist_queue(&snapshot).await;
        self.publish_state().await;
        Ok(())
    }

    pub async fn pending_changes(&self) -> Vec<OfflineChange> {
        self.inner.lock().await.queue.clone()
    }

    pub async fn state(&self) -> SyncState {
        let inner = self.inner.lock().await;
        SyncState {
            status: inner.status,
            last_success: inner.last_success,
            pending: inner.queue.len(),
            last_error: inner.last_error.clone(),
        }
    }

    async fn drain_queue(&self) -> usize {
        let drained: Vec<OfflineChange> = {
            let mut inner = self.inner.lock().await;
            std::mem::take(&mut inner.queue)
        };
        for change in &drained {
            // Each entry rides the round trip that just succeeded; announce
            // replay in enqueue order.
            self.bus.publish(
                topics::SYNC_REPLAYED,
                &json!({
                    "payload": change.payload,
                    "queued_at": change.queued_at.to_rfc3339(),
                }),
            );
        }
        self.persist_queue(&[]).await;
        drained.len()
    }

    async fn persist_queue(&self, queue: &[OfflineChange]) {
        let serialized = match serde_json::to_string(queue) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to serialize offline queue: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(slots::OFFLINE_QUEUE, &serialized).await {
            warn!("failed to persist offline queue: {}", e);
        }
    }

    fn schedule_retry(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let settings = self.store.sync_settings().await;
            let current = self.retries.load(Ordering::SeqCst);
            if current >= settings.max_retries {
                warn!(
                    "reconciliation failed after {} automatic retries, waiting for the next cycle",
                    settings.max_retries
                );
                self.surface_retry_notification().await;
                return;
            }
            let attempt = self.retries.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "scheduling reconciliation retry {}/{} in {}ms",
                attempt, settings.max_retries, settings.retry_interval_ms
            );
            let mgr = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(settings.retry_interval_ms)).await;
                let _ = mgr.reconcile().await;
            });
        })
    }

    async fn surface_retry_notification(&self) {
        let mgr = self.clone();
        let request = NotificationRequest::new(
            "Sync failed",
            "Automatic retries are exhausted. The next cycle will try again.",
        )
        .severity(Severity::Error)
        .offline_safe(true)
        .action("Retry", move || {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                mgr.retries.store(0, Ordering::SeqCst);
                let _ = mgr.reconcile().await;
            });
        });
        if let Err(e) = self.notify.show(request).await {
            warn!("failed to surface sync failure notification: {}", e);
        }
    }

    fn schedule_idle_revert(&self) {
        let mgr = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(SUCCESS_LINGER_MS)).await;
            let revert = {
                let mut inner = mgr.inner.lock().await;
                if inner.status == SyncStatus::Success {
                    inner.status = SyncStatus::Idle;
                    true
                } else {
                    false
                }
            };
            if revert {
                mgr.publish_state().await;
            }
        });
    }

    async fn set_status(&self, status: SyncStatus, error: Option<String>) {
        {
            let mut inner = self.inner.lock().await;
            inner.status = status;
            if error.is_some() {
                inner.last_error = error;
            }
        }
        self.publish_state().await;
    }

    async fn publish_state(&self) {
        let state = self.state().await;
        self.bus.publish(
            topics::SYNC_STATUS,
            &json!({
                "status": state.status.as_str(),
                "pending": state.pending,
                "last_success": state.last_success.map(|t| t.to_rfc3339()),
                "error": state.last_error,
            }),
        );
    }
}
