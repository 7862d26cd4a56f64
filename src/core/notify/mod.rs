pub mod types;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::core::events::{EventBus, topics};
use crate::core::store::DataStore;
use crate::core::store::types::{ChannelSettings, NotificationRecord};

use types::{
    ActionHandler, DeliveryTier, NotificationAction, NotificationRequest, PresentationContext,
};

/// Gap between items when draining the offline queue, so reconnects do not
/// burst every held notification at once.
const DRAIN_GAP_MS: u64 = 400;
/// Window the host gets to animate removal before a delivery disappears.
const EXIT_ANIMATION_MS: u64 = 220;

struct RuntimeAction {
    label: String,
    close_on_click: bool,
    fired: bool,
    handler: ActionHandler,
}

struct ActiveDelivery {
    tier: DeliveryTier,
    closing: bool,
}

struct QueuedDelivery {
    record: NotificationRecord,
    auto_close: Option<bool>,
}

/// Routes notification requests to exactly one delivery tier per call,
/// chosen by the current presentation context. Records always land in the
/// data store; rendering is announced on the bus and left to the host.
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct NotificationCenter {
    store: Arc<DataStore>,
    bus: Arc<EventBus>,
    context: Arc<std::sync::Mutex<PresentationContext>>,
    online: Arc<AtomicBool>,
    native_available: Arc<AtomicBool>,
    actions: Arc<Mutex<HashMap<String, Vec<RuntimeAction>>>>,
    active: Arc<Mutex<HashMap<String, ActiveDelivery>>>,
    pending: Arc<Mutex<VecDeque<QueuedDelivery>>>,
}

impl NotificationCenter {
    pub fn new(store: Arc<DataStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            context: Arc::new(std::sync::Mutex::new(PresentationContext::Expanded)),
            online: Arc::new(AtomicBool::new(true)),
            native_available: Arc::new(AtomicBool::new(true)),
            actions: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Follow connectivity announcements so queued notifications drain on
    /// reconnect without the host wiring anything by hand.
    pub fn attach(&self) {
        let center = self.clone();
        self.bus.subscribe(topics::CONNECTIVITY, move |payload| {
            let online = payload
                .get("online")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let center = center.clone();
            tokio::spawn(async move {
                center.set_online(online).await;
            });
        });
    }

    pub fn set_context(&self, context: PresentationContext) {
        *self.context.lock().unwrap() = context;
    }

    pub fn context(&self) -> PresentationContext {
        *self.context.lock().unwrap()
    }

    /// Whether the process may reach the OS-level notification channel.
    /// Hosts without one (headless, tests) switch it off.
    pub fn set_native_available(&self, available: bool) {
        self.native_available.store(available, Ordering::SeqCst);
    }

    pub async fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        if online {
            self.drain_pending().await;
        }
    }

    /// Record and route one notification. Returns its id. While offline,
    /// requests not marked offline-safe wait in the queue instead of
    /// rendering.
    pub async fn show(&self, request: NotificationRequest) -> Result<String> {
        let id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let record = NotificationRecord {
            id: id.clone(),
            title: request.title.clone(),
            message: request.message.clone(),
            severity: request.severity,
            created_at: Utc::now(),
            read: false,
            actions: request.actions.iter().map(NotificationAction::spec).collect(),
        };
        self.store.add_notification(record.clone()).await?;

        {
            let mut actions = self.actions.lock().await;
            actions.insert(
                id.clone(),
                request
                    .actions
                    .into_iter()
                    .map(|a| RuntimeAction {
                        label: a.label,
                        close_on_click: a.close_on_click,
                        fired: false,
                        handler: a.handler,
                    })
                    .collect(),
            );
        }

        if !self.online.load(Ordering::SeqCst) && !request.offline_safe {
            debug!("offline, queueing notification '{}'", id);
            self.pending.lock().await.push_back(QueuedDelivery {
                record,
                auto_close: request.auto_close,
            });
            return Ok(id);
        }

        self.deliver(&record, request.auto_close).await;
        Ok(id)
    }

    /// Mark the record read and retire any rendered representation after a
    /// brief exit window.
    pub async fn close(&self, id: &str) -> Result<()> {
        self.store.mark_notification_read(id).await?;
        self.pending.lock().await.retain(|q| q.record.id != id);

        let rendered = {
            let mut active = self.active.lock().await;
            match active.get_mut(id) {
                Some(delivery) if !delivery.closing => {
                    delivery.closing = true;
                    true
                }
                _ => false,
            }
        };
        if rendered {
            tokio::time::sleep(Duration::from_millis(EXIT_ANIMATION_MS)).await;
            self.active.lock().await.remove(id);
            self.bus
                .publish(topics::NOTIFY_CLOSED, &json!({ "id": id }));
        }
        self.actions.lock().await.remove(id);
        Ok(())
    }

    /// Fire an action's callback (at most once) and close the notification
    /// unless the action opts out.
    pub async fn invoke_action(&self, id: &str, label: &str) -> Result<()> {
        let close_after = {
            let mut actions = self.actions.lock().await;
            let Some(action) = actions
                .get_mut(id)
                .and_then(|list| list.iter_mut().find(|a| a.label == label))
            else {
                return Err(anyhow::anyhow!(
                    "no action '{}' on notification '{}'",
                    label,
                    id
                ));
            };
            if action.fired {
                false
            } else {
                action.fired = true;
                (action.handler)();
                action.close_on_click
            }
        };
        if close_after {
            self.close(id).await?;
        }
        Ok(())
    }

    /// Ids currently rendered, any tier.
    pub async fn active_deliveries(&self) -> Vec<(String, DeliveryTier)> {
        self.active
            .lock()
            .await
            .iter()
            .map(|(id, d)| (id.clone(), d.tier))
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn deliver(&self, record: &NotificationRecord, auto_close: Option<bool>) {
        let context = self.context();
        let (tier, settings) = self.resolve_tier(context).await;

        if !settings.enabled {
            debug!(
                "tier '{}' disabled, notification '{}' recorded but not rendered",
                tier.as_str(),
                record.id
            );
            return;
        }

        let labels: Vec<String> = record.actions.iter().map(|a| a.label.clone()).collect();
        let shown: Vec<String> = match tier {
            DeliveryTier::Panel => labels,
            DeliveryTier::Banner => labels.into_iter().take(2).collect(),
            DeliveryTier::Native => labels.into_iter().take(1).collect(),
        };

        {
            let mut active = self.active.lock().await;
            active.insert(record.id.clone(), ActiveDelivery { tier, closing: false });
        }
        self.bus.publish(
            topics::NOTIFY_DELIVERED,
            &json!({
                "id": record.id,
                "tier": tier.as_str(),
                "severity": record.severity.as_str(),
                "title": record.title,
                "actions": shown,
                "sound": settings.sound,
            }),
        );

        // The panel stays up unless the caller asked for auto-close;
        // transient tiers time out unless the caller opted out.
        let timed = match tier {
            DeliveryTier::Panel => auto_close == Some(true),
            DeliveryTier::Banner | DeliveryTier::Native => auto_close.unwrap_or(true),
        };
        if timed && settings.duration_ms > 0 {
            let center = self.clone();
            let id = record.id.clone();
            let duration = settings.duration_ms;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(duration)).await;
                let still_up = {
                    let active = center.active.lock().await;
                    active.get(&id).map(|d| !d.closing).unwrap_or(false)
                };
                if still_up && let Err(e) = center.close(&id).await {
                    debug!("auto-dismiss of '{}' failed: {}", id, e);
                }
            });
        }
    }

    async fn resolve_tier(&self, context: PresentationContext) -> (DeliveryTier, ChannelSettings) {
        match context {
            PresentationContext::Expanded => (
                DeliveryTier::Panel,
                self.store.notification_settings("panel").await,
            ),
            PresentationContext::Compact => (
                DeliveryTier::Banner,
                self.store.notification_settings("banner").await,
            ),
            PresentationContext::Minimal => {
                let native = self.store.notification_settings("native").await;
                if native.enabled
                    && native.use_native_channel
                    && self.native_available.load(Ordering::SeqCst)
                {
                    (DeliveryTier::Native, native)
                } else {
                    // In-app transient fallback when the native channel is
                    // unavailable or switched off.
                    (
                        DeliveryTier::Banner,
                        self.store.notification_settings("banner").await,
                    )
                }
            }
        }
    }

    async fn drain_pending(&self) {
        loop {
            if !self.online.load(Ordering::SeqCst) {
                break;
            }
            let next = self.pending.lock().await.pop_front();
            let Some(queued) = next else {
                break;
            };
            self.deliver(&queued.record, queued.auto_close).await;
            let more = !self.pending.lock().await.is_empty();
            if more {
                tokio::time::sleep(Duration::from_millis(DRAIN_GAP_MS)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::types::Severity;
    use crate::storage::MemStore;
    use std::sync::atomic::AtomicUsize;

    async fn center() -> (Arc<DataStore>, Arc<EventBus>, NotificationCenter) {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(DataStore::new(Arc::new(MemStore::new()), bus.clone()).await);
        let center = NotificationCenter::new(Arc::clone(&store), Arc::clone(&bus));
        (store, bus, center)
    }

    fn delivered_tiers(bus: &Arc<EventBus>) -> Arc<std::sync::Mutex<Vec<String>>> {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(topics::NOTIFY_DELIVERED, move |payload| {
            let tier = payload["tier"].as_str().unwrap_or_default().to_string();
            sink.lock().unwrap().push(tier);
        });
        seen
    }

    #[tokio::test]
    async fn show_records_and_delivers_one_tier() {
        let (store, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);

        let id = center
            .show(NotificationRequest::new("Done", "Task finished").severity(Severity::Success))
            .await
            .unwrap();

        assert_eq!(store.notifications().await.len(), 1);
        assert_eq!(*tiers.lock().unwrap(), vec!["panel"]);
        assert_eq!(
            center.active_deliveries().await,
            vec![(id, DeliveryTier::Panel)]
        );
    }

    #[tokio::test]
    async fn context_selects_the_tier() {
        let (_, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);

        center.set_context(PresentationContext::Compact);
        center
            .show(NotificationRequest::new("A", "banner"))
            .await
            .unwrap();

        center.set_context(PresentationContext::Minimal);
        center
            .show(NotificationRequest::new("B", "native"))
            .await
            .unwrap();

        assert_eq!(*tiers.lock().unwrap(), vec!["banner", "native"]);
    }

    #[tokio::test]
    async fn minimal_context_falls_back_to_banner_without_native_channel() {
        let (_, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);

        center.set_context(PresentationContext::Minimal);
        center.set_native_available(false);
        center
            .show(NotificationRequest::new("B", "fallback"))
            .await
            .unwrap();

        assert_eq!(*tiers.lock().unwrap(), vec!["banner"]);
    }

    #[tokio::test]
    async fn banner_shows_at_most_two_actions_native_one() {
        let (_, bus, center) = center().await;
        let labels = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&labels);
        bus.subscribe(topics::NOTIFY_DELIVERED, move |payload| {
            let shown = payload["actions"]
                .as_array()
                .map(|a| a.len())
                .unwrap_or_default();
            sink.lock().unwrap().push(shown);
        });

        let request = |title: &str| {
            NotificationRequest::new(title, "m")
                .action("one", || {})
                .action("two", || {})
                .action("three", || {})
        };

        center.set_context(PresentationContext::Compact);
        center.show(request("banner")).await.unwrap();
        center.set_context(PresentationContext::Minimal);
        center.show(request("native")).await.unwrap();

        assert_eq!(*labels.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn disabled_tier_records_without_rendering() {
        let (store, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);
        store
            .update_settings(serde_json::json!({
                "notifications": { "panel": { "enabled": false } }
            }))
            .await
            .unwrap();

        center
            .show(NotificationRequest::new("Hidden", "m"))
            .await
            .unwrap();

        assert_eq!(store.notifications().await.len(), 1);
        assert!(tiers.lock().unwrap().is_empty());
        assert!(center.active_deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn offline_show_queues_until_reconnect() {
        let (_, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);

        center.set_online(false).await;
        center
            .show(NotificationRequest::new("Held", "m"))
            .await
            .unwrap();
        assert_eq!(center.pending_count().await, 1);
        assert!(tiers.lock().unwrap().is_empty());

        center.set_online(true).await;
        assert_eq!(center.pending_count().await, 0);
        assert_eq!(tiers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn offline_safe_notification_renders_while_offline() {
        let (_, bus, center) = center().await;
        let tiers = delivered_tiers(&bus);

        center.set_online(false).await;
        center
            .show(NotificationRequest::new("Urgent", "m").offline_safe(true))
            .await
            .unwrap();

        assert_eq!(center.pending_count().await, 0);
        assert_eq!(tiers.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_marks_read_and_retires_delivery() {
        let (store, _, center) = center().await;
        let id = center
            .show(NotificationRequest::new("Done", "m"))
            .await
            .unwrap();

        center.close(&id).await.unwrap();

        assert!(store.notifications().await[0].read);
        assert!(center.active_deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn action_fires_once_and_closes_by_default() {
        let (_, _, center) = center().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let id = center
            .show(NotificationRequest::new("Act", "m").action("Go", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        center.invoke_action(&id, "Go").await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(center.active_deliveries().await.is_empty());

        // The runtime action table is gone once the notification closed.
        assert!(center.invoke_action(&id, "Go").await.is_err());
    }

    #[tokio::test]
    async fn keep_open_action_leaves_delivery_up_and_fires_once() {
        let (_, _, center) = center().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let id = center
            .show(
                NotificationRequest::new("Act", "m").action_keeping_open("Tick", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        center.invoke_action(&id, "Tick").await.unwrap();
        center.invoke_action(&id, "Tick").await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(center.active_deliveries().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_tiers_auto_dismiss_after_duration() {
        let (store, _, center) = center().await;
        center.set_context(PresentationContext::Compact);
        center
            .show(NotificationRequest::new("Fleeting", "m"))
            .await
            .unwrap();
        assert_eq!(center.active_deliveries().await.len(), 1);

        // Banner default duration is 5s; jump past it plus the exit window.
        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert!(center.active_deliveries().await.is_empty());
        assert!(store.notifications().await[0].read);
    }
}
