mod history;
mod notifications;
mod settings;
pub mod types;

pub use history::HISTORY_LIMIT;
pub use notifications::NOTIFICATION_LIMIT;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::warn;

use crate::core::events::{EventBus, topics};
use crate::storage::KvStore;

use types::{AgentRecord, ContextRecord, HistoryEntry, NotificationRecord, TaskRecord};

/// Slot names in the durable namespace, one per logical collection.
pub mod slots {
    pub const AGENTS: &str = "agentdeck.agents";
    pub const TASKS: &str = "agentdeck.tasks";
    pub const CONTEXTS: &str = "agentdeck.contexts";
    pub const HISTORY: &str = "agentdeck.command_history";
    pub const NOTIFICATIONS: &str = "agentdeck.notifications";
    pub const SETTINGS: &str = "agentdeck.settings";
    pub const LAST_SYNC: &str = "agentdeck.last_sync";
    pub const OFFLINE_QUEUE: &str = "agentdeck.offline_queue";
    pub const VIEW_STATE: &str = "agentdeck.view_state";
    pub const UPDATE_SIGNAL: &str = "agentdeck.update_signal";
}

/// Single authoritative holder of all domain collections. Every mutation is
/// applied in memory, persisted write-through as a whole-collection snapshot,
/// then announced on the event bus. A failed persist is logged and swallowed;
/// in-memory state stays authoritative for the rest of the session.
pub struct DataStore {
    kv: Arc<dyn KvStore>,
    bus: Arc<EventBus>,
    state: Mutex<StoreState>,
}

struct StoreState {
    agents: Vec<AgentRecord>,
    tasks: Vec<TaskRecord>,
    contexts: Vec<ContextRecord>,
    history: Vec<HistoryEntry>,
    notifications: Vec<NotificationRecord>,
    settings: Value,
    last_sync: Option<DateTime<Utc>>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            tasks: Vec::new(),
            contexts: Vec::new(),
            history: Vec::new(),
            notifications: Vec::new(),
            settings: Value::Object(Map::new()),
            last_sync: None,
        }
    }
}

impl DataStore {
    /// Build the store, hydrating every collection from the durable
    /// namespace. Missing or corrupt slots start the collection empty.
    pub async fn new(kv: Arc<dyn KvStore>, bus: Arc<EventBus>) -> Self {
        let mut state = StoreState::default();
        state.agents = load_slot(&*kv, slots::AGENTS).await;
        state.tasks = load_slot(&*kv, slots::TASKS).await;
        state.contexts = load_slot(&*kv, slots::CONTEXTS).await;
        state.history = load_slot(&*kv, slots::HISTORY).await;
        state.notifications = load_slot(&*kv, slots::NOTIFICATIONS).await;
        state.last_sync = load_slot(&*kv, slots::LAST_SYNC).await;

        let settings: Value = load_slot(&*kv, slots::SETTINGS).await;
        if settings.is_object() {
            state.settings = settings;
        }

        Self {
            kv,
            bus,
            state: Mutex::new(state),
        }
    }

    // --- agents ---

    pub async fn save_agent(&self, agent: AgentRecord) -> Result<()> {
        let (snapshot, action) = {
            let mut state = self.state.lock().await;
            let action = if let Some(pos) = state.agents.iter().position(|a| a.id == agent.id) {
                state.agents[pos] = agent.clone();
                "update"
            } else {
                state.agents.push(agent.clone());
                "add"
            };
            (state.agents.clone(), action)
        };
        self.persist(slots::AGENTS, &snapshot).await;
        self.emit_change("agents", action, serde_json::to_value(&agent)?);
        Ok(())
    }

    pub async fn delete_agent(&self, id: &str) -> Result<bool> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let before = state.agents.len();
            state.agents.retain(|a| a.id != id);
            if state.agents.len() == before {
                return Ok(false);
            }
            state.agents.clone()
        };
        self.persist(slots::AGENTS, &snapshot).await;
        self.emit_change("agents", "delete", json!({ "id": id }));
        Ok(true)
    }

    pub async fn agents(&self) -> Vec<AgentRecord> {
        self.state.lock().await.agents.clone()
    }

    pub async fn agent(&self, id: &str) -> Option<AgentRecord> {
        self.state
            .lock()
            .await
            .agents
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    // --- tasks ---

    pub async fn save_task(&self, mut task: TaskRecord) -> Result<()> {
        task.progress = task.progress.min(100);
        let (snapshot, action) = {
            let mut state = self.state.lock().await;
            let action = if let Some(pos) = state.tasks.iter().position(|t| t.id == task.id) {
                state.tasks[pos] = task.clone();
                "update"
            } else {
                state.tasks.push(task.clone());
                "add"
            };
            (state.tasks.clone(), action)
        };
        self.persist(slots::TASKS, &snapshot).await;
        self.emit_change("tasks", action, serde_json::to_value(&task)?);
        Ok(())
    }

    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let before = state.tasks.len();
            state.tasks.retain(|t| t.id != id);
            if state.tasks.len() == before {
                return Ok(false);
            }
            state.tasks.clone()
        };
        self.persist(slots::TASKS, &snapshot).await;
        self.emit_change("tasks", "delete", json!({ "id": id }));
        Ok(true)
    }

    pub async fn tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn task(&self, id: &str) -> Option<TaskRecord> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    // --- contexts ---

    pub async fn save_context(&self, context: ContextRecord) -> Result<()> {
        let (snapshot, action) = {
            let mut state = self.state.lock().await;
            let action = if let Some(pos) = state.contexts.iter().position(|c| c.id == context.id)
            {
                state.contexts[pos] = context.clone();
                "update"
            } else {
                state.contexts.push(context.clone());
                "add"
            };
            (state.contexts.clone(), action)
        };
        self.persist(slots::CONTEXTS, &snapshot).await;
        self.emit_change("contexts", action, serde_json::to_value(&context)?);
        Ok(())
    }

    pub async fn delete_context(&self, id: &str) -> Result<bool> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let before = state.contexts.len();
            state.contexts.retain(|c| c.id != id);
            if state.contexts.len() == before {
                return Ok(false);
            }
            state.contexts.clone()
        };
        self.persist(slots::CONTEXTS, &snapshot).await;
        self.emit_change("contexts", "delete", json!({ "id": id }));
        Ok(true)
    }

    pub async fn contexts(&self) -> Vec<ContextRecord> {
        self.state.lock().await.contexts.clone()
    }

    pub async fn context(&self, id: &str) -> Option<ContextRecord> {
        self.state
            .lock()
            .await
            .contexts
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    // --- sync bookkeeping ---

    /// Stamp and persist the last-sync time, then announce completion.
    /// The synchronization manager calls this at the end of a successful
    /// reconciliation; `@system sync` reaches it directly.
    pub async fn synchronize(&self) -> Result<()> {
        let now = Utc::now();
        {
            let mut state = self.state.lock().await;
            state.last_sync = Some(now);
        }
        self.persist(slots::LAST_SYNC, &Some(now)).await;
        self.bus
            .publish(topics::STORE_SYNCED, &json!({ "at": now.to_rfc3339() }));
        Ok(())
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_sync
    }

    // --- internals shared by the per-collection impl blocks ---

    async fn persist<T: Serialize>(&self, slot: &str, value: &T) {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to serialize slot '{}': {}", slot, e);
                return;
            }
        };
        if let Err(e) = self.kv.set(slot, &serialized).await {
            warn!(
                "storage write failed for '{}', in-memory state stays authoritative: {}",
                slot, e
            );
        }
    }

    fn emit_change(&self, collection: &str, action: &str, payload: Value) {
        self.bus.publish(
            topics::STORE_CHANGED,
            &json!({ "type": collection, "action": action, "payload": payload }),
        );
    }
}

async fn load_slot<T: DeserializeOwned + Default>(kv: &dyn KvStore, slot: &str) -> T {
    match kv.get(slot).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("slot '{}' holds corrupt data, starting empty: {}", slot, e);
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            warn!("failed to read slot '{}', starting empty: {}", slot, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::types::*;
    use super::*;
    use crate::storage::MemStore;

    fn agent(id: &str, kind: AgentKind) -> AgentRecord {
        AgentRecord {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            status: AgentStatus::Active,
            capabilities: Vec::new(),
        }
    }

    async fn empty_store() -> (Arc<MemStore>, Arc<EventBus>, DataStore) {
        let kv = Arc::new(MemStore::new());
        let bus = Arc::new(EventBus::new());
        let store = DataStore::new(kv.clone(), bus.clone()).await;
        (kv, bus, store)
    }

    #[tokio::test]
    async fn save_agent_roundtrips_through_storage() {
        let (kv, bus, store) = empty_store().await;
        let record = agent("research", AgentKind::Research);
        store.save_agent(record.clone()).await.unwrap();

        // A second store over the same namespace sees the same record.
        let rehydrated = DataStore::new(kv, bus).await;
        assert_eq!(rehydrated.agents().await, vec![record]);
    }

    #[tokio::test]
    async fn save_agent_with_existing_id_replaces() {
        let (_, _, store) = empty_store().await;
        store
            .save_agent(agent("a1", AgentKind::Research))
            .await
            .unwrap();
        let mut updated = agent("a1", AgentKind::Research);
        updated.status = AgentStatus::Busy;
        store.save_agent(updated).await.unwrap();

        let agents = store.agents().await;
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].status, AgentStatus::Busy);
    }

    #[tokio::test]
    async fn delete_agent_reports_whether_found() {
        let (_, _, store) = empty_store().await;
        store
            .save_agent(agent("a1", AgentKind::Code))
            .await
            .unwrap();
        assert!(store.delete_agent("a1").await.unwrap());
        assert!(!store.delete_agent("a1").await.unwrap());
        assert!(store.agents().await.is_empty());
    }

    #[tokio::test]
    async fn task_progress_is_clamped() {
        let (_, _, store) = empty_store().await;
        store
            .save_task(TaskRecord {
                id: "t1".to_string(),
                agent_id: "nobody".to_string(),
                title: "overflow".to_string(),
                status: TaskStatus::InProgress,
                priority: Priority::High,
                progress: 250,
            })
            .await
            .unwrap();
        assert_eq!(store.task("t1").await.unwrap().progress, 100);
    }

    #[tokio::test]
    async fn dangling_task_agent_reference_is_tolerated() {
        let (_, _, store) = empty_store().await;
        store
            .save_task(TaskRecord {
                id: "t1".to_string(),
                agent_id: "ghost".to_string(),
                title: "orphan".to_string(),
                status: TaskStatus::Pending,
                priority: Priority::None,
                progress: 0,
            })
            .await
            .unwrap();
        assert!(store.agent("ghost").await.is_none());
        assert_eq!(store.tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn mutation_emits_change_event() {
        let (_, bus, store) = empty_store().await;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(topics::STORE_CHANGED, move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        store
            .save_agent(agent("a1", AgentKind::Creative))
            .await
            .unwrap();
        store.delete_agent("a1").await.unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "agents");
        assert_eq!(events[0]["action"], "add");
        assert_eq!(events[1]["action"], "delete");
    }

    #[tokio::test]
    async fn storage_write_failure_is_nonfatal() {
        let (kv, _, store) = empty_store().await;
        kv.set_fail_writes(true);
        store
            .save_agent(agent("a1", AgentKind::Analysis))
            .await
            .unwrap();
        // The record survives in memory even though nothing was persisted.
        assert_eq!(store.agents().await.len(), 1);
        assert!(!kv.has(slots::AGENTS).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_slot_hydrates_empty() {
        let kv = Arc::new(MemStore::new());
        kv.set(slots::AGENTS, "not json at all").await.unwrap();
        let store = DataStore::new(kv, Arc::new(EventBus::new())).await;
        assert!(store.agents().await.is_empty());
    }

    #[tokio::test]
    async fn synchronize_updates_last_sync_and_announces() {
        let (_, bus, store) = empty_store().await;
        let flagged = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&flagged);
        bus.subscribe(topics::STORE_SYNCED, move |_| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(store.last_sync().await.is_none());
        store.synchronize().await.unwrap();
        assert!(store.last_sync().await.is_some());
        assert!(flagged.load(std::sync::atomic::Ordering::SeqCst));
    }
}
