use anyhow::Result;
use serde_json::json;

use super::types::NotificationRecord;
use super::{DataStore, slots};

pub const NOTIFICATION_LIMIT: usize = 100;

impl DataStore {
    pub async fn add_notification(&self, record: NotificationRecord) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.notifications.push(record.clone());
            while state.notifications.len() > NOTIFICATION_LIMIT {
                state.notifications.remove(0);
            }
            state.notifications.clone()
        };
        self.persist(slots::NOTIFICATIONS, &snapshot).await;
        self.emit_change("notifications", "add", serde_json::to_value(&record)?);
        Ok(())
    }

    /// Newest-first view, the order notifications are presented in.
    pub async fn notifications(&self) -> Vec<NotificationRecord> {
        let state = self.state.lock().await;
        let mut list = state.notifications.clone();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<bool> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let Some(record) = state.notifications.iter_mut().find(|n| n.id == id) else {
                return Ok(false);
            };
            record.read = true;
            state.notifications.clone()
        };
        self.persist(slots::NOTIFICATIONS, &snapshot).await;
        self.emit_change("notifications", "update", json!({ "id": id, "read": true }));
        Ok(true)
    }

    pub async fn clear_notifications(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.notifications.clear();
        }
        self.persist(slots::NOTIFICATIONS, &Vec::<NotificationRecord>::new())
            .await;
        self.emit_change("notifications", "clear", json!({}));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::Severity;
    use super::*;
    use crate::core::events::EventBus;
    use crate::storage::MemStore;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            severity: Severity::Info,
            created_at: Utc::now(),
            read: false,
            actions: Vec::new(),
        }
    }

    async fn store() -> DataStore {
        DataStore::new(Arc::new(MemStore::new()), Arc::new(EventBus::new())).await
    }

    #[tokio::test]
    async fn notifications_are_bounded_with_oldest_evicted() {
        let store = store().await;
        for i in 0..(NOTIFICATION_LIMIT + 3) {
            store.add_notification(record(&format!("n{}", i))).await.unwrap();
        }
        let all = store.notifications().await;
        assert_eq!(all.len(), NOTIFICATION_LIMIT);
        assert!(!all.iter().any(|n| n.id == "n0"));
        assert!(!all.iter().any(|n| n.id == "n2"));
        assert!(all.iter().any(|n| n.id == "n3"));
    }

    #[tokio::test]
    async fn mark_read_flips_flag_once_found() {
        let store = store().await;
        store.add_notification(record("n1")).await.unwrap();
        assert!(store.mark_notification_read("n1").await.unwrap());
        assert!(!store.mark_notification_read("ghost").await.unwrap());
        assert!(store.notifications().await[0].read);
    }

    #[tokio::test]
    async fn newest_first_ordering() {
        let store = store().await;
        let mut old = record("old");
        old.created_at = Utc::now() - chrono::Duration::seconds(60);
        let fresh = record("fresh");
        store.add_notification(old).await.unwrap();
        store.add_notification(fresh).await.unwrap();

        let ids: Vec<String> = store
            .notifications()
            .await
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["fresh", "old"]);
    }

    #[tokio::test]
    async fn clear_notifications_empties_collection() {
        let store = store().await;
        store.add_notification(record("n1")).await.unwrap();
        store.clear_notifications().await.unwrap();
        assert!(store.notifications().await.is_empty());
    }
}
