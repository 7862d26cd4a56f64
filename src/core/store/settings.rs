use anyhow::Result;
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{ChannelSettings, SyncSettings};
use super::{DataStore, slots};

impl DataStore {
    pub async fn settings(&self) -> Value {
        self.state.lock().await.settings.clone()
    }

    /// Merge a patch into the settings map. Top-level keys merge shallowly;
    /// the device-preference sub-maps (`sync`, `notifications.<tier>`) merge
    /// one level deeper so a partial patch keeps sibling keys intact.
    pub async fn update_settings(&self, patch: Value) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock().await;
            merge_values(&mut state.settings, &patch, 2);
            state.settings.clone()
        };
        self.persist(slots::SETTINGS, &snapshot).await;
        self.emit_change("settings", "update", snapshot);
        Ok(())
    }

    /// Typed view of `settings.sync`, falling back to defaults for missing
    /// keys or an absent section.
    pub async fn sync_settings(&self) -> SyncSettings {
        let stored = {
            let state = self.state.lock().await;
            state.settings.get("sync").cloned()
        };
        stored
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Typed view of `settings.notifications.<tier>`, overlaid on that
    /// tier's defaults.
    pub async fn notification_settings(&self, tier: &str) -> ChannelSettings {
        let stored = {
            let state = self.state.lock().await;
            state
                .settings
                .get("notifications")
                .and_then(|n| n.get(tier))
                .cloned()
        };
        let defaults = ChannelSettings::default_for(tier);
        let Some(patch) = stored else {
            return defaults;
        };
        let mut merged = match serde_json::to_value(&defaults) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to build channel defaults for '{}': {}", tier, e);
                return defaults;
            }
        };
        merge_values(&mut merged, &patch, 1);
        serde_json::from_value(merged).unwrap_or(defaults)
    }
}

pub(crate) fn merge_values(base: &mut Value, patch: &Value, depth: u8) {
    let Some(patch_map) = patch.as_object() else {
        *base = patch.clone();
        return;
    };
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Some(base_map) = base.as_object_mut() else {
        return;
    };
    for (key, incoming) in patch_map {
        let merge_deeper = depth > 0
            && incoming.is_object()
            && base_map.get(key).is_some_and(Value::is_object);
        if merge_deeper {
            if let Some(existing) = base_map.get_mut(key) {
                merge_values(existing, incoming, depth - 1);
            }
        } else {
            base_map.insert(key.clone(), incoming.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventBus;
    use crate::storage::MemStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn store() -> DataStore {
        DataStore::new(Arc::new(MemStore::new()), Arc::new(EventBus::new())).await
    }

    #[tokio::test]
    async fn update_merges_instead_of_replacing() {
        let store = store().await;
        store
            .update_settings(json!({ "theme": "dark", "sync": { "autoSync": true } }))
            .await
            .unwrap();
        store
            .update_settings(json!({ "sync": { "maxRetries": 2 } }))
            .await
            .unwrap();

        let settings = store.settings().await;
        assert_eq!(settings["theme"], "dark");
        assert_eq!(settings["sync"]["autoSync"], true);
        assert_eq!(settings["sync"]["maxRetries"], 2);
    }

    #[tokio::test]
    async fn tier_patch_keeps_sibling_tiers() {
        let store = store().await;
        store
            .update_settings(json!({
                "notifications": {
                    "panel": { "enabled": true, "sound": true },
                    "banner": { "enabled": true }
                }
            }))
            .await
            .unwrap();
        store
            .update_settings(json!({ "notifications": { "panel": { "enabled": false } } }))
            .await
            .unwrap();

        let settings = store.settings().await;
        assert_eq!(settings["notifications"]["panel"]["enabled"], false);
        assert_eq!(settings["notifications"]["panel"]["sound"], true);
        assert_eq!(settings["notifications"]["banner"]["enabled"], true);
    }

    #[tokio::test]
    async fn sync_settings_fill_missing_keys_with_defaults() {
        let store = store().await;
        store
            .update_settings(json!({ "sync": { "maxRetries": 2 } }))
            .await
            .unwrap();

        let sync = store.sync_settings().await;
        assert_eq!(sync.max_retries, 2);
        assert_eq!(sync.sync_interval_ms, SyncSettings::default().sync_interval_ms);
        assert!(sync.auto_sync);
    }

    #[tokio::test]
    async fn notification_settings_overlay_tier_defaults() {
        let store = store().await;
        store
            .update_settings(json!({ "notifications": { "native": { "sound": false } } }))
            .await
            .unwrap();

        let native = store.notification_settings("native").await;
        assert!(!native.sound);
        assert!(native.use_native_channel);

        // Untouched tier comes back as pure defaults.
        let panel = store.notification_settings("panel").await;
        assert_eq!(panel, ChannelSettings::default_for("panel"));
    }
}
