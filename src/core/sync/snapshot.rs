use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::SyncManager;
use crate::core::store::slots;

impl SyncManager {
    /// Persist the host's presentation state (selection, scroll offsets,
    /// panel flags) as an opaque blob, and bump the shared update signal so
    /// another instance over the same namespace can notice. Best effort:
    /// concurrent writers race and the last write wins.
    pub async fn save_view_state(&self, blob: &Value) {
        let serialized = match serde_json::to_string(blob) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to serialize view state: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(slots::VIEW_STATE, &serialized).await {
            warn!("failed to persist view state: {}", e);
            return;
        }
        let stamp = match serde_json::to_string(&Utc::now()) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to serialize update signal: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(slots::UPDATE_SIGNAL, &stamp).await {
            warn!("failed to bump update signal: {}", e);
        }
    }

    pub async fn load_view_state(&self) -> Option<Value> {
        match self.kv.get(slots::VIEW_STATE).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(blob) => Some(blob),
                Err(e) => {
                    warn!("view state slot holds corrupt data: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("failed to read view state: {}", e);
                None
            }
        }
    }

    /// Poll the shared signal for a view-state write newer than `last_seen`.
    /// Returns the signal's timestamp when there is one to pick up.
    pub async fn external_update_since(
        &self,
        last_seen: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let raw = match self.kv.get(slots::UPDATE_SIGNAL).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("failed to read update signal: {}", e);
                return None;
            }
        };
        let stamp: DateTime<Utc> = serde_json::from_str(&raw).ok()?;
        match last_seen {
            Some(seen) if stamp <= seen => None,
            _ => Some(stamp),
        }
    }
}
