use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::types::HistoryEntry;
use super::{DataStore, slots};

/// Command history keeps only the most recent entries.
pub const HISTORY_LIMIT: usize = 100;

const DEFAULT_HISTORY_VIEW: usize = 10;

impl DataStore {
    /// Append a raw command line to history. Called synchronously at command
    /// submission time, so entries land in call order regardless of how long
    /// the simulated execution takes.
    pub async fn append_history(&self, text: &str) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let snapshot = {
            let mut state = self.state.lock().await;
            state.history.push(entry.clone());
            while state.history.len() > HISTORY_LIMIT {
                state.history.remove(0);
            }
            state.history.clone()
        };
        self.persist(slots::HISTORY, &snapshot).await;
        self.emit_change("history", "add", serde_json::to_value(&entry)?);
        Ok(entry)
    }

    /// Most-recent-first view of history, capped at `limit` (default 10).
    pub async fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let cap = limit.unwrap_or(DEFAULT_HISTORY_VIEW);
        let state = self.state.lock().await;
        state.history.iter().rev().take(cap).cloned().collect()
    }

    pub async fn clear_history(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.history.clear();
        }
        self.persist(slots::HISTORY, &Vec::<HistoryEntry>::new())
            .await;
        self.emit_change("history", "clear", json!({}));
        Ok(())
    }
}
