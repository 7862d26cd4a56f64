use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Research,
    Assistant,
    Analysis,
    Creative,
    Code,
    Custom,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Research => "research",
            AgentKind::Assistant => "assistant",
            AgentKind::Analysis => "analysis",
            AgentKind::Creative => "creative",
            AgentKind::Code => "code",
            AgentKind::Custom => "custom",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value {
            "research" => Some(AgentKind::Research),
            "assistant" => Some(AgentKind::Assistant),
            "analysis" => Some(AgentKind::Analysis),
            "creative" => Some(AgentKind::Creative),
            "code" => Some(AgentKind::Code),
            "custom" => Some(AgentKind::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Busy,
    Idle,
    Error,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Busy => "busy",
            AgentStatus::Idle => "idle",
            AgentStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub kind: AgentKind,
    pub status: AgentStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Ordered low-to-high so `Urgent` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// `agent_id` is a soft reference; a task may outlive (or predate) the agent
/// it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Serializable view of a notification action. The callback itself lives in
/// the delivery layer; only the label and close behavior are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub label: String,
    #[serde(default = "default_true")]
    pub close_on_click: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub auto_sync: bool,
    pub sync_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub max_retries: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_ms: 60_000,
            retry_interval_ms: 5_000,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub sound: bool,
    pub duration_ms: u64,
    pub use_native_channel: bool,
}

impl ChannelSettings {
    /// Per-tier defaults: the panel dismisses manually, transient tiers time
    /// out, only the native tier reaches outside the app.
    pub fn default_for(tier: &str) -> Self {
        match tier {
            "panel" => Self {
                enabled: true,
                sound: false,
                duration_ms: 0,
                use_native_channel: false,
            },
            "native" => Self {
                enabled: true,
                sound: true,
                duration_ms: 5_000,
                use_native_channel: true,
            },
            _ => Self {
                enabled: true,
                sound: false,
                duration_ms: 5_000,
                use_native_channel: false,
            },
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self::default_for("banner")
    }
}

fn default_true() -> bool {
    true
}
