use serde::{Deserialize, Serialize};

use crate::core::store::types::{ActionSpec, Severity};

pub type ActionHandler = Box<dyn Fn() + Send + Sync>;

/// Host-observable presentation mode. It picks the delivery tier; callers of
/// `show` never choose a tier directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationContext {
    /// Full workspace view; notifications land in the persistent panel.
    Expanded,
    /// Constrained view; notifications show as transient banners.
    Compact,
    /// Backgrounded; notifications go through the native channel.
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTier {
    Panel,
    Banner,
    Native,
}

impl DeliveryTier {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryTier::Panel => "panel",
            DeliveryTier::Banner => "banner",
            DeliveryTier::Native => "native",
        }
    }
}

pub struct NotificationAction {
    pub label: String,
    pub close_on_click: bool,
    pub handler: ActionHandler,
}

impl NotificationAction {
    pub fn spec(&self) -> ActionSpec {
        ActionSpec {
            label: self.label.clone(),
            close_on_click: self.close_on_click,
        }
    }
}

/// A request to surface a notification. Missing id and timestamp are filled
/// in by the delivery system; severity defaults to `Info`.
pub struct NotificationRequest {
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// `None` means use the chosen tier's default dismiss behavior.
    pub auto_close: Option<bool>,
    /// Offline-safe requests render even while disconnected instead of
    /// waiting in the offline queue.
    pub offline_safe: bool,
    pub actions: Vec<NotificationAction>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            message: message.into(),
            severity: Severity::Info,
            auto_close: None,
            offline_safe: false,
            actions: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = Some(auto_close);
        self
    }

    pub fn offline_safe(mut self, offline_safe: bool) -> Self {
        self.offline_safe = offline_safe;
        self
    }

    pub fn action<F>(mut self, label: impl Into<String>, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.actions.push(NotificationAction {
            label: label.into(),
            close_on_click: true,
            handler: Box::new(handler),
        });
        self
    }

    /// An action that leaves the notification open after firing.
    pub fn action_keeping_open<F>(mut self, label: impl Into<String>, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.actions.push(NotificationAction {
            label: label.into(),
            close_on_click: false,
            handler: Box::new(handler),
        });
        self
    }
}
