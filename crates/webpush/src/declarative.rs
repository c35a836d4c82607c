//! Declarative Web Push messages.
//!
//! A JSON payload the user agent can display without waking a service
//! worker. `web_push` must be 8030.

use serde::{Deserialize, Serialize};

/// Magic value of the `web_push` member.
pub const DECLARATIVE_WEB_PUSH: u16 = 8030;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarativePushMessage {
    pub web_push: u16,
    pub notification: DeclarativeNotification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_badge: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutable: Option<bool>,
}

impl DeclarativePushMessage {
    pub fn new(notification: DeclarativeNotification) -> Self {
        Self {
            web_push: DECLARATIVE_WEB_PUSH,
            notification,
            app_badge: None,
            mutable: None,
        }
    }

    pub fn is_declarative(&self) -> bool {
        self.web_push == DECLARATIVE_WEB_PUSH
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "ltr")]
    LeftToRight,
    #[serde(rename = "rtl")]
    RightToLeft,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeNotification {
    pub title: String,
    /// URL opened when the notification is activated.
    pub navigate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vibrate: Vec<u32>,
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renotify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_interaction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

impl DeclarativeNotification {
    pub fn new(title: impl Into<String>, navigate: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            navigate: navigate.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub navigate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}
