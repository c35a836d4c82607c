//! Autopush WebSocket protocol messages.
//!
//! Every frame is a JSON text message tagged by `messageType`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use webpush_crypto::base64url_decode;

use crate::error::Result;

/// Status the server uses for a successful `hello` or `register`.
pub const STATUS_OK: u16 = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "messageType", rename_all = "lowercase")]
pub enum ClientMessage {
    Hello {
        use_webpush: bool,
        broadcasts: serde_json::Map<String, serde_json::Value>,
    },
    Register {
        #[serde(rename = "channelID")]
        channel_id: String,
        /// Base64url user agent public key.
        key: String,
    },
    Ack {
        updates: Vec<AckUpdate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckUpdate {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "messageType", rename_all = "lowercase")]
pub enum ServerMessage {
    Hello(HelloResponse),
    Register(RegisterResponse),
    Notification(Notification),
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::Hello(_) => "hello",
            ServerMessage::Register(_) => "register",
            ServerMessage::Notification(_) => "notification",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelloResponse {
    /// User agent id assigned by the server.
    #[serde(default)]
    pub uaid: String,
    pub status: u16,
    #[serde(default)]
    pub use_webpush: bool,
    #[serde(default)]
    pub broadcasts: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterResponse {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    pub status: u16,
    #[serde(rename = "pushEndpoint", default)]
    pub push_endpoint: String,
}

/// A push message relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Notification {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    pub version: String,
    /// Base64url aes128gcm body. Absent for pushes without content.
    #[serde(default)]
    pub data: String,
    /// Selected request headers, e.g. `encoding`.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Notification {
    /// The encrypted message body.
    pub fn content(&self) -> Result<Vec<u8>> {
        Ok(base64url_decode(&self.data)?)
    }

    pub fn ack(&self) -> AckUpdate {
        AckUpdate {
            channel_id: self.channel_id.clone(),
            version: self.version.clone(),
        }
    }
}
