//! Requests awaiting a response, keyed by message type and correlation id.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::autoconnect::messages::ServerMessage;
use crate::error::{PushError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub message_type: &'static str,
    /// Channel id for `register`, empty for `hello`.
    pub id: String,
}

impl RequestKey {
    pub fn hello() -> Self {
        Self {
            message_type: "hello",
            id: String::new(),
        }
    }

    pub fn register(channel_id: impl Into<String>) -> Self {
        Self {
            message_type: "register",
            id: channel_id.into(),
        }
    }

    /// Key a response completes, if it is a response at all.
    pub fn for_response(message: &ServerMessage) -> Option<Self> {
        match message {
            ServerMessage::Hello(_) => Some(Self::hello()),
            ServerMessage::Register(r) => Some(Self::register(r.channel_id.as_str())),
            ServerMessage::Notification(_) => None,
        }
    }
}

/// One completion slot per in-flight request.
#[derive(Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<RequestKey, oneshot::Sender<ServerMessage>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot. Fails if a request with the same key is in flight.
    pub fn insert(&self, key: RequestKey) -> Result<oneshot::Receiver<ServerMessage>> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&key) {
            return Err(PushError::Signaling(format!(
                "{} request {:?} already in flight",
                key.message_type, key.id
            )));
        }
        let (tx, rx) = oneshot::channel();
        slots.insert(key, tx);
        Ok(rx)
    }

    /// Hand `message` to the request waiting on `key`.
    ///
    /// Returns false when nothing was waiting, or the waiter has gone.
    pub fn complete(&self, key: &RequestKey, message: ServerMessage) -> bool {
        match self.slots.lock().remove(key) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, key: &RequestKey) {
        self.slots.lock().remove(key);
    }

    /// Drop every slot; waiters observe a closed channel.
    pub fn fail_all(&self) {
        self.slots.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
