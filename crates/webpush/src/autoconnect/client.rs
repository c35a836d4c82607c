//! Autoconnect client.
//!
//! One background task owns the WebSocket. Requests are written through an
//! mpsc channel and answered through [`PendingRequests`]; notifications go
//! out on their own channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use p256::{PublicKey, SecretKey};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use uuid::Uuid;

use webpush_crypto::encode_public_key_base64;

use crate::autoconnect::messages::{
    AckUpdate, ClientMessage, Notification, ServerMessage, STATUS_OK,
};
use crate::autoconnect::pending::{PendingRequests, RequestKey};
use crate::capability::Subscriber;
use crate::config::AutoconnectConfig;
use crate::error::{PushError, Result};

/// Frames queued for the writer before `send` starts failing.
const OUTGOING_CAPACITY: usize = 64;
/// Notifications buffered for the caller; overflow is dropped and left
/// unacknowledged so the server redelivers it.
pub const NOTIFICATION_CAPACITY: usize = 256;

pub struct AutoconnectClient {
    outgoing: mpsc::Sender<Message>,
    pending: Arc<PendingRequests>,
    uaid: String,
    request_timeout: Duration,
    connection: JoinHandle<()>,
}

impl AutoconnectClient {
    /// Connect and complete the `hello` handshake.
    ///
    /// # Returns
    /// The client and a receiver for notifications pushed by the server.
    pub async fn connect(
        config: &AutoconnectConfig,
    ) -> Result<(Self, mpsc::Receiver<Notification>)> {
        let request_timeout = config.request_timeout();
        let connect = tokio_tungstenite::connect_async(config.url.as_str());
        let (ws_stream, _) = tokio::time::timeout(request_timeout, connect)
            .await
            .map_err(|_| PushError::SignalingTimeout("connect".to_string()))?
            .map_err(|e| PushError::Signaling(format!("connect to {}: {}", config.url, e)))?;
        tracing::info!(url = %config.url, "autoconnect connected");

        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (notifications, notifications_rx) = mpsc::channel(NOTIFICATION_CAPACITY);
        let pending = Arc::new(PendingRequests::new());

        let connection = tokio::spawn(run_connection(
            ws_stream,
            outgoing_rx,
            outgoing.clone(),
            Arc::clone(&pending),
            notifications,
        ));

        let mut client = Self {
            outgoing,
            pending,
            uaid: String::new(),
            request_timeout,
            connection,
        };

        let hello = ClientMessage::Hello {
            use_webpush: true,
            broadcasts: serde_json::Map::new(),
        };
        match client.request(RequestKey::hello(), &hello).await? {
            ServerMessage::Hello(response) => {
                if response.status != STATUS_OK {
                    return Err(PushError::UnexpectedStatus {
                        message_type: "hello".to_string(),
                        status: response.status,
                    });
                }
                client.uaid = response.uaid;
            }
            other => return Err(unexpected_response("hello", &other)),
        }
        tracing::debug!(uaid = %client.uaid, "autoconnect hello complete");

        Ok((client, notifications_rx))
    }

    /// User agent id assigned in the `hello` response.
    pub fn uaid(&self) -> &str {
        &self.uaid
    }

    /// Register `channel_id` with a base64url user agent public key.
    ///
    /// # Returns
    /// The push endpoint for the channel.
    pub async fn register(&self, channel_id: &str, key: &str) -> Result<String> {
        let message = ClientMessage::Register {
            channel_id: channel_id.to_string(),
            key: key.to_string(),
        };
        match self.request(RequestKey::register(channel_id), &message).await? {
            ServerMessage::Register(response) => {
                if response.status != STATUS_OK {
                    return Err(PushError::UnexpectedStatus {
                        message_type: "register".to_string(),
                        status: response.status,
                    });
                }
                Ok(response.push_endpoint)
            }
            other => Err(unexpected_response("register", &other)),
        }
    }

    /// Acknowledge received notifications so the server stops redelivering them.
    pub fn ack(&self, updates: Vec<AckUpdate>) -> Result<()> {
        self.send(&ClientMessage::Ack { updates })
    }

    /// Send a close frame. Pending requests fail once the server closes.
    pub fn close(&self) {
        if let Err(e) = self.outgoing.try_send(Message::Close(None)) {
            tracing::debug!(error = %e, "close frame not queued");
        }
    }

    fn send(&self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.outgoing.try_send(Message::Text(text)).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Signaling("outgoing queue full".to_string()),
            TrySendError::Closed(_) => PushError::Signaling("connection closed".to_string()),
        })
    }

    async fn request(&self, key: RequestKey, message: &ClientMessage) -> Result<ServerMessage> {
        let response = self.pending.insert(key.clone())?;
        if let Err(e) = self.send(message) {
            self.pending.remove(&key);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, response).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(PushError::Signaling(format!(
                "connection closed before {} response",
                key.message_type
            ))),
            Err(_) => {
                self.pending.remove(&key);
                Err(PushError::SignalingTimeout(key.message_type.to_string()))
            }
        }
    }
}

#[async_trait]
impl Subscriber for AutoconnectClient {
    /// Register a random channel id. Only the public half of
    /// `user_agent_key` leaves the process.
    async fn subscribe(
        &self,
        user_agent_key: &SecretKey,
        _application_server_key: &PublicKey,
    ) -> Result<(String, String)> {
        let channel_id = Uuid::new_v4().to_string();
        let key = encode_public_key_base64(&user_agent_key.public_key());
        let endpoint = self.register(&channel_id, &key).await?;
        Ok((channel_id, endpoint))
    }
}

impl Drop for AutoconnectClient {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

impl std::fmt::Debug for AutoconnectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoconnectClient")
            .field("uaid", &self.uaid)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

fn unexpected_response(expected: &str, got: &ServerMessage) -> PushError {
    PushError::Signaling(format!(
        "expected {} response, got {}",
        expected,
        got.message_type()
    ))
}

/// Route one text frame to its waiter or the notification channel.
fn dispatch(
    text: &str,
    pending: &PendingRequests,
    notifications: &mpsc::Sender<Notification>,
) {
    let message: ServerMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable autoconnect message");
            return;
        }
    };

    match RequestKey::for_response(&message) {
        Some(key) => {
            if !pending.complete(&key, message) {
                tracing::warn!(
                    message_type = key.message_type,
                    id = %key.id,
                    "dropping unsolicited autoconnect response"
                );
            }
        }
        None => {
            if let ServerMessage::Notification(notification) = message {
                match notifications.try_send(notification) {
                    Ok(()) => {}
                    Err(TrySendError::Full(notification)) => tracing::warn!(
                        channel_id = %notification.channel_id,
                        "notification buffer full, leaving notification unacknowledged"
                    ),
                    Err(TrySendError::Closed(_)) => {
                        tracing::warn!("notification receiver dropped, discarding notification")
                    }
                }
            }
        }
    }
}

async fn run_connection<S>(
    ws_stream: S,
    mut outgoing_rx: mpsc::Receiver<Message>,
    outgoing: mpsc::Sender<Message>,
    pending: Arc<PendingRequests>,
    notifications: mpsc::Sender<Notification>,
) where
    S: futures_util::Stream<Item = std::result::Result<Message, WsError>>
        + futures_util::Sink<Message, Error = WsError>
        + Unpin,
{
    let (mut ws_sink, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            Some(message) = outgoing_rx.recv() => {
                if let Err(e) = ws_sink.send(message).await {
                    tracing::warn!(error = %e, "autoconnect write failed");
                    break;
                }
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(message = %text, "autoconnect message");
                        dispatch(&text, &pending, &notifications);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if outgoing.try_send(Message::Pong(data)).is_err() {
                            tracing::debug!("pong not queued");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "autoconnect closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "autoconnect read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    pending.fail_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_routes_responses_and_notifications() {
        let pending = PendingRequests::new();
        let (notifications, mut notifications_rx) = mpsc::channel(4);
        let register = pending.insert(RequestKey::register("c1")).unwrap();

        dispatch(&notification_json("c1", "v1"), &pending, &notifications);
        dispatch("not json", &pending, &notifications);
        dispatch(
            r#"{"messageType":"register","channelID":"c1","status":200,
                "pushEndpoint":"https://push.example.net/c1"}"#,
            &pending,
            &notifications,
        );

        match register.await.unwrap() {
            ServerMessage::Register(response) => {
                assert_eq!(response.push_endpoint, "https://push.example.net/c1")
            }
            other => panic!("unexpected {:?}", other),
        }
        let notification = notifications_rx.recv().await.unwrap();
        assert_eq!(notification.channel_id, "c1");
        assert!(notifications_rx.try_recv().is_err());
        assert!(pending.is_empty());
    }

    fn notification_json(channel_id: &str, version: &str) -> String {
        serde_json::json!({
            "messageType": "notification",
            "channelID": channel_id,
            "version": version,
            "data": "",
        })
        .to_string()
    }

    #[tokio::test]
    async fn full_notification_buffer_drops_overflow() {
        let pending = PendingRequests::new();
        let (notifications, mut notifications_rx) = mpsc::channel(2);

        for version in ["v1", "v2", "v3"] {
            dispatch(&notification_json("c1", version), &pending, &notifications);
        }

        assert_eq!(notifications_rx.recv().await.unwrap().version, "v1");
        assert_eq!(notifications_rx.recv().await.unwrap().version, "v2");
        assert!(notifications_rx.try_recv().is_err());

        // Room again once the caller catches up.
        dispatch(&notification_json("c1", "v4"), &pending, &notifications);
        assert_eq!(notifications_rx.recv().await.unwrap().version, "v4");
    }

    #[tokio::test]
    async fn send_fails_when_outgoing_queue_is_full() {
        let (outgoing, _outgoing_rx) = mpsc::channel(1);
        let client = AutoconnectClient {
            outgoing,
            pending: Arc::new(PendingRequests::new()),
            uaid: "ua".to_string(),
            request_timeout: Duration::from_secs(1),
            connection: tokio::spawn(async {}),
        };

        client.ack(Vec::new()).unwrap();
        assert!(matches!(
            client.ack(Vec::new()),
            Err(PushError::Signaling(reason)) if reason == "outgoing queue full"
        ));
    }
}
