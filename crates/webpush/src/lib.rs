//! Web Push: application server, push manager, and push-service variants.

pub mod agent;
pub mod application_server;
pub mod autoconnect;
pub mod capability;
pub mod config;
pub mod declarative;
pub mod error;
pub mod manager;
pub mod options;
pub mod push_server;
pub mod registry;
pub mod subscription;

pub use agent::{Agent, Delivery};
pub use application_server::ApplicationServer;
pub use autoconnect::{AckUpdate, AutoconnectClient, Notification};
pub use capability::{PushRequest, Pusher, Subscriber};
pub use config::{
    AgentConfig, ApplicationServerConfig, AutoconnectConfig, DEFAULT_DELIVERY_CAPACITY,
};
pub use declarative::{
    DeclarativeNotification, DeclarativePushMessage, Direction, NotificationAction,
    DECLARATIVE_WEB_PUSH,
};
pub use error::{PushError, Result};
pub use manager::{handle_incoming, PushManager};
pub use options::{validate_topic, PushOptions, Urgency, MAX_TOPIC_LENGTH};
pub use push_server::PushServer;
pub use registry::{InMemorySubscriptionStore, SubscriptionStore};
pub use subscription::{PushTarget, Subscription, SubscriptionKeys, SubscriptionRecord};

pub use webpush_crypto::CryptoError;
