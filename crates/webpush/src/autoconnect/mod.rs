//! Client for the Mozilla autopush WebSocket protocol.
//!
//! Registers channels with an upstream push service and receives the
//! messages application servers post to their endpoints.

pub mod client;
pub mod messages;
pub mod pending;

pub use client::AutoconnectClient;
pub use messages::{AckUpdate, Notification};
