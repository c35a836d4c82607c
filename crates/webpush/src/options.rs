//! Per-message push options (RFC 8030 headers).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PushError;

/// Longest topic push services accept.
pub const MAX_TOPIC_LENGTH: usize = 32;

/// Delivery urgency, sent in the `Urgency` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    VeryLow,
    Low,
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::VeryLow => "very-low",
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very-low" => Ok(Urgency::VeryLow),
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            other => Err(PushError::InvalidOptions(format!(
                "unknown urgency {:?}",
                other
            ))),
        }
    }
}

/// Optional headers for a single push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOptions {
    /// Seconds the push service should retain the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// Coalescing key. The push service can read it, so prefer an opaque
    /// value such as a hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl PushOptions {
    pub fn validate(&self) -> Result<(), PushError> {
        if let Some(topic) = &self.topic {
            validate_topic(topic)?;
        }
        Ok(())
    }
}

/// Topics are at most 32 characters of the URL-safe base64 alphabet.
pub fn validate_topic(topic: &str) -> Result<(), PushError> {
    if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH {
        return Err(PushError::InvalidOptions(format!(
            "topic must be 1 to {} characters, got {}",
            MAX_TOPIC_LENGTH,
            topic.len()
        )));
    }
    if let Some(c) = topic
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(PushError::InvalidOptions(format!(
            "topic contains {:?}, only URL-safe base64 characters are allowed",
            c
        )));
    }
    Ok(())
}
