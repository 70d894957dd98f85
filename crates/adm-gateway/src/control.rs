//! Control channel: `{type, payload}` messages and their replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SkipWaiting,
    ClearCache,
    GetCacheStatus,
}

impl ControlMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::SkipWaiting => "SKIP_WAITING",
            ControlMessage::ClearCache => "CLEAR_CACHE",
            ControlMessage::GetCacheStatus => "GET_CACHE_STATUS",
        }
    }

    /// `None` for message types this gateway does not handle.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "SKIP_WAITING" => Some(ControlMessage::SkipWaiting),
            "CLEAR_CACHE" => Some(ControlMessage::ClearCache),
            "GET_CACHE_STATUS" => Some(ControlMessage::GetCacheStatus),
            _ => None,
        }
    }
}

/// Wire shape of an incoming message. `payload` is accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl ControlEnvelope {
    pub fn message(&self) -> Option<ControlMessage> {
        ControlMessage::parse(&self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub version: String,
    pub cached_resources_count: usize,
    /// Estimated size in KB, rounded.
    pub cache_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    CacheStatus(CacheStatus),
}
