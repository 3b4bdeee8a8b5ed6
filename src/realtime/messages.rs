//! Phoenix channel frames spoken by the realtime service.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sync::RealtimeEvent;

/// Topic of connection-level messages such as heartbeats.
pub const PHOENIX_TOPIC: &str = "phoenix";

/// One Phoenix frame: `{"topic", "event", "payload", "ref"}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
}

/// Channel topic for a configured realtime topic name.
pub fn channel_topic(topic: &str) -> String {
    if topic.starts_with("realtime:") {
        topic.to_string()
    } else {
        format!("realtime:{}", topic)
    }
}

impl PhoenixMessage {
    pub fn heartbeat(msg_ref: u64) -> Self {
        Self {
            topic: PHOENIX_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Join a channel, authorizing with `access_token` when signed in.
    pub fn join(topic: &str, access_token: Option<&str>, msg_ref: u64) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": []
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = json!(token);
        }
        Self {
            topic: channel_topic(topic),
            event: "phx_join".to_string(),
            payload,
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Hand a refreshed access token to an already joined channel.
    pub fn access_token(topic: &str, access_token: &str, msg_ref: u64) -> Self {
        Self {
            topic: channel_topic(topic),
            event: "access_token".to_string(),
            payload: json!({ "access_token": access_token }),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    fn reply_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Event to report for an incoming frame.
    ///
    /// Successful heartbeat replies are connection noise and map to `None`.
    pub fn into_event(self) -> Option<RealtimeEvent> {
        match self.event.as_str() {
            "phx_error" => Some(RealtimeEvent::Error {
                message: format!("channel {} errored", self.topic),
            }),
            "phx_reply" if self.reply_status() == Some("error") => {
                let reason = self
                    .payload
                    .pointer("/response/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("request rejected");
                Some(RealtimeEvent::Error {
                    message: format!("{}: {}", self.topic, reason),
                })
            }
            "phx_reply" if self.topic == PHOENIX_TOPIC => None,
            _ => Some(RealtimeEvent::Message {
                topic: self.topic,
                event: self.event,
                payload: self.payload,
            }),
        }
    }
}
