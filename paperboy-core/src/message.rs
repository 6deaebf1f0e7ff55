//! Wire envelopes exchanged between the application-facing service layer and
//! the Paperboy nodes. Field names stay camelCase on the wire for
//! compatibility with existing connectors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope for messages pushed to a user or a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub user_id: Option<String>,
    pub channel: Option<String>,
    pub payload: Value,
    /// Milliseconds since the Unix epoch, set at construction time.
    pub timestamp: i64,
}

impl Message {
    pub fn to_user(user_id: impl Into<String>, payload: Value) -> Self {
        Self {
            user_id: Some(user_id.into()),
            channel: None,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn to_channel(channel: impl Into<String>, payload: Value) -> Self {
        Self {
            user_id: None,
            channel: Some(channel.into()),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Envelope carried on the subscription authorization topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationMessage {
    pub ws_id: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub channel: Option<String>,
}

impl AuthorizationMessage {
    /// Envelope announcing a closed subscription for a user/channel pair.
    pub fn subscription_close(user_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            ws_id: None,
            token: None,
            user_id: Some(user_id.into()),
            channel: Some(channel.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_envelope_uses_camel_case_on_the_wire() {
        let message = Message::to_user("u-1", serde_json::json!({"body": "hi"}));
        let encoded = serde_json::to_value(&message).expect("encode");

        assert_eq!(encoded["userId"], "u-1");
        assert!(encoded["channel"].is_null());
        assert_eq!(encoded["payload"]["body"], "hi");
        assert!(encoded["timestamp"].as_i64().expect("timestamp") > 0);
    }

    #[test]
    fn authorization_message_round_trips() {
        let raw = r#"{"wsId":"ws-7","token":"t","userId":"u-1","channel":"news"}"#;
        let decoded: AuthorizationMessage = serde_json::from_str(raw).expect("decode");

        assert_eq!(decoded.ws_id.as_deref(), Some("ws-7"));
        assert_eq!(decoded.channel.as_deref(), Some("news"));
    }
}
