//! Client wire protocol (JSON text frames)
//!
//! ```text
//! → {"type":"SUBSCRIBE","subject_id":"W1","jurisdiction":"US"}   handshake only
//! → {"type":"HEARTBEAT"}
//! → {"type":"FILTER","jurisdiction":"US"}                         null clears
//! → {"type":"REQUEST_CACHE"}
//! ← {"type":"ALERT","alert":{...}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenguard_core::Alert;

use crate::connection::ConnectionId;
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    Subscribe {
        subject_id: String,
        #[serde(default)]
        jurisdiction: Option<String>,
    },
    Heartbeat,
    Filter {
        #[serde(default)]
        jurisdiction: Option<String>,
    },
    RequestCache,
}

impl ClientCommand {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Subscribe { .. } => "SUBSCRIBE",
            ClientCommand::Heartbeat => "HEARTBEAT",
            ClientCommand::Filter { .. } => "FILTER",
            ClientCommand::RequestCache => "REQUEST_CACHE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Subscribed {
        connection_id: ConnectionId,
        subject_id: String,
        jurisdiction: Option<String>,
    },
    HeartbeatAck {
        timestamp: DateTime<Utc>,
    },
    FilterUpdated {
        jurisdiction: Option<String>,
    },
    CachedAlerts {
        alerts: Vec<Alert>,
    },
    Alert {
        alert: Alert,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ClientCommand::parse(r#"{"type":"HEARTBEAT"}"#).unwrap(), ClientCommand::Heartbeat);
        assert_eq!(
            ClientCommand::parse(r#"{"type":"FILTER","jurisdiction":"US"}"#).unwrap(),
            ClientCommand::Filter {
                jurisdiction: Some("US".to_string())
            }
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"FILTER"}"#).unwrap(),
            ClientCommand::Filter { jurisdiction: None }
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"REQUEST_CACHE"}"#).unwrap(),
            ClientCommand::RequestCache
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"SUBSCRIBE","subject_id":"W1"}"#).unwrap(),
            ClientCommand::Subscribe {
                subject_id: "W1".to_string(),
                jurisdiction: None
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ClientCommand::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(ClientCommand::parse(r#"{"type":"DANCE"}"#).is_err());
        assert!(ClientCommand::parse(r#"{"type":"SUBSCRIBE"}"#).is_err());
    }

    #[test]
    fn test_server_message_framing() {
        let json = ServerMessage::FilterUpdated {
            jurisdiction: Some("SG".to_string()),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"FILTER_UPDATED","jurisdiction":"SG"}"#);
    }
}
