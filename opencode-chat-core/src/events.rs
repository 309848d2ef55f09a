//! Server-pushed stream events.
//!
//! Every event on the server's event stream is a JSON object of the form
//! `{"type": "...", "properties": {...}}`. Only the types needed to rebuild a
//! response are modelled; everything else parses as [`StreamEvent::Other`].

use serde::Deserialize;
use serde_json::Value;

use crate::messages::Role;
use crate::parts::PromptPart;

/// Session status that marks a finished response.
pub const STATUS_COMPLETED: &str = "completed";

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `message.part.updated`: a part was created or grew.
    PartUpdated {
        /// The part in its current state.
        part: PromptPart,
        /// Increment since the previous update, when the server sends one.
        delta: Option<String>,
    },
    /// `message.updated`: message metadata changed.
    MessageUpdated {
        /// Message id.
        id: String,
        /// Author role, if known.
        role: Option<Role>,
        /// Owning session.
        session_id: Option<String>,
    },
    /// `session.updated`: session metadata or status changed.
    SessionUpdated {
        /// Session the update belongs to.
        session_id: Option<String>,
        /// Status name, e.g. `completed`.
        status: Option<String>,
    },
    /// `session.idle`: the session finished processing.
    SessionIdle {
        /// Session that went idle.
        session_id: String,
    },
    /// Any other event type.
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    properties: Value,
}

#[derive(Deserialize)]
struct PartUpdatedProps {
    part: PromptPart,
    #[serde(default)]
    delta: Option<String>,
}

#[derive(Deserialize)]
struct MessageUpdatedProps {
    info: MessageInfo,
}

#[derive(Deserialize)]
struct MessageInfo {
    id: String,
    #[serde(default)]
    role: Option<Role>,
    #[serde(rename = "sessionID", default)]
    session_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct SessionUpdatedProps {
    #[serde(default)]
    info: Option<SessionInfo>,
    #[serde(default)]
    status: Option<Value>,
    #[serde(rename = "sessionID", default)]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct SessionInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<Value>,
}

#[derive(Deserialize)]
struct SessionIdleProps {
    #[serde(rename = "sessionID")]
    session_id: String,
}

/// Status may be a bare string or an object with a `type` field.
fn status_name(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

impl StreamEvent {
    /// Parse one event payload.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(data)?;
        let props = envelope.properties;

        let event = match envelope.event_type.as_str() {
            "message.part.updated" => {
                let p: PartUpdatedProps = serde_json::from_value(props)?;
                StreamEvent::PartUpdated {
                    part: p.part,
                    delta: p.delta,
                }
            }
            "message.updated" => {
                let p: MessageUpdatedProps = serde_json::from_value(props)?;
                StreamEvent::MessageUpdated {
                    id: p.info.id,
                    role: p.info.role,
                    session_id: p.info.session_id,
                }
            }
            "session.updated" => {
                let p: SessionUpdatedProps = if props.is_null() {
                    SessionUpdatedProps::default()
                } else {
                    serde_json::from_value(props)?
                };
                let (info_id, info_status) = match p.info {
                    Some(info) => (info.id, info.status),
                    None => (None, None),
                };
                StreamEvent::SessionUpdated {
                    session_id: p.session_id.or(info_id),
                    status: status_name(info_status.or(p.status)),
                }
            }
            "session.idle" => {
                let p: SessionIdleProps = serde_json::from_value(props)?;
                StreamEvent::SessionIdle {
                    session_id: p.session_id,
                }
            }
            _ => StreamEvent::Other(envelope.event_type),
        };

        Ok(event)
    }

    /// Session this event names, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            StreamEvent::PartUpdated { part, .. } => part.session_id(),
            StreamEvent::MessageUpdated { session_id, .. } => session_id.as_deref(),
            StreamEvent::SessionUpdated { session_id, .. } => session_id.as_deref(),
            StreamEvent::SessionIdle { session_id } => Some(session_id),
            StreamEvent::Other(_) => None,
        }
    }

    /// Whether this event signals that the response is finished.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        match self {
            StreamEvent::SessionUpdated { status, .. } => {
                status.as_deref() == Some(STATUS_COMPLETED)
            }
            StreamEvent::SessionIdle { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_part_updated() {
        let event = StreamEvent::from_json(
            r#"{"type":"message.part.updated","properties":{"part":{"type":"text","text":"Hello"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::PartUpdated {
                part: PromptPart::text("Hello"),
                delta: None,
            }
        );
        assert!(!event.is_completion());
    }

    #[test]
    fn test_session_updated_completed() {
        let event = StreamEvent::from_json(
            r#"{"type":"session.updated","properties":{"info":{"status":"completed"}}}"#,
        )
        .unwrap();
        assert!(event.is_completion());
        assert_eq!(event.session_id(), None);
    }

    #[test]
    fn test_session_updated_object_status() {
        let event = StreamEvent::from_json(
            r#"{"type":"session.updated","properties":{"info":{"id":"s1","status":{"type":"completed"}}}}"#,
        )
        .unwrap();
        assert!(event.is_completion());
        assert_eq!(event.session_id(), Some("s1"));
    }

    #[test]
    fn test_session_updated_busy_is_not_completion() {
        let event = StreamEvent::from_json(
            r#"{"type":"session.updated","properties":{"info":{"id":"s1","title":"x"}}}"#,
        )
        .unwrap();
        assert!(!event.is_completion());
    }

    #[test]
    fn test_session_idle() {
        let event =
            StreamEvent::from_json(r#"{"type":"session.idle","properties":{"sessionID":"s9"}}"#)
                .unwrap();
        assert!(event.is_completion());
        assert_eq!(event.session_id(), Some("s9"));
    }

    #[test]
    fn test_message_updated() {
        let event = StreamEvent::from_json(
            r#"{"type":"message.updated","properties":{"info":{"id":"m1","role":"user","sessionID":"s1"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageUpdated {
                id: "m1".into(),
                role: Some(Role::User),
                session_id: Some("s1".into()),
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        let event =
            StreamEvent::from_json(r#"{"type":"server.connected","properties":{}}"#).unwrap();
        assert_eq!(event, StreamEvent::Other("server.connected".into()));
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(StreamEvent::from_json("{not json").is_err());
        assert!(StreamEvent::from_json(r#"{"properties":{}}"#).is_err());
    }
}
