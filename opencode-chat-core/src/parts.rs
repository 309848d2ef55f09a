//! Prompt parts.
//!
//! A prompt part is one atomic unit of content submitted to, or returned by,
//! the agent server. Parts are tagged by `type`. Only text parts are ever
//! produced from host messages, but all kinds may come back in responses.

use serde::{Deserialize, Serialize};

/// Server-assigned identifiers carried by parts in responses.
///
/// All fields are absent on parts built locally for submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartIds {
    /// Part id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning session.
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Owning message.
    #[serde(rename = "messageID", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// A typed prompt part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptPart {
    /// Plain text.
    Text(TextPart),
    /// File attachment.
    File(FilePart),
    /// Tool invocation and its state.
    Tool(ToolPart),
    /// Model reasoning.
    Reasoning(ReasoningPart),
    /// Any kind this crate does not model (step markers, patches, ...).
    #[serde(other)]
    Unknown,
}

impl PromptPart {
    /// Create a text part for submission.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart::new(text))
    }

    /// Kind name as it appears on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::File(_) => "file",
            Self::Tool(_) => "tool",
            Self::Reasoning(_) => "reasoning",
            Self::Unknown => "unknown",
        }
    }

    /// Get the text if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Server identifiers, if this kind carries them.
    #[must_use]
    pub fn ids(&self) -> Option<&PartIds> {
        match self {
            Self::Text(p) => Some(&p.ids),
            Self::File(p) => Some(&p.ids),
            Self::Tool(p) => Some(&p.ids),
            Self::Reasoning(p) => Some(&p.ids),
            Self::Unknown => None,
        }
    }

    /// Session this part belongs to, when the server says.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.ids().and_then(|ids| ids.session_id.as_deref())
    }

    /// Message this part belongs to, when the server says.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.ids().and_then(|ids| ids.message_id.as_deref())
    }
}

/// Text content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    /// The text.
    #[serde(default)]
    pub text: String,
    /// Set by the server for text it injected itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,
    /// Server identifiers.
    #[serde(flatten)]
    pub ids: PartIds,
}

impl TextPart {
    /// Create a new text part.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// File attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilePart {
    /// MIME type.
    #[serde(default)]
    pub mime: String,
    /// File location (URL or data URL).
    #[serde(default)]
    pub url: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Server identifiers.
    #[serde(flatten)]
    pub ids: PartIds,
}

/// Tool call made by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPart {
    /// Tool name.
    #[serde(default)]
    pub tool: String,
    /// Call id.
    #[serde(rename = "callID", default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Opaque tool state as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    /// Server identifiers.
    #[serde(flatten)]
    pub ids: PartIds,
}

/// Model reasoning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPart {
    /// Reasoning text.
    #[serde(default)]
    pub text: String,
    /// Server identifiers.
    #[serde(flatten)]
    pub ids: PartIds,
}

/// Concatenate the text of all text parts, in order.
#[must_use]
pub fn collect_text(parts: &[PromptPart]) -> String {
    parts.iter().filter_map(PromptPart::as_text).collect()
}
