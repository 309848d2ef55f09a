//! Wire types for the agent server's REST endpoints.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use opencode_chat_core::PromptPart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider/model pair selecting the upstream model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    /// Provider id.
    #[serde(rename = "providerID")]
    pub provider_id: String,
    /// Model id.
    #[serde(rename = "modelID")]
    pub model_id: String,
}

/// `POST /session` body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    /// Agent name.
    pub agent: String,
    /// Upstream model.
    pub model: ModelRef,
}

/// `POST /session/{id}/prompt` body.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    /// Parts to submit.
    pub parts: Vec<PromptPart>,
    /// Agent name.
    pub agent: String,
    /// Upstream model.
    pub model: ModelRef,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Generation length limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

/// A live server session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque server-assigned id.
    pub id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a creation response body.
    ///
    /// Returns `None` when `id` is missing or not a string. `createdAt` may be
    /// an RFC 3339 string or epoch milliseconds; anything else falls back to
    /// the current time.
    pub(crate) fn from_response(body: &Value) -> Option<Self> {
        let id = body.get("id")?.as_str()?.to_string();
        let created_at = body
            .get("createdAt")
            .or_else(|| body.get("time").and_then(|t| t.get("created")))
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        Some(Self { id, created_at })
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Body of a successful prompt submission.
///
/// Servers that answer synchronously return the reply parts here; servers
/// that stream return an empty or unrelated body, which parses as no parts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptReply {
    /// Reply parts, if the server returned any.
    #[serde(default)]
    pub parts: Vec<PromptPart>,
}

impl PromptReply {
    /// Parse a reply body leniently.
    pub(crate) fn from_body(body: &str) -> Self {
        if body.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Prompt reply carried no parseable parts");
            Self::default()
        })
    }
}

/// An agent profile from `GET /agent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentInfo {
    /// Agent name, used as the `agent` config value.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Mode, e.g. `primary` or `subagent`.
    #[serde(default)]
    pub mode: Option<String>,
}

/// A model offered by a provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderModel {
    /// Model id, used as the `model_id` config value.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A provider from `GET /config/providers`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderInfo {
    /// Provider id, used as the `provider_id` config value.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Models keyed by id, in server order.
    #[serde(default)]
    pub models: IndexMap<String, ProviderModel>,
}

/// Response of `GET /config/providers`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderCatalog {
    /// Configured providers.
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
    /// Default model id per provider id.
    #[serde(default)]
    pub default: IndexMap<String, String>,
}

impl ProviderCatalog {
    /// Find a provider by id.
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&ProviderInfo> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// `(provider_id, model_id)` pairs for every model, in server order.
    #[must_use]
    pub fn model_refs(&self) -> Vec<ModelRef> {
        self.providers
            .iter()
            .flat_map(|p| {
                p.models.values().map(move |m| ModelRef {
                    provider_id: p.id.clone(),
                    model_id: m.id.clone(),
                })
            })
            .collect()
    }
}
