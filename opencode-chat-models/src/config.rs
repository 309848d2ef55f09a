//! Adapter configuration.
//!
//! [`OpenCodeConfig`] is validated once, at build time, and immutable after.
//! Invalid values fail [`OpenCodeConfigBuilder::build`] with
//! [`ModelError::Configuration`] before any request is made.
//!
//! ```rust
//! use opencode_chat_models::OpenCodeConfig;
//! use std::time::Duration;
//!
//! let config = OpenCodeConfig::builder("http://localhost:4096", "anthropic", "claude-3-5-sonnet-20241022")
//!     .temperature(0.2)
//!     .timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.agent(), "build");
//! ```

use std::num::NonZeroU64;
use std::time::Duration;
use url::Url;

use crate::error::{ModelError, ModelResult};

/// Agent used when none is configured.
pub const DEFAULT_AGENT: &str = "build";

/// Deadline for bounded calls when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generation length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxTokens {
    /// At most this many tokens.
    Limited(NonZeroU64),
    /// No limit; nothing is sent to the server.
    Unlimited,
}

impl MaxTokens {
    /// The limit to put on the wire, if any.
    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        match self {
            MaxTokens::Limited(n) => Some(n.get()),
            MaxTokens::Unlimited => None,
        }
    }
}

impl std::str::FromStr for MaxTokens {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(MaxTokens::Unlimited);
        }
        s.parse::<u64>()
            .ok()
            .and_then(NonZeroU64::new)
            .map(MaxTokens::Limited)
            .ok_or_else(|| {
                ModelError::configuration(format!(
                    "max tokens must be a positive integer or \"unlimited\", got {s:?}"
                ))
            })
    }
}

/// Where the reply to a prompt comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Collect the reply from the shared `GET /event` stream.
    #[default]
    EventStream,
    /// The prompt submission response already carries the reply parts.
    Inline,
}

/// Validated adapter configuration.
#[derive(Debug, Clone)]
pub struct OpenCodeConfig {
    base_url: Url,
    api_key: Option<String>,
    agent: String,
    provider_id: String,
    model_id: String,
    temperature: Option<f64>,
    max_tokens: Option<MaxTokens>,
    timeout: Duration,
    response_mode: ResponseMode,
}

impl OpenCodeConfig {
    /// Start building a configuration.
    pub fn builder(
        base_url: impl Into<String>,
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> OpenCodeConfigBuilder {
        OpenCodeConfigBuilder {
            base_url: base_url.into(),
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            api_key: None,
            agent: None,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            response_mode: ResponseMode::default(),
        }
    }

    /// Create from environment variables.
    ///
    /// Required: `OPENCODE_BASE_URL`, `OPENCODE_PROVIDER_ID`, `OPENCODE_MODEL_ID`.
    /// Optional: `OPENCODE_API_KEY`, `OPENCODE_AGENT`, `OPENCODE_TEMPERATURE`,
    /// `OPENCODE_MAX_TOKENS` (integer or `unlimited`), `OPENCODE_TIMEOUT_SECS`,
    /// `OPENCODE_RESPONSE_MODE` (`event-stream` or `inline`).
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ModelError::configuration(format!("{key} not set")))
        };

        let mut builder = Self::builder(
            required("OPENCODE_BASE_URL")?,
            required("OPENCODE_PROVIDER_ID")?,
            required("OPENCODE_MODEL_ID")?,
        );

        if let Some(key) = lookup("OPENCODE_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(agent) = lookup("OPENCODE_AGENT") {
            builder = builder.agent(agent);
        }
        if let Some(raw) = lookup("OPENCODE_TEMPERATURE") {
            let temp = raw.trim().parse::<f64>().map_err(|_| {
                ModelError::configuration(format!("OPENCODE_TEMPERATURE is not a number: {raw:?}"))
            })?;
            builder = builder.temperature(temp);
        }
        if let Some(raw) = lookup("OPENCODE_MAX_TOKENS") {
            builder = builder.max_tokens_setting(raw.parse()?);
        }
        if let Some(raw) = lookup("OPENCODE_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                ModelError::configuration(format!("OPENCODE_TIMEOUT_SECS is not an integer: {raw:?}"))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("OPENCODE_RESPONSE_MODE") {
            let mode = match raw.trim() {
                "event-stream" | "event_stream" => ResponseMode::EventStream,
                "inline" => ResponseMode::Inline,
                other => {
                    return Err(ModelError::configuration(format!(
                        "OPENCODE_RESPONSE_MODE must be \"event-stream\" or \"inline\", got {other:?}"
                    )))
                }
            };
            builder = builder.response_mode(mode);
        }

        builder.build()
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Bearer token, if any.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Agent name.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Upstream provider id.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Upstream model id.
    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Sampling temperature.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Generation length limit.
    #[must_use]
    pub fn max_tokens(&self) -> Option<MaxTokens> {
        self.max_tokens
    }

    /// Deadline for bounded calls.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reply source.
    #[must_use]
    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }

    /// URL for the given path segments under the base URL.
    ///
    /// Segments are percent-encoded, so opaque ids are safe to pass.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Validation guarantees the URL can be a base.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Builder for [`OpenCodeConfig`].
#[derive(Debug, Clone)]
pub struct OpenCodeConfigBuilder {
    base_url: String,
    provider_id: String,
    model_id: String,
    api_key: Option<String>,
    agent: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<RequestedMaxTokens>,
    timeout: Duration,
    response_mode: ResponseMode,
}

/// Unvalidated max-token input.
#[derive(Debug, Clone, Copy)]
enum RequestedMaxTokens {
    Count(u64),
    Unlimited,
}

impl OpenCodeConfigBuilder {
    /// Set the bearer token. Blank keys are treated as absent.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the agent name.
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Limit generation to `tokens`. Zero is rejected at build time.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(RequestedMaxTokens::Count(tokens));
        self
    }

    /// Remove the generation length limit.
    #[must_use]
    pub fn unlimited_max_tokens(mut self) -> Self {
        self.max_tokens = Some(RequestedMaxTokens::Unlimited);
        self
    }

    /// Set the generation length limit directly.
    #[must_use]
    pub fn max_tokens_setting(self, max_tokens: MaxTokens) -> Self {
        match max_tokens {
            MaxTokens::Limited(n) => self.max_tokens(n.get()),
            MaxTokens::Unlimited => self.unlimited_max_tokens(),
        }
    }

    /// Set the deadline for bounded calls.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set where replies are read from.
    #[must_use]
    pub fn response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    /// Validate and build.
    pub fn build(self) -> ModelResult<OpenCodeConfig> {
        let base_url = parse_base_url(&self.base_url)?;

        let provider_id = self.provider_id.trim().to_string();
        if provider_id.is_empty() {
            return Err(ModelError::configuration("provider id must not be empty"));
        }
        let model_id = self.model_id.trim().to_string();
        if model_id.is_empty() {
            return Err(ModelError::configuration("model id must not be empty"));
        }

        let agent = match self.agent.as_deref().map(str::trim) {
            None => DEFAULT_AGENT.to_string(),
            Some("") => return Err(ModelError::configuration("agent must not be empty")),
            Some(agent) => agent.to_string(),
        };

        if let Some(temp) = self.temperature {
            if !temp.is_finite() || !(0.0..=2.0).contains(&temp) {
                return Err(ModelError::configuration(format!(
                    "temperature must be between 0 and 2, got {temp}"
                )));
            }
        }

        let max_tokens = match self.max_tokens {
            None => None,
            Some(RequestedMaxTokens::Unlimited) => Some(MaxTokens::Unlimited),
            Some(RequestedMaxTokens::Count(n)) => match NonZeroU64::new(n) {
                Some(n) => Some(MaxTokens::Limited(n)),
                None => {
                    return Err(ModelError::configuration(
                        "max tokens must be a positive integer",
                    ))
                }
            },
        };

        if self.timeout.is_zero() {
            return Err(ModelError::configuration("timeout must be greater than zero"));
        }

        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(OpenCodeConfig {
            base_url,
            api_key,
            agent,
            provider_id,
            model_id,
            temperature: self.temperature,
            max_tokens,
            timeout: self.timeout,
            response_mode: self.response_mode,
        })
    }
}

fn parse_base_url(raw: &str) -> ModelResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ModelError::configuration(format!("invalid base URL {raw:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ModelError::configuration(format!(
            "base URL must use http or https, got {:?}",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ModelError::configuration(format!(
            "base URL must be absolute with a host, got {raw:?}"
        )));
    }

    Ok(url)
}
