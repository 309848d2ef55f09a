//! Direct completion functions.
//!
//! One-call helpers for scripts and simple integrations that do not want to
//! hold a model instance.
//!
//! # Examples
//!
//! ## Single-shot
//!
//! ```rust,ignore
//! use opencode_chat::direct::complete;
//! use opencode_chat::ChatMessage;
//!
//! // Base URL and credentials come from OPENCODE_* variables.
//! let result = complete("anthropic/claude-3-5-sonnet", &[ChatMessage::user("Hello!")]).await?;
//! println!("{}", result.text);
//! ```
//!
//! ## Streaming
//!
//! ```rust,ignore
//! use opencode_chat::direct::complete_stream;
//! use futures::StreamExt;
//!
//! let mut stream = complete_stream(model, &[ChatMessage::user("Write a poem")]).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! ```

use std::sync::Arc;

use opencode_chat_core::ChatMessage;
use opencode_chat_models::{
    BoxedChatModel, CallOptions, ChatModel, CompletionResult, ModelError, OpenCodeChatModel,
    OpenCodeConfig, TextStream,
};
use thiserror::Error;

/// Error type for direct calls.
#[derive(Debug, Error)]
pub enum DirectError {
    /// Model name is not `provider/model`.
    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    /// Model-level error.
    #[error("Model error: {0}")]
    ModelError(#[from] ModelError),

    /// Runtime error (e.g. sync function called in async context).
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

/// Which model to call: a `provider/model` name or a built instance.
///
/// Names are resolved against the `OPENCODE_*` environment variables, with
/// the provider and model taken from the name instead.
#[derive(Clone)]
pub enum ModelSpec {
    /// Model given as `provider/model`.
    Name(String),
    /// Pre-built model.
    Instance(BoxedChatModel),
}

impl From<&str> for ModelSpec {
    fn from(s: &str) -> Self {
        ModelSpec::Name(s.to_string())
    }
}

impl From<String> for ModelSpec {
    fn from(s: String) -> Self {
        ModelSpec::Name(s)
    }
}

impl From<BoxedChatModel> for ModelSpec {
    fn from(model: BoxedChatModel) -> Self {
        ModelSpec::Instance(model)
    }
}

impl From<OpenCodeChatModel> for ModelSpec {
    fn from(model: OpenCodeChatModel) -> Self {
        ModelSpec::Instance(Arc::new(model))
    }
}

impl ModelSpec {
    fn resolve(self) -> Result<BoxedChatModel, DirectError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    fn resolve_with<F>(self, lookup: F) -> Result<BoxedChatModel, DirectError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = match self {
            ModelSpec::Instance(model) => return Ok(model),
            ModelSpec::Name(name) => name,
        };

        let (provider, model) = name
            .split_once('/')
            .filter(|(p, m)| !p.trim().is_empty() && !m.trim().is_empty())
            .ok_or_else(|| DirectError::InvalidModelName(name.clone()))?;

        let config = OpenCodeConfig::from_lookup(|key| match key {
            "OPENCODE_PROVIDER_ID" => Some(provider.to_string()),
            "OPENCODE_MODEL_ID" => Some(model.to_string()),
            other => lookup(other),
        })?;
        Ok(Arc::new(OpenCodeChatModel::new(config)))
    }
}

/// Run one exchange and return the whole reply.
pub async fn complete(
    model: impl Into<ModelSpec>,
    messages: &[ChatMessage],
) -> Result<CompletionResult, DirectError> {
    complete_with(model, messages, &CallOptions::default()).await
}

/// Like [`complete`], with cancellation and a progress observer.
pub async fn complete_with(
    model: impl Into<ModelSpec>,
    messages: &[ChatMessage],
    options: &CallOptions,
) -> Result<CompletionResult, DirectError> {
    let model = model.into().resolve()?;
    Ok(model.invoke(messages, options).await?)
}

/// Blocking version of [`complete`].
///
/// Builds a runtime per call. Returns [`DirectError::RuntimeError`] when
/// called from inside an async context.
pub fn complete_sync(
    model: impl Into<ModelSpec>,
    messages: &[ChatMessage],
) -> Result<CompletionResult, DirectError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(DirectError::RuntimeError(
            "complete_sync cannot be called from async context. Use complete instead.".to_string(),
        ));
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DirectError::RuntimeError(format!("Failed to create runtime: {e}")))?;

    let spec = model.into();
    let messages = messages.to_vec();
    rt.block_on(async move { complete(spec, &messages).await })
}

/// Run one exchange, yielding text as it arrives.
pub async fn complete_stream(
    model: impl Into<ModelSpec>,
    messages: &[ChatMessage],
) -> Result<TextStream, DirectError> {
    let model = model.into().resolve()?;
    Ok(model.stream(messages, &CallOptions::default()).await?)
}
