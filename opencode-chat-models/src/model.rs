//! Chat model capability trait and call types.
//!
//! [`ChatModel`] is the interface a host integrates against: a type tag,
//! single-shot [`invoke`](ChatModel::invoke), and pull-based
//! [`stream`](ChatModel::stream).

use async_trait::async_trait;
use futures::Stream;
use opencode_chat_core::ChatMessage;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ModelError;

/// Observer notified synchronously with each text increment.
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Stream of text increments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// Per-call options.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Cancels the call. Checked at every network await.
    pub cancellation: Option<CancellationToken>,
    /// Progress observer.
    pub on_token: Option<TokenCallback>,
}

impl CallOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the progress observer.
    #[must_use]
    pub fn with_on_token<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_token = Some(Arc::new(callback));
        self
    }

    /// The cancellation token, or a fresh one that is never cancelled.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancellation.clone().unwrap_or_else(CancellationToken::new)
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("cancellation", &self.cancellation)
            .field("on_token", &self.on_token.is_some())
            .finish()
    }
}

/// Result of a single-shot completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    /// All text increments, concatenated in arrival order.
    pub text: String,
    /// The text wrapped as an assistant message.
    pub message: ChatMessage,
    /// Session the reply was produced in. Already deleted.
    pub session_id: String,
}

impl CompletionResult {
    pub(crate) fn new(text: String, session_id: String) -> Self {
        Self {
            message: ChatMessage::assistant(text.clone()),
            text,
            session_id,
        }
    }
}

/// Core chat model trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Get the model name.
    fn name(&self) -> &str;

    /// Get the model system (type tag).
    fn system(&self) -> &str;

    /// Get the full model identifier.
    fn identifier(&self) -> String {
        format!("{}:{}", self.system(), self.name())
    }

    /// Run one prompt/response exchange and return the whole reply.
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<CompletionResult, ModelError>;

    /// Run one prompt/response exchange, yielding text as it arrives.
    ///
    /// Dropping the returned stream early still releases the call's
    /// server-side resources.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<TextStream, ModelError>;
}

/// Boxed model for dynamic dispatch.
pub type BoxedChatModel = Arc<dyn ChatModel>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_call_options_builder() {
        let token = CancellationToken::new();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();

        let options = CallOptions::new()
            .with_cancellation(token.clone())
            .with_on_token(move |t| sink.lock().unwrap().push_str(t));

        token.cancel();
        assert!(options.token().is_cancelled());

        if let Some(callback) = &options.on_token {
            callback("hi");
        }
        assert_eq!(*seen.lock().unwrap(), "hi");
        assert!(format!("{options:?}").contains("on_token: true"));
    }

    #[test]
    fn test_default_token_is_live() {
        assert!(!CallOptions::default().token().is_cancelled());
    }

    #[test]
    fn test_completion_result_wraps_message() {
        let result = CompletionResult::new("Hello".into(), "s1".into());
        assert_eq!(result.message, ChatMessage::assistant("Hello"));
        assert_eq!(result.text, "Hello");
    }
}
