//! # opencode-chat
//!
//! Drive an opencode-style coding-agent server through a plain chat model
//! interface.
//!
//! Each call creates an ephemeral server session, submits the conversation
//! as typed prompt parts, reconstructs the reply from the server's event
//! stream, and deletes the session on every exit path.
//!
//! ## Quick Start
//!
//! ```ignore
//! use opencode_chat::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = OpenCodeConfig::builder("http://localhost:4096", "anthropic", "claude-3-5-sonnet")
//!         .build()?;
//!     let model = OpenCodeChatModel::new(config);
//!
//!     let result = model
//!         .invoke(&[ChatMessage::user("What does this repo do?")], &CallOptions::new())
//!         .await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`opencode_chat_core`] - Chat messages, prompt parts, server events,
//!   and message translation
//! - [`opencode_chat_models`] - Configuration, transport, event stream
//!   decoding, and the [`OpenCodeChatModel`] orchestrator
//!
//! ## Streaming
//!
//! ```ignore
//! use opencode_chat::prelude::*;
//! use futures::StreamExt;
//!
//! let options = CallOptions::new().with_cancellation(token.clone());
//! let mut stream = model.stream(&[ChatMessage::user("Tell me a story")], &options).await?;
//!
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Direct completion functions for one-off calls.
///
/// # Example
///
/// ```rust,ignore
/// use opencode_chat::direct::complete;
///
/// let result = complete("anthropic/claude-3-5-sonnet", &[ChatMessage::user("Hello!")]).await?;
/// ```
pub mod direct;

/// Messages, prompt parts, and server events.
pub use opencode_chat_core as core;
/// Configuration, transport, and the chat model.
pub use opencode_chat_models as models;

pub use opencode_chat_core::{ChatMessage, MessageContent, PromptPart, Role};
pub use opencode_chat_models::{
    CallOptions, ChatModel, CompletionResult, ModelError, ModelResult, OpenCodeChatModel,
    OpenCodeClient, OpenCodeConfig,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::direct::{complete, complete_stream, DirectError};
    pub use opencode_chat_core::{ChatMessage, ContentItem, MessageContent, Role};
    pub use opencode_chat_models::{
        BoxedChatModel, CallOptions, CancellationToken, ChatModel, CompletionResult, MaxTokens,
        ModelError, ModelResult, OpenCodeChatModel, OpenCodeConfig, ResponseMode, TextStream,
    };
}
