//! # opencode-chat-models
//!
//! Chat model adapter for opencode-style agent servers.
//!
//! Each call creates a throwaway server session, submits the conversation as
//! prompt parts, reads the reply from the server's event stream, and deletes
//! the session again, whatever happened in between.
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use opencode_chat_core::ChatMessage;
//! use opencode_chat_models::{CallOptions, ChatModel, OpenCodeChatModel, OpenCodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenCodeConfig::builder("http://localhost:4096", "anthropic", "claude-3-5-sonnet")
//!         .temperature(0.2)
//!         .build()?;
//!     let model = OpenCodeChatModel::new(config);
//!
//!     let messages = [ChatMessage::user("Say hello")];
//!     let mut stream = model.stream(&messages, &CallOptions::new()).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod opencode;
pub mod stream;
pub mod types;

mod session;

pub use client::{ByteStream, OpenCodeClient};
pub use config::{MaxTokens, OpenCodeConfig, OpenCodeConfigBuilder, ResponseMode};
pub use error::{ModelError, ModelResult, Step};
pub use model::{BoxedChatModel, CallOptions, ChatModel, CompletionResult, TextStream, TokenCallback};
pub use opencode::OpenCodeChatModel;
pub use stream::{EventStream, SseLineDecoder, StreamFrameError};
pub use types::{AgentInfo, ProviderCatalog, ProviderInfo, ProviderModel, Session};

pub use tokio_util::sync::CancellationToken;
