//! # opencode-chat-core
//!
//! Core types for the opencode-chat adapter.
//!
//! This crate holds everything that does not touch the network:
//!
//! - **Messages**: host-side conversational messages ([`ChatMessage`])
//! - **Parts**: typed prompt parts understood by the agent server ([`PromptPart`])
//! - **Events**: decoded server-pushed stream events ([`StreamEvent`])
//! - **Translation**: messages to prompt parts ([`to_prompt_parts`])
//!
//! ## Example
//!
//! ```rust
//! use opencode_chat_core::{to_prompt_parts, ChatMessage};
//!
//! let parts = to_prompt_parts(&[ChatMessage::user("Say hello")]);
//! assert_eq!(parts.len(), 1);
//! assert_eq!(parts[0].as_text(), Some("Say hello"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod events;
pub mod messages;
pub mod parts;
pub mod translate;

pub use events::{StreamEvent, STATUS_COMPLETED};
pub use messages::{ChatMessage, ContentItem, MessageContent, Role, TypedContent};
pub use parts::{
    collect_text, FilePart, PartIds, PromptPart, ReasoningPart, TextPart, ToolPart,
};
pub use translate::to_prompt_parts;
