//! Host-side conversational message types.
//!
//! ## Example
//!
//! ```rust
//! use opencode_chat_core::messages::{ChatMessage, ContentItem};
//!
//! let messages = vec![
//!     ChatMessage::system("You are terse."),
//!     ChatMessage::user(vec![ContentItem::from("Say"), ContentItem::text(" hello")]),
//! ];
//! assert_eq!(messages[1].text(), "Say hello");
//! ```

pub mod chat;
pub mod content;

pub use chat::{ChatMessage, Role};
pub use content::{ContentItem, MessageContent, TypedContent};
