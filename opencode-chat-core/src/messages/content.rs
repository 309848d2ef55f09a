//! Message content types.
//!
//! Host messages carry either a single string or an ordered list of content
//! items. List items are plain strings or objects tagged by `type`.

use serde::{Deserialize, Serialize};

/// Content of a conversational message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Ordered list of content items.
    Items(Vec<ContentItem>),
}

impl MessageContent {
    /// Create text content.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create list content.
    #[must_use]
    pub fn items(items: Vec<ContentItem>) -> Self {
        Self::Items(items)
    }

    /// Get as text if this is text content.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Items(_) => None,
        }
    }

    /// Iterate over the textual pieces of this content, in order.
    ///
    /// Items that are neither plain strings nor `text`-tagged are skipped.
    pub fn text_pieces(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Text(s) => Box::new(std::iter::once(s.as_str())),
            Self::Items(items) => Box::new(items.iter().filter_map(ContentItem::as_text)),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<ContentItem>> for MessageContent {
    fn from(items: Vec<ContentItem>) -> Self {
        Self::Items(items)
    }
}

/// One item of list content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    /// A bare string item.
    Plain(String),
    /// An item tagged by `type`.
    Typed(TypedContent),
}

impl ContentItem {
    /// Create a `text`-tagged item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Typed(TypedContent::Text { text: text.into() })
    }

    /// Create an `image_url` item.
    #[must_use]
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Typed(TypedContent::ImageUrl {
            image_url: serde_json::json!({ "url": url.into() }),
        })
    }

    /// Get the text of this item, if it carries any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Plain(s) => Some(s),
            Self::Typed(TypedContent::Text { text }) => Some(text),
            Self::Typed(_) => None,
        }
    }
}

impl From<&str> for ContentItem {
    fn from(s: &str) -> Self {
        Self::Plain(s.to_string())
    }
}

/// A `type`-tagged content item.
///
/// Tags this crate does not know deserialize as [`TypedContent::Unsupported`]
/// so newer host content types never fail parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedContent {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },
    /// Image reference.
    ImageUrl {
        /// Image URL payload as sent by the host.
        #[serde(default)]
        image_url: serde_json::Value,
    },
    /// Any other tag.
    #[serde(other)]
    Unsupported,
}
