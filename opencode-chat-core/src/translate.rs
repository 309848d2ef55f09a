//! Host messages to prompt parts.

use crate::messages::ChatMessage;
use crate::parts::PromptPart;

/// Flatten host messages into the prompt parts submitted to the server.
///
/// A string-content message yields one text part. A list-content message
/// yields one text part per plain-string or `text`-tagged item; items with any
/// other tag are dropped. Order is preserved message by message, item by item.
#[must_use]
pub fn to_prompt_parts(messages: &[ChatMessage]) -> Vec<PromptPart> {
    messages
        .iter()
        .flat_map(|message| message.content.text_pieces())
        .map(PromptPart::text)
        .collect()
}
