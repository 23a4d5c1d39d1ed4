//! Message content: single or multimodal items.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AgentError, ErrorCode};

/// Kind of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Video,
    File,
}

/// Payload of a content item: either text (also URLs and base64 strings) or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl ContentValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

/// A single typed piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub value: ContentValue,
    #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ContentItem {
    pub fn new(kind: ContentKind, value: ContentValue, mime_type: Option<String>) -> Self {
        Self {
            kind,
            value,
            mime_type,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ContentKind::Text, ContentValue::Text(text.into()), None)
    }

    /// Binary image data with its MIME type.
    pub fn image_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::new(
            ContentKind::Image,
            ContentValue::Bytes(data),
            Some(mime_type.into()),
        )
    }

    /// An image referenced by URL (or an existing `data:` URI).
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::new(ContentKind::Image, ContentValue::Text(url.into()), None)
    }

    /// Text of a text item; `None` for every other kind.
    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            ContentKind::Text => self.value.as_text(),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.as_text().is_some()
    }
}

/// Message content: one item, or an ordered array of items.
///
/// Array order is presentation order and is preserved end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Single(ContentItem),
    Multi(Vec<ContentItem>),
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Single(ContentItem::text(text))
    }

    /// The empty text content used for assistant placeholders.
    pub fn empty() -> Self {
        Self::text("")
    }

    /// All items in presentation order.
    pub fn items(&self) -> &[ContentItem] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Multi(items) => items,
        }
    }

    /// Text of plain-text content (a single text item); `None` otherwise.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Single(item) => item.as_text(),
            Self::Multi(_) => None,
        }
    }

    /// Whether this is the untouched placeholder: a single empty text item.
    pub fn is_empty_text(&self) -> bool {
        self.as_text().is_some_and(str::is_empty)
    }

    /// Concatenation of every text item, ignoring other kinds.
    pub fn joined_text(&self) -> String {
        self.items().iter().filter_map(ContentItem::as_text).collect()
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<ContentItem> for Content {
    fn from(item: ContentItem) -> Self {
        Self::Single(item)
    }
}

/// Caller input to a chat turn, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput {
    Text(String),
    Items(Vec<ContentItem>),
    Content(Content),
}

impl ChatInput {
    /// Normalize into message content. A bare string becomes a single text item.
    pub fn into_content(self) -> Result<Content, AgentError> {
        match self {
            Self::Text(text) => Ok(Content::text(text)),
            Self::Items(items) => match items.len() {
                0 => Err(AgentError::content(
                    ErrorCode::EmptyContent,
                    "chat input contains no content items",
                )),
                _ => Ok(Content::Multi(items)),
            },
            Self::Content(Content::Multi(items)) => Self::Items(items).into_content(),
            Self::Content(content) => Ok(content),
        }
    }
}

impl From<&str> for ChatInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ChatInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<ContentItem> for ChatInput {
    fn from(item: ContentItem) -> Self {
        Self::Content(Content::Single(item))
    }
}

impl From<Vec<ContentItem>> for ChatInput {
    fn from(items: Vec<ContentItem>) -> Self {
        Self::Items(items)
    }
}

impl From<Content> for ChatInput {
    fn from(content: Content) -> Self {
        Self::Content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn bare_string_normalizes_to_single_text_item() {
        let content = ChatInput::from("hi").into_content().unwrap();
        assert_eq!(content, Content::Single(ContentItem::text("hi")));
        assert_eq!(content.as_text(), Some("hi"));
    }

    #[test]
    fn empty_item_list_is_a_content_error() {
        let err = ChatInput::from(Vec::<ContentItem>::new())
            .into_content()
            .unwrap_err();
        assert!(err.is(ErrorKind::Content, ErrorCode::EmptyContent));
    }

    #[test]
    fn multimodal_order_is_preserved() {
        let items = vec![
            ContentItem::text("look"),
            ContentItem::image_bytes(vec![1, 2, 3], "image/png"),
            ContentItem::text("here"),
        ];
        let content = ChatInput::from(items.clone()).into_content().unwrap();
        assert_eq!(content.items(), items.as_slice());
        assert_eq!(content.joined_text(), "lookhere");
        assert_eq!(content.as_text(), None);
    }

    #[test]
    fn placeholder_detection() {
        assert!(Content::empty().is_empty_text());
        assert!(!Content::text("x").is_empty_text());
        assert!(!Content::Multi(vec![ContentItem::text("")]).is_empty_text());
    }

    #[test]
    fn content_item_serializes_with_type_tag() {
        let json = serde_json::to_value(ContentItem::image_url("https://x/y.png")).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["value"], "https://x/y.png");
        assert!(json.get("mimeType").is_none());
    }
}
