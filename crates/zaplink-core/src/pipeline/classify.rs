//! Content-type dispatch table for inbound messages.
//!
//! Maps the provider's raw `MessageContent` onto the persisted
//! `(kind, content, media_url)` triple. The match is exhaustive; an
//! unrecognized payload classifies as `Unknown` with no content.

use zaplink_types::message::MessageKind;
use zaplink_types::provider::MessageContent;

/// Normalized classification of a raw message payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedContent {
    pub kind: MessageKind,
    pub content: Option<String>,
    pub media_url: Option<String>,
}

/// Classify a raw payload into its persisted representation.
///
/// Captioned media keep the caption as content (empty string when the
/// provider sent none, matching audio/sticker which carry no text at all);
/// documents keep the file name; locations are rendered as a fixed
/// "Latitude/Longitude" string; shared contact cards get a fixed label.
pub fn classify(content: &MessageContent) -> ClassifiedContent {
    match content {
        MessageContent::Text { body } => ClassifiedContent {
            kind: MessageKind::Text,
            content: Some(body.clone()),
            media_url: None,
        },
        MessageContent::Image { caption, url } => ClassifiedContent {
            kind: MessageKind::Image,
            content: Some(caption.clone().unwrap_or_default()),
            media_url: url.clone(),
        },
        MessageContent::Video { caption, url } => ClassifiedContent {
            kind: MessageKind::Video,
            content: Some(caption.clone().unwrap_or_default()),
            media_url: url.clone(),
        },
        MessageContent::Audio { url } => ClassifiedContent {
            kind: MessageKind::Audio,
            content: None,
            media_url: url.clone(),
        },
        MessageContent::Document { file_name, url } => ClassifiedContent {
            kind: MessageKind::Document,
            content: Some(file_name.clone().unwrap_or_default()),
            media_url: url.clone(),
        },
        MessageContent::Sticker { url } => ClassifiedContent {
            kind: MessageKind::Sticker,
            content: None,
            media_url: url.clone(),
        },
        MessageContent::Location { latitude, longitude } => ClassifiedContent {
            kind: MessageKind::Location,
            content: Some(format!("Latitude: {latitude}, Longitude: {longitude}")),
            media_url: None,
        },
        MessageContent::ContactCard => ClassifiedContent {
            kind: MessageKind::Contact,
            content: Some("Shared contact".to_string()),
            media_url: None,
        },
        MessageContent::Unknown => ClassifiedContent {
            kind: MessageKind::Unknown,
            content: None,
            media_url: None,
        },
    }
}
