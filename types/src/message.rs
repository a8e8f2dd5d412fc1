//! Chat wire types.
//!
//! Clients send content as a plain string, an array of text parts, or a
//! `{text}` object; [`MessageContent`] models that as a sum type with a
//! single extractor. Other shapes fail deserialization.

use serde::{Deserialize, Serialize};

/// Accepted conversation roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a trimmed role label. Anything but user/assistant is refused.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One element of a multi-part content array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text(String),
    Object {
        #[serde(default)]
        text: Option<String>,
    },
}

impl ContentPart {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Object { text } => text.as_deref(),
        }
    }
}

/// Message content: `string | [part] | {text}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Structured { text: String },
}

impl MessageContent {
    /// Extract textual content, joining multi-part arrays with newlines.
    /// Empty parts are skipped.
    #[must_use]
    pub fn extract_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured { text } => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::text)
                .filter(|t| !t.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A message as received from the client. The role is validated later,
/// during sanitization, so malformed roles reject the message rather
/// than the whole payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Body of `POST /juleha-chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

/// A sanitized message, and the shape sent to upstream models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// Per-URL verification outcome surfaced to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedLink {
    pub url: String,
    pub canonical_url: String,
    pub final_url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub note: String,
}

/// Success body of `POST /juleha-chat`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub assistant_text: String,
    pub route_label: String,
    pub verified_links: Vec<VerifiedLink>,
}

#[cfg(test)]
mod tests {
    use super::{ChatRequest, MessageContent};

    #[test]
    fn content_accepts_string() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(req.messages[0].content.extract_text(), "hi");
    }

    #[test]
    fn content_accepts_text_parts() {
        let raw = r#"{"messages":[{"role":"user","content":[{"type":"text","text":"a"},"b",{"text":""}]}]}"#;
        let req: ChatRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.messages[0].content.extract_text(), "a\nb");
    }

    #[test]
    fn content_accepts_text_object() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":{"text":"obj"}}]}"#)
                .unwrap();
        assert_eq!(req.messages[0].content.extract_text(), "obj");
    }

    #[test]
    fn content_rejects_numbers() {
        let parsed: Result<MessageContent, _> = serde_json::from_str("42");
        assert!(parsed.is_err());
    }
}
