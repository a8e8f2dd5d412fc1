//! Conversation sanitization.
//!
//! Raw client messages pass through here before anything else reads
//! them: override idioms are neutralized, content is bounded, and the
//! window is trimmed newest-first without reordering.

use std::sync::LazyLock;

use regex::Regex;

use juleha_types::{ChatMessage, IncomingMessage, Role};
use juleha_utils::truncate_chars;

static SYSTEM_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)begin\s+system.*?end\s+system").expect("system block pattern")
});

static SYSTEM_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbegin\s+system\b").expect("system marker pattern"));

static OVERRIDE_IDIOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ignore|disregard|forget)\s+(all\s+|any\s+)?(previous|prior|above|earlier|your)\s+(instructions|rules|prompts|messages|training)\b",
    )
    .expect("override idiom pattern")
});

static ROLE_OVERRIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\byou\s+are\s+now\s+(the\s+)?(system|root|admin|administrator|developer)\b")
        .expect("role override pattern")
});

/// Replace instruction-override idioms, `BEGIN SYSTEM … END SYSTEM`
/// blocks, and role-override phrases with literal placeholders.
#[must_use]
pub fn strip_prompt_overrides(text: &str) -> String {
    let text = SYSTEM_BLOCK.replace_all(text, "[filtered-system-block]");
    let text = SYSTEM_MARKER.replace_all(&text, "[filtered-system-block]");
    let text = OVERRIDE_IDIOM.replace_all(&text, "[filtered-override]");
    ROLE_OVERRIDE.replace_all(&text, "[filtered-role]").into_owned()
}

/// Bounds applied by [`sanitize_conversation`].
#[derive(Debug, Clone, Copy)]
pub struct SanitizeLimits {
    /// Per-message character cap after stripping.
    pub max_message_chars: usize,
    /// Hard cap on messages kept before windowing.
    pub max_messages: usize,
    /// Running character budget for the newest-first window.
    pub max_total_chars: usize,
    /// Cap on user messages within the window.
    pub max_user_messages: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            max_message_chars: 1_800,
            max_messages: 24,
            max_total_chars: 10_000,
            max_user_messages: 12,
        }
    }
}

/// Sanitize a raw conversation into model-ready messages.
///
/// Messages with unknown roles or empty content are dropped. The last
/// `max_messages` survivors are windowed newest-to-oldest while the
/// running total stays within `max_total_chars` and the user-message
/// count within `max_user_messages`; original order is preserved.
#[must_use]
pub fn sanitize_conversation(
    messages: &[IncomingMessage],
    limits: SanitizeLimits,
) -> Vec<ChatMessage> {
    let mut cleaned: Vec<ChatMessage> = messages
        .iter()
        .filter_map(|message| {
            let role = Role::parse(&message.role)?;
            let text = message.content.extract_text();
            let text = strip_prompt_overrides(&text);
            let text = truncate_chars(text.trim(), limits.max_message_chars).trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(ChatMessage::new(role.as_str(), text))
        })
        .collect();

    if cleaned.len() > limits.max_messages {
        cleaned.drain(..cleaned.len() - limits.max_messages);
    }

    let mut kept = Vec::with_capacity(cleaned.len());
    let mut total_chars = 0usize;
    let mut user_count = 0usize;
    for message in cleaned.into_iter().rev() {
        let chars = message.content.chars().count();
        if total_chars + chars > limits.max_total_chars {
            break;
        }
        let is_user = message.role == "user";
        if is_user && user_count + 1 > limits.max_user_messages {
            break;
        }
        total_chars += chars;
        if is_user {
            user_count += 1;
        }
        kept.push(message);
    }
    kept.reverse();
    kept
}
