//! Security policy: input classification, conversation sanitization,
//! output redaction, and the prompt-leak guard.
//!
//! Everything here is a pure function over precompiled pattern tables,
//! so the pipeline can be tested with the real classifier and the
//! classifier can be tested without the pipeline.

mod classify;
mod guard;
mod redact;
mod sanitize;

pub use classify::{is_harmful_intent, is_prompt_injection};
pub use guard::output_leaks_prompt;
pub use redact::{redact_header, redact_secrets};
pub use sanitize::{SanitizeLimits, sanitize_conversation, strip_prompt_overrides};
