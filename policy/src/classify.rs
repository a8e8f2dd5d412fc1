//! Input classification predicates.
//!
//! Deliberately blunt: these run on every request before any model call,
//! so the pattern tables favor recall over nuance. Refusal wording lives
//! with the pipeline; this module only answers yes/no.

use std::sync::LazyLock;

use regex::RegexSet;

static PROMPT_INJECTION: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // Instruction-override idioms
        r"(?i)\b(ignore|disregard|forget)\s+(all\s+|any\s+)?(previous|prior|above|earlier|your)\s+(instructions|rules|prompts|messages|training)\b",
        r"(?i)\boverride\s+(the\s+|your\s+)?(instructions|rules|system)\b",
        // Attempts to extract the hidden prompt or policies
        r"(?i)\b(reveal|show|print|dump|expose|display|repeat|leak|output)\b.{0,40}\b(system|developer|hidden|internal)\s+(prompt|prompts|message|messages|instructions|policy|policies)\b",
        // Secrets fishing
        r"(?i)\b(api[ _-]?keys?|access\s+tokens?|secrets?|passwords?|credentials?|private\s+keys?)\b",
        // Known environment variable families
        r"\b(OPENROUTER|NEON|JULEHA|DATABASE)_[A-Z0-9_]+\b",
        r"(?i)\benvironment\s+variables?\b",
        // Role-override phrases
        r"(?i)\byou\s+are\s+now\s+(the\s+)?(system|root|admin|administrator|developer)\b",
        // Literal system-block marker
        r"(?i)\bBEGIN\s+SYSTEM\b",
    ])
    .expect("prompt injection patterns")
});

static HARMFUL_INTENT: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(malware|ransomware|trojan|keylogger|spyware|rootkit|virus(es)?)\b",
        r"(?i)\b(exploit|sql\s+injection|sqli|xss|cross-site\s+scripting|privilege\s+escalation|ddos|denial\s+of\s+service)\b",
        r"(?i)\b(phish(ing|er)?|credential\s+(theft|stealing|harvesting)|steal\s+(passwords|credentials|accounts))\b",
        r"(?i)\b(bomb|explosive|weapon)s?\b",
        r"(?i)\b(self-harm|suicide|kill\s+myself|hurt\s+myself)\b",
    ])
    .expect("harmful intent patterns")
});

/// True when the text reads as an attempt to subvert or extract the
/// system prompt, policies, or secrets.
#[must_use]
pub fn is_prompt_injection(text: &str) -> bool {
    PROMPT_INJECTION.is_match(text)
}

/// True when the text reads as a request for harm.
#[must_use]
pub fn is_harmful_intent(text: &str) -> bool {
    HARMFUL_INTENT.is_match(text)
}
