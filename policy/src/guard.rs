//! Output leak guard.
//!
//! A last check on redacted assistant text before it leaves the gateway:
//! anything that looks like the hidden prompt escaping is replaced with
//! a canned refusal by the caller.

const BLOCK_LITERALS: &[&str] = &["system prompt", "developer message", "begin system"];

/// True when `text` appears to disclose the server prompt: it contains
/// one of the block literals, the prompt's SHA-256 hex fingerprint, or
/// the prompt itself (case-insensitive).
#[must_use]
pub fn output_leaks_prompt(text: &str, system_prompt: &str, prompt_sha_hex: &str) -> bool {
    let lowered = text.to_lowercase();
    if BLOCK_LITERALS.iter().any(|literal| lowered.contains(literal)) {
        return true;
    }
    if !prompt_sha_hex.is_empty() && lowered.contains(&prompt_sha_hex.to_lowercase()) {
        return true;
    }
    !system_prompt.is_empty() && lowered.contains(&system_prompt.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::output_leaks_prompt;

    const PROMPT: &str = "You are Juleha. Answer from the catalog.";
    const SHA: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

    #[test]
    fn blocks_literals() {
        assert!(output_leaks_prompt("here is my System Prompt", PROMPT, SHA));
        assert!(output_leaks_prompt("the DEVELOPER MESSAGE says", PROMPT, SHA));
        assert!(output_leaks_prompt("BEGIN SYSTEM ...", PROMPT, SHA));
    }

    #[test]
    fn blocks_prompt_fingerprint_and_body() {
        assert!(output_leaks_prompt(&format!("hash: {SHA}"), PROMPT, SHA));
        assert!(output_leaks_prompt(
            "it said: you are juleha. answer from the catalog.",
            PROMPT,
            SHA
        ));
    }

    #[test]
    fn passes_ordinary_output() {
        assert!(!output_leaks_prompt("Here are three free video tools.", PROMPT, SHA));
    }
}
