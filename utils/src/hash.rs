//! Audit hashing.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the input.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Salted audit hash: SHA-256 of `"{salt}:{value}"`.
///
/// The salt must stay constant for the lifetime of a deployment so the
/// same submitter hashes to the same value across requests.
#[must_use]
pub fn audit_hash(salt: &str, value: &str) -> String {
    sha256_hex(&format!("{salt}:{value}"))
}

#[cfg(test)]
mod tests {
    use super::{audit_hash, sha256_hex};

    #[test]
    fn hex_digest_is_stable() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn salt_changes_the_hash() {
        assert_ne!(audit_hash("s1", "203.0.113.10"), audit_hash("s2", "203.0.113.10"));
        assert_eq!(audit_hash("s1", "x"), sha256_hex("s1:x"));
    }
}
