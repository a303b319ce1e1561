use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Constant-time string comparison (for equal-length inputs).
pub fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Compare a submitted password against the configured one without leaking
/// the length or matching prefix through timing.
pub fn verify_password(submitted: &str, expected: &str) -> bool {
    !expected.is_empty() && safe_equal(&sha256_hex(submitted), &sha256_hex(expected))
}
