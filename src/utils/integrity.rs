//! SHA-256 helpers used to pin a model file to its sidecar metadata.

use crate::utils::error::{Result, SwipError};
use sha2::{Digest, Sha256};

pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_digest(data))
}

/// Compares the digest of `data` with `expected_hex`, ignoring case and
/// surrounding whitespace.
pub fn verify_sha256(data: &[u8], expected_hex: &str) -> Result<()> {
    let expected = expected_hex.trim().to_ascii_lowercase();
    let actual = sha256_hex(data);
    if expected != actual {
        return Err(SwipError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_to_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn verify_ignores_case_and_whitespace() {
        let expected = "  BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD\n";
        assert!(verify_sha256(b"abc", expected).is_ok());
    }

    #[test]
    fn verify_reports_both_digests() {
        match verify_sha256(b"abc", "00") {
            Err(SwipError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, "00");
                assert_eq!(actual, sha256_hex(b"abc"));
            }
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }
}
