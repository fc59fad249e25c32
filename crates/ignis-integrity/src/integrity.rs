// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints and digest-prefix checks.

use ignis_core::error::IgnisError;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
///
/// This is both the conversion-cache key and the digest printed into the
/// verification report.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check that the digest of `data` begins with `prefix`, returning the full
/// digest on success. Case-sensitive.
pub fn verify_prefix(data: &[u8], prefix: &str) -> Result<String, IgnisError> {
    let digest = hash_bytes(data);
    if !digest.starts_with(prefix) {
        return Err(IgnisError::IntegrityMismatch {
            expected: prefix.to_owned(),
            actual: digest,
        });
    }
    Ok(digest)
}

/// True for exactly 64 lowercase hex characters.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
