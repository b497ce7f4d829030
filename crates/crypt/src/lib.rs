//! Scheme-prefixed password hashes
//!
//! Stored credentials carry their scheme as a prefix, htpasswd-style:
//!
//! - `{PLAIN}password`
//! - `{SHA}` + base64(SHA-1(password))
//! - `{SSHA}` + base64(SHA-1(password ‖ salt) ‖ salt)
//!
//! [`verify`] dispatches on the prefix and compares digests in constant
//! time. SHA-1 is not a password KDF by modern standards; these schemes
//! exist for compatibility with existing htpasswd files.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use thiserror::Error;

const SHA1_LEN: usize = 20;

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CryptError>;

/// Credential verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptError {
    /// The stored hash carries a scheme this build does not support
    #[error("unknown password scheme in {0:?}")]
    UnknownScheme(String),

    /// The stored hash is not decodable under its declared scheme
    #[error("malformed {scheme} hash: {reason}")]
    Malformed {
        /// Scheme prefix of the offending hash
        scheme: &'static str,
        /// What failed to decode
        reason: &'static str,
    },
}

/// Encodes a password under the `{PLAIN}` scheme
pub fn plain(password: &str) -> String {
    format!("{{PLAIN}}{password}")
}

/// Encodes a password under the `{SHA}` scheme
pub fn sha(password: &str) -> String {
    let digest = Sha1::digest(password.as_bytes());
    format!("{{SHA}}{}", BASE64.encode(digest))
}

/// Encodes a password under the `{SSHA}` scheme with the given salt
pub fn ssha(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let mut blob = hasher.finalize().to_vec();
    blob.extend_from_slice(salt);
    format!("{{SSHA}}{}", BASE64.encode(blob))
}

/// Checks a password against a scheme-prefixed stored hash
///
/// Returns `Ok(false)` for a well-formed hash that does not match, and an
/// error for unknown schemes or undecodable hashes.
///
/// ```
/// use keel_crypt::{sha, verify};
///
/// let stored = sha("swordfish");
/// assert!(verify("swordfish", &stored).unwrap());
/// assert!(!verify("marlin", &stored).unwrap());
/// ```
pub fn verify(password: &str, encrypted: &str) -> Result<bool> {
    if let Some(rest) = encrypted.strip_prefix("{PLAIN}") {
        return Ok(password.as_bytes().ct_eq(rest.as_bytes()).into());
    }

    if let Some(rest) = encrypted.strip_prefix("{SHA}") {
        let stored = BASE64.decode(rest).map_err(|_| CryptError::Malformed {
            scheme: "{SHA}",
            reason: "invalid base64",
        })?;
        if stored.len() != SHA1_LEN {
            return Err(CryptError::Malformed {
                scheme: "{SHA}",
                reason: "digest length",
            });
        }
        let digest = Sha1::digest(password.as_bytes());
        return Ok(digest.as_slice().ct_eq(&stored).into());
    }

    if let Some(rest) = encrypted.strip_prefix("{SSHA}") {
        let blob = BASE64.decode(rest).map_err(|_| CryptError::Malformed {
            scheme: "{SSHA}",
            reason: "invalid base64",
        })?;
        if blob.len() < SHA1_LEN {
            return Err(CryptError::Malformed {
                scheme: "{SSHA}",
                reason: "digest length",
            });
        }
        let (stored, salt) = blob.split_at(SHA1_LEN);
        let mut hasher = Sha1::new();
        hasher.update(password.as_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();
        return Ok(digest.as_slice().ct_eq(stored).into());
    }

    Err(CryptError::UnknownScheme(
        encrypted.chars().take(16).collect(),
    ))
}
