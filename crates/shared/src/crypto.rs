//! Cryptographic utilities for webhook signing and secret generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes behind a generated webhook secret.
const SECRET_BYTES: usize = 32;

/// Optional scheme prefix some senders put in front of the hex digest.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Error type for signing operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Computes the hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
///
/// The digest covers the exact bytes given, so callers must sign the same
/// serialized body they put on the wire.
pub fn sign_hmac_sha256(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex-encoded HMAC-SHA256 signature over `payload`.
///
/// Accepts an optional `sha256=` prefix. The digest comparison is constant
/// time; malformed hex or an unusable key is reported as a mismatch.
pub fn verify_hmac_sha256(secret: &str, payload: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let hex_digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature);

    let expected = match hex::decode(hex_digest) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Generates a URL-safe random secret suitable for signing webhooks.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
