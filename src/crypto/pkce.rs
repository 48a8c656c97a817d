//! PKCE (RFC 7636) verifier and S256 challenge for the sign-in handshake.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// The size of the verifier entropy in bytes.
const VERIFIER_SIZE: usize = 32;

/// Generates a new code verifier (43 URL-safe characters).
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_SIZE];
    OsRng.fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Derives the S256 code challenge for `verifier`.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}
