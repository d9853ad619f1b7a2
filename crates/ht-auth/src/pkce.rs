use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{AuthError, Result};

/// Raw entropy behind one code verifier. 32 bytes encodes to 43 base64url
/// characters, above the provider's minimum.
const VERIFIER_BYTES: usize = 32;

/// Alphabet and length of the random half of the state parameter. The
/// provider's consent page expects the official launcher's format: 26
/// characters, each drawn from A-Z2-7 by masking a random byte to 5 bits.
const STATE_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const STATE_LEN: usize = 26;

/// Anti-CSRF state parameter payload. The callback port rides along so the
/// provider's consent page can forward the browser to the right loopback
/// listener. The port is serialized as a string to match the wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateParam {
    pub state: String,
    pub port: String,
}

/// Generate a fresh PKCE code verifier.
///
/// Fails only when the platform random source does, which is fatal for the
/// whole attempt.
pub fn new_verifier() -> Result<String> {
    let mut bytes = [0u8; VERIFIER_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| AuthError::Crypto(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the S256 code challenge for a verifier. Deterministic; the
/// provider recomputes this from the verifier at exchange time.
pub fn challenge_from(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Build the opaque state parameter: random fixed-alphabet string plus the
/// callback port, JSON-wrapped and standard-base64 encoded.
pub fn new_state_param(port: u16) -> Result<String> {
    let mut bytes = [0u8; STATE_LEN];
    getrandom::fill(&mut bytes).map_err(|e| AuthError::Crypto(e.to_string()))?;
    let state: String = bytes
        .iter()
        .map(|b| STATE_ALPHABET[(b & 0x1F) as usize] as char)
        .collect();

    let payload = StateParam {
        state,
        port: port.to_string(),
    };
    Ok(STANDARD.encode(serde_json::to_vec(&payload)?))
}

/// Decode a state parameter back into its payload.
pub fn decode_state_param(encoded: &str) -> Result<StateParam> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| AuthError::Crypto(format!("invalid state parameter: {e}")))?;
    Ok(serde_json::from_slice(&raw)?)
}
