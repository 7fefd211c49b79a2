//! Proof Key for Code Exchange for the hosted sign-in round trip.
//!
//! `/auth` keeps a fresh verifier in the cookie session and sends only its
//! S256 challenge to the auth service. The code handed to the callback can
//! only be exchanged together with that verifier, so a code issued to
//! another browser cannot sign this one in.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Value of the `code_challenge_method` parameter.
pub const CHALLENGE_METHOD: &str = "s256";

/// 32 random bytes give the 43-character verifier RFC 7636 recommends.
const VERIFIER_BYTES: usize = 32;

/// A one-time code verifier.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The S256 challenge sent to the auth service.
    #[must_use]
    pub fn challenge(&self) -> String {
        challenge(&self.0)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CodeVerifier([REDACTED])")
    }
}

/// S256 challenge for a verifier: base64url(sha256(verifier)), unpadded.
#[must_use]
pub fn challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_matches_rfc_vector() {
        assert_eq!(
            challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_verifiers_are_unique_and_url_safe() {
        let a = CodeVerifier::generate();
        let b = CodeVerifier::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(
            a.as_str()
                .bytes()
                .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_')
        );
        assert_eq!(a.challenge(), challenge(a.as_str()));
        assert!(!format!("{a:?}").contains(a.as_str()));
    }
}
