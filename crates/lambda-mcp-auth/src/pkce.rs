//! PKCE (RFC 7636) and `state` generation for authorization requests
//!
//! The verifier is 32 random bytes, base64url without padding; the
//! challenge is `BASE64URL(SHA256(verifier))` with method `S256`.

use oauth2::{CsrfToken, PkceCodeChallenge};
use std::fmt;

/// The only challenge method produced here
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Verifier and matching challenge
///
/// The verifier is kept out of `Debug` output.
#[derive(Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Fresh random pair
    pub fn generate() -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        Self {
            verifier: verifier.secret().clone(),
            challenge: challenge.as_str().to_string(),
        }
    }

    /// Sent later with the token request
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Sent with the authorization request
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Always `S256`
    pub fn method(&self) -> &'static str {
        CODE_CHALLENGE_METHOD
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Random URL-safe `state` value (32 bytes of entropy)
pub fn generate_state() -> String {
    CsrfToken::new_random_len(32).secret().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use sha2::{Digest, Sha256};

    fn is_url_safe(value: &str) -> bool {
        value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_challenge_matches_verifier() {
        let pair = PkcePair::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pair.verifier().as_bytes()));
        assert_eq!(pair.challenge(), expected);
        assert_eq!(pair.method(), "S256");
    }

    #[test]
    fn test_verifier_shape() {
        let pair = PkcePair::generate();
        assert_eq!(pair.verifier().len(), 43);
        assert!(is_url_safe(pair.verifier()));
        assert!(is_url_safe(pair.challenge()));
    }

    #[test]
    fn test_pairs_are_unique() {
        assert_ne!(PkcePair::generate().verifier(), PkcePair::generate().verifier());
    }

    #[test]
    fn test_state() {
        let state = generate_state();
        assert_eq!(state.len(), 43);
        assert!(is_url_safe(&state));
        assert_ne!(state, generate_state());
    }

    #[test]
    fn test_debug_hides_verifier() {
        let pair = PkcePair::generate();
        assert!(!format!("{pair:?}").contains(pair.verifier()));
    }
}
