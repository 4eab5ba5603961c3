//! Proof Key for Code Exchange, S256 only (RFC 7636)

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::distributions::Uniform;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Sent as `code_challenge_method`; `plain` is never offered
pub const CODE_CHALLENGE_METHOD: &str = "S256";

const VERIFIER_LEN: usize = 64;

/// RFC 7636 `unreserved` characters
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// The secret half of a login
///
/// Lives in the handoff record and is sent to the token endpoint once.
/// `Debug` never shows it.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// 64 random unreserved characters, about 386 bits of entropy
    pub fn generate() -> Self {
        let pick = Uniform::from(0..UNRESERVED.len());
        let secret = rand::thread_rng()
            .sample_iter(pick)
            .take(VERIFIER_LEN)
            .map(|i| UNRESERVED[i] as char)
            .collect();
        Self(secret)
    }

    /// The matching `code_challenge`
    pub fn challenge(&self) -> String {
        generate_code_challenge(&self.0)
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn into_secret(self) -> String {
        self.0
    }
}

impl fmt::Debug for CodeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeVerifier(<redacted>)")
    }
}

/// Verifier plus the challenge that goes into the authorization URL
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: CodeVerifier,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let verifier = CodeVerifier::generate();
        let challenge = verifier.challenge();
        Self { verifier, challenge }
    }
}

/// A fresh verifier as a plain string
pub fn generate_code_verifier() -> String {
    CodeVerifier::generate().into_secret()
}

/// `BASE64URL(SHA256(verifier))`, unpadded
pub fn generate_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_verifier_shape() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), VERIFIER_LEN);
        assert!(
            verifier.bytes().all(|b| UNRESERVED.contains(&b)),
            "Reserved character in {}", verifier
        );
    }

    #[test]
    fn test_known_challenge() {
        // RFC 7636 appendix B
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let verifier = generate_code_verifier();
        assert_eq!(generate_code_challenge(&verifier), generate_code_challenge(&verifier));
    }

    #[test]
    fn test_challenge_is_base64url() {
        let verifier = generate_code_verifier();
        for input in ["", "a", "plain text with spaces", "ü~~~", verifier.as_str()] {
            let challenge = generate_code_challenge(input);
            assert_eq!(challenge.len(), 43);
            assert!(
                !challenge.contains(&['+', '/', '='][..]),
                "Non base64url character in {}", challenge
            );
        }
    }

    #[test]
    fn test_challenges_do_not_collide() {
        let mut verifiers = HashSet::new();
        let mut challenges = HashSet::new();
        for _ in 0..10_000 {
            let pkce = Pkce::generate();
            if verifiers.insert(pkce.verifier.into_secret()) {
                assert!(challenges.insert(pkce.challenge), "Challenge collision");
            }
        }
        assert_eq!(verifiers.len(), challenges.len());
    }

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.challenge, generate_code_challenge(pkce.verifier.secret()));
    }

    #[test]
    fn test_debug_hides_verifier() {
        let pkce = Pkce::generate();
        let printed = format!("{:?}", pkce);
        assert!(!printed.contains(pkce.verifier.secret()));
        assert!(printed.contains(&pkce.challenge));
        assert_eq!(format!("{:?}", pkce.verifier), "CodeVerifier(<redacted>)");
    }
}
