//! Authentication module for the OpenID Connect PKCE flow
//!
//! This module provides:
//! - PKCE code generation
//! - Authorization URL construction and redirect parsing
//! - Authorization code exchange at the provider's token endpoint

mod pkce;
mod authorize;
mod token;

pub use pkce::{generate_code_challenge, generate_code_verifier, CodeVerifier, Pkce, CODE_CHALLENGE_METHOD};
pub use authorize::{build_authorization_url, extract_code, REDIRECT_URI, SCHEME};
pub use token::{exchange_token, TokenResponse};
