//! Authorization request and redirect handling
//!
//! The redirect target is a custom URI scheme rather than a local HTTP
//! server: the OS hands `wilma://oauth?code=...` to a fresh process.

use url::Url;
use crate::Result;
use crate::error::Error;
use crate::portal::{OpenIdConfiguration, OpenIdProvider};
use super::pkce::CODE_CHALLENGE_METHOD;

/// Custom URI scheme the OS routes back to us
pub const SCHEME: &str = "wilma";

/// Redirect URI registered with every provider; must match [`SCHEME`]
pub const REDIRECT_URI: &str = "wilma://oauth";

/// Build the URL the browser is sent to
///
/// Only the challenge goes out here; the verifier stays on disk.
pub fn build_authorization_url(
    config: &OpenIdConfiguration,
    provider: &OpenIdProvider,
    challenge: &str,
) -> Result<Url> {
    let mut url = Url::parse(&config.authorization_endpoint).map_err(|e| {
        Error::Protocol(format!(
            "Invalid authorization endpoint {:?}: {}",
            config.authorization_endpoint, e
        ))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", &provider.client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", &provider.scope)
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
        .append_pair("code_challenge", challenge);

    Ok(url)
}

/// Pull the authorization code out of the URL the OS activated us with
pub fn extract_code(redirect_url: &str) -> Result<String> {
    let url = Url::parse(redirect_url)
        .map_err(|e| Error::Protocol(format!("Invalid redirect URL: {}", e)))?;

    if url.scheme() != SCHEME {
        return Err(Error::Protocol(format!(
            "Redirect URL has scheme {:?}, expected {:?}",
            url.scheme(),
            SCHEME
        )));
    }

    let mut code = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(err) = error {
        let description = error_description.unwrap_or_else(|| "no description".to_string());
        return Err(Error::Authorization(format!("{} - {}", err, description)));
    }

    match code {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(Error::MissingCode),
    }
}
