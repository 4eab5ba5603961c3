//! Authorization code exchange

use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::Result;
use crate::error::Error;
use super::authorize::REDIRECT_URI;

/// Tokens returned by the provider's token endpoint
///
/// Only held in memory for the duration of the callback process.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .finish()
    }
}

/// Token exchange request
#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    grant_type: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
    code: &'a str,
}

/// Exchange an authorization code for tokens
pub async fn exchange_token(
    client: &Client,
    token_endpoint: &str,
    client_id: &str,
    verifier: &str,
    code: &str,
) -> Result<TokenResponse> {
    let request = TokenExchangeRequest {
        client_id,
        grant_type: "authorization_code",
        redirect_uri: REDIRECT_URI,
        code_verifier: verifier,
        code,
    };

    tracing::debug!("Exchanging authorization code at {}", token_endpoint);
    let response = client.post(token_endpoint).form(&request).send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::TokenExchange(format!("{} {}", status, error_text.trim())));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| Error::TokenExchange(format!("Unexpected token response: {}", e)))
}
