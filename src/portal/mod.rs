//! Wilma portal client
//!
//! Covers the two portal endpoints the login flow touches:
//! - `GET /index_json` for the provider list and a session id
//! - `POST /api/v1/external/openid/login` to trade OpenID tokens for cookies
//!
//! Plus the provider's OpenID discovery document, which lives elsewhere.

mod models;

pub use models::{IndexJson, OpenIdConfiguration, OpenIdProvider};

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::TokenResponse;
use crate::error::Error;
use crate::session::CookieJar;
use crate::Result;
use models::LoginPayload;

/// Portal used when no host is given
pub const DEFAULT_PORTAL: &str = "https://turku.inschool.fi";

const INDEX_PATH: &str = "/index_json";
const OPENID_LOGIN_PATH: &str = "/api/v1/external/openid/login";

/// Build the HTTP client shared by every request in a process
pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()?;
    Ok(client)
}

/// A single Wilma portal
#[derive(Debug, Clone)]
pub struct Portal {
    client: Client,
    base_url: Url,
}

impl Portal {
    pub fn new(client: Client, host: &str) -> Result<Self> {
        let base_url = Url::parse(host)
            .map_err(|e| Error::Config(format!("Invalid portal URL {:?}: {}", host, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!("Portal URL must be http(s): {}", host)));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid portal endpoint {}: {}", path, e)))
    }

    /// Fetch the portal index
    pub async fn fetch_index(&self) -> Result<IndexJson> {
        let url = self.endpoint(INDEX_PATH)?;
        tracing::debug!("Fetching portal index from {}", url);
        let response = self.client.get(url).send().await?;
        read_json(response, "portal index").await
    }

    /// The OpenID providers the portal offers
    pub async fn providers(&self) -> Result<Vec<OpenIdProvider>> {
        match self.fetch_index().await?.oidc_providers {
            Some(providers) if !providers.is_empty() => Ok(providers),
            _ => Err(Error::Protocol(format!(
                "{} does not offer OpenID login",
                self.base_url
            ))),
        }
    }

    /// Fetch a fresh session id for the post-authentication login
    pub async fn fetch_session_id(&self) -> Result<String> {
        Ok(self.fetch_index().await?.session_id)
    }

    /// Trade OpenID tokens for portal session cookies
    ///
    /// Anything but `200 OK` is a rejection.
    pub async fn login(
        &self,
        configuration: &str,
        client_id: &str,
        tokens: &TokenResponse,
        session_id: &str,
    ) -> Result<CookieJar> {
        let payload = LoginPayload {
            configuration,
            client_id,
            access_token: &tokens.access_token,
            session_id,
            id_token: &tokens.id_token,
        };
        let payload = serde_json::to_string(&payload)
            .map_err(|e| Error::Protocol(format!("Failed to encode login payload: {}", e)))?;

        let url = self.endpoint(OPENID_LOGIN_PATH)?;
        tracing::debug!("Posting OpenID login to {}", url);
        let response = self
            .client
            .post(url)
            .form(&[("payload", payload)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::LoginRejected(status));
        }

        let jar = CookieJar::from_headers(response.headers());
        if jar.is_empty() {
            return Err(Error::Protocol(
                "Login response carried no session cookies".to_string(),
            ));
        }
        if !jar.contains(crate::session::SESSION_COOKIE) {
            tracing::warn!(
                "Login succeeded but no {} cookie was set",
                crate::session::SESSION_COOKIE
            );
        }
        Ok(jar)
    }
}

/// Fetch a provider's OpenID discovery document
pub async fn fetch_configuration(client: &Client, url: &str) -> Result<OpenIdConfiguration> {
    let url = Url::parse(url)
        .map_err(|e| Error::Protocol(format!("Invalid configuration URL {:?}: {}", url, e)))?;
    tracing::debug!("Fetching OpenID configuration from {}", url);
    let response = client.get(url).send().await?;
    read_json(response, "OpenID configuration").await
}

/// Decode a JSON body, treating bad status and bad shape as protocol errors
async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Protocol(format!("{} returned status {}", what, status)));
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| Error::Protocol(format!("Malformed {}: {}", what, e)))
}
