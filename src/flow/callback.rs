//! Callback handler: redirect URL in, portal cookies out

use std::fmt;
use std::path::PathBuf;

use reqwest::Client;

use crate::auth::{exchange_token, extract_code};
use crate::handoff::{HandoffRecord, Mailbox};
use crate::portal::Portal;
use crate::session::{save_cookies, CookieJar};
use crate::Result;

/// Progress of the callback process
///
/// Moves strictly forward; any error ends in `Failed` with no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Start,
    CodeExtracted,
    TokenObtained,
    SessionIdFetched,
    LoggedIn,
    CookiesPersisted,
    Failed,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Start => "start",
            ExchangeState::CodeExtracted => "code extracted",
            ExchangeState::TokenObtained => "token obtained",
            ExchangeState::SessionIdFetched => "session id fetched",
            ExchangeState::LoggedIn => "logged in",
            ExchangeState::CookiesPersisted => "cookies persisted",
            ExchangeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Finishes a login started by [`super::Initiator`]
pub struct CallbackHandler<M> {
    client: Client,
    mailbox: M,
    cookies_path: PathBuf,
    state: ExchangeState,
}

impl<M: Mailbox<HandoffRecord>> CallbackHandler<M> {
    pub fn new(client: Client, mailbox: M, cookies_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            mailbox,
            cookies_path: cookies_path.into(),
            state: ExchangeState::Start,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Drive the exchange to completion for one activation URL
    pub async fn run(&mut self, redirect_url: &str) -> Result<CookieJar> {
        match self.drive(redirect_url).await {
            Ok(jar) => Ok(jar),
            Err(e) => {
                tracing::debug!("Login failed after step '{}': {}", self.state, e);
                self.state = ExchangeState::Failed;
                Err(e)
            }
        }
    }

    async fn drive(&mut self, redirect_url: &str) -> Result<CookieJar> {
        // Before touching the network or the handoff
        let code = extract_code(redirect_url)?;
        self.advance(ExchangeState::CodeExtracted);

        let record = self.mailbox.take()?;
        tracing::debug!("Resuming login for {} at {}", record.client_id, record.host);

        let tokens = exchange_token(
            &self.client,
            &record.token_endpoint,
            &record.client_id,
            &record.verifier,
            &code,
        )
        .await?;
        self.advance(ExchangeState::TokenObtained);

        // A fresh index fetch; the session id from `login` is not reused
        let portal = Portal::new(self.client.clone(), &record.host)?;
        let session_id = portal.fetch_session_id().await?;
        self.advance(ExchangeState::SessionIdFetched);

        let jar = portal
            .login(&record.configuration, &record.client_id, &tokens, &session_id)
            .await?;
        self.advance(ExchangeState::LoggedIn);

        save_cookies(&self.cookies_path, &jar)?;
        self.advance(ExchangeState::CookiesPersisted);

        Ok(jar)
    }

    fn advance(&mut self, next: ExchangeState) {
        tracing::info!("Login step: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::handoff::FileMailbox;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        dir: TempDir,
        mock_server: MockServer,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                mock_server: MockServer::start().await,
            }
        }

        fn mailbox(&self) -> FileMailbox<HandoffRecord> {
            FileMailbox::new(self.dir.path().join("handoff.json"))
        }

        fn cookies_path(&self) -> PathBuf {
            self.dir.path().join("cookies.json")
        }

        fn store_handoff(&self) {
            let uri = self.mock_server.uri();
            self.mailbox()
                .put(&HandoffRecord {
                    client_id: "abc".to_string(),
                    verifier: "the-verifier".to_string(),
                    token_endpoint: format!("{}/token", uri),
                    host: format!("{}/", uri),
                    configuration: "https://idp.example/conf".to_string(),
                })
                .unwrap();
        }

        fn handler(&self) -> CallbackHandler<FileMailbox<HandoffRecord>> {
            CallbackHandler::new(Client::new(), self.mailbox(), self.cookies_path())
        }

        async fn mount_token_and_index(&self) {
            Mock::given(method("POST"))
                .and(path("/token"))
                .and(body_string_contains("code_verifier=the-verifier"))
                .and(body_string_contains("code=auth-code"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "at",
                    "id_token": "it"
                })))
                .expect(1)
                .mount(&self.mock_server)
                .await;
            Mock::given(method("GET"))
                .and(path("/index_json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "LoginResult": "Failed",
                    "SessionID": "fresh-session",
                    "ApiVersion": 19
                })))
                .expect(1)
                .mount(&self.mock_server)
                .await;
        }
    }

    #[tokio::test]
    async fn test_full_callback() {
        let fixture = Fixture::new().await;
        fixture.store_handoff();
        fixture.mount_token_and_index().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/external/openid/login"))
            .and(body_string_contains("fresh-session"))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("Set-Cookie", "Wilma2SID=sid-1; Path=/; HttpOnly")
                    .append_header("Set-Cookie", "Wilma2LoginID=login-1; Secure"),
            )
            .expect(1)
            .mount(&fixture.mock_server)
            .await;

        let mut handler = fixture.handler();
        let jar = handler.run("wilma://oauth?code=auth-code").await.unwrap();
        assert_eq!(handler.state(), ExchangeState::CookiesPersisted);
        assert_eq!(jar.get("Wilma2SID"), Some("sid-1"));

        let saved = crate::session::load_cookies(&fixture.cookies_path()).unwrap();
        assert_eq!(saved, Some(jar));
        assert!(!fixture.mailbox().is_occupied());
    }

    #[tokio::test]
    async fn test_login_rejected_writes_no_cookies() {
        let fixture = Fixture::new().await;
        fixture.store_handoff();
        fixture.mount_token_and_index().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/external/openid/login"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&fixture.mock_server)
            .await;

        let mut handler = fixture.handler();
        let result = handler.run("wilma://oauth?code=auth-code").await;
        assert!(matches!(result, Err(Error::LoginRejected(_))));
        assert_eq!(handler.state(), ExchangeState::Failed);
        assert!(!fixture.cookies_path().exists());
    }

    #[tokio::test]
    async fn test_missing_code_before_network() {
        let fixture = Fixture::new().await;
        fixture.store_handoff();
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&fixture.mock_server)
            .await;

        let mut handler = fixture.handler();
        let result = handler.run("wilma://oauth?state=whatever").await;
        assert!(matches!(result, Err(Error::MissingCode)));
        assert_eq!(handler.state(), ExchangeState::Failed);
        // The pending login is still there for the real redirect
        assert!(fixture.mailbox().is_occupied());
    }

    #[tokio::test]
    async fn test_without_pending_login() {
        let fixture = Fixture::new().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&fixture.mock_server)
            .await;

        let mut handler = fixture.handler();
        let result = handler.run("wilma://oauth?code=auth-code").await;
        assert!(matches!(result, Err(Error::MissingState)));
    }

    #[tokio::test]
    async fn test_replayed_redirect_is_rejected() {
        let fixture = Fixture::new().await;
        fixture.store_handoff();
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .expect(1)
            .mount(&fixture.mock_server)
            .await;

        let first = fixture.handler().run("wilma://oauth?code=auth-code").await;
        assert!(matches!(first, Err(Error::TokenExchange(_))));

        let second = fixture.handler().run("wilma://oauth?code=auth-code").await;
        assert!(matches!(second, Err(Error::MissingState)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ExchangeState::SessionIdFetched.to_string(), "session id fetched");
    }
}
