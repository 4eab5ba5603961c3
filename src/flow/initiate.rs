//! Login initiator

use std::io::{BufRead, Write};

use reqwest::Client;
use url::Url;

use crate::auth::{build_authorization_url, Pkce, SCHEME};
use crate::error::Error;
use crate::handoff::{HandoffRecord, Mailbox};
use crate::portal::{fetch_configuration, OpenIdProvider, Portal};
use crate::registrar::{InvocationTemplate, SchemeRegistrar};
use crate::Result;

/// Starts a login and hands it off to the callback process
pub struct Initiator<'a, M> {
    client: Client,
    registrar: &'a dyn SchemeRegistrar,
    mailbox: &'a M,
    template: InvocationTemplate,
    open_browser: bool,
}

impl<'a, M: Mailbox<HandoffRecord>> Initiator<'a, M> {
    pub fn new(
        client: Client,
        registrar: &'a dyn SchemeRegistrar,
        mailbox: &'a M,
        template: InvocationTemplate,
    ) -> Self {
        Self {
            client,
            registrar,
            mailbox,
            template,
            open_browser: true,
        }
    }

    /// Print the URL only instead of launching a browser
    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// Run the first half of the login against `host`
    ///
    /// The provider is chosen by reading one line from `input`. Returns the
    /// authorization URL the user was sent to.
    pub async fn run<R: BufRead, W: Write>(
        &self,
        host: &str,
        input: &mut R,
        output: &mut W,
    ) -> Result<Url> {
        tracing::debug!("Registering {}:// with {}", SCHEME, self.registrar.name());
        self.registrar.register(SCHEME, &self.template).await?;

        let portal = Portal::new(self.client.clone(), host)?;
        let providers = portal.providers().await?;
        let provider = prompt_provider(&providers, input, output)?;
        tracing::info!("Using provider {}", provider.name);

        let configuration = fetch_configuration(&self.client, &provider.configuration).await?;
        let pkce = Pkce::generate();
        let auth_url = build_authorization_url(&configuration, provider, &pkce.challenge)?;

        self.mailbox.put(&HandoffRecord {
            client_id: provider.client_id.clone(),
            verifier: pkce.verifier.into_secret(),
            token_endpoint: configuration.token_endpoint,
            host: portal.base_url().to_string(),
            configuration: provider.configuration.clone(),
        })?;

        writeln!(output, "\nIf the browser doesn't open, visit this URL:\n{}\n", auth_url)?;
        if self.open_browser {
            if let Err(e) = open::that(auth_url.as_str()) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        Ok(auth_url)
    }
}

fn prompt_provider<'p, R: BufRead, W: Write>(
    providers: &'p [OpenIdProvider],
    input: &mut R,
    output: &mut W,
) -> Result<&'p OpenIdProvider> {
    for (i, provider) in providers.iter().enumerate() {
        writeln!(output, "{}: {}", i + 1, provider.name)?;
    }
    write!(output, "\nSelect provider: ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(Error::InvalidSelection("no provider selected".to_string()));
    }
    let index = parse_selection(&line, providers.len())?;
    Ok(&providers[index])
}

/// Turn a 1-based choice into an index below `count`
pub fn parse_selection(line: &str, count: usize) -> Result<usize> {
    let trimmed = line.trim();
    let choice: usize = trimmed
        .parse()
        .map_err(|_| Error::InvalidSelection(format!("{:?} is not a number", trimmed)))?;
    if choice == 0 || choice > count {
        return Err(Error::InvalidSelection(format!(
            "{} is not between 1 and {}",
            choice, count
        )));
    }
    Ok(choice - 1)
}
