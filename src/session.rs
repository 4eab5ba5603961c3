//! Portal session cookies
//!
//! The final artifact of a login: cookie name to value, written to
//! `cookies.json` for whatever tool wants to talk to the portal next.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// Cookie that carries the authenticated portal session
pub const SESSION_COOKIE: &str = "Wilma2SID";

/// Session cookies keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from raw `Set-Cookie` header values
    ///
    /// Later headers win when a name repeats.
    pub fn from_set_cookie<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut jar = Self::new();
        for header in headers {
            if let Some((name, value)) = parse_set_cookie(header) {
                jar.insert(name, value);
            } else {
                tracing::warn!("Ignoring malformed Set-Cookie header");
            }
        }
        jar
    }

    /// Build a jar from every `Set-Cookie` header of a response
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_set_cookie(
            headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| match value.to_str() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring non-UTF-8 Set-Cookie header");
                        None
                    }
                }),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split `name=value; Attr; Attr=x` into `(name, value)`
///
/// Attributes are discarded. The value keeps any `=` it contains.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Write the jar as JSON, replacing any previous file
pub fn save_cookies(path: &Path, jar: &CookieJar) -> Result<()> {
    let content = serde_json::to_string_pretty(jar)
        .map_err(|e| Error::Storage(format!("Failed to encode cookies: {}", e)))?;
    crate::handoff::write_private(path, content.as_bytes())
}

/// Read a previously saved jar
pub fn load_cookies(path: &Path) -> Result<Option<CookieJar>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    let jar = serde_json::from_str(&content)
        .map_err(|e| Error::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;
    Ok(Some(jar))
}
