//! wilma-auth - OpenID Connect login for Wilma school portals
//!
//! A PKCE authorization code flow split over two processes. `login` picks a
//! provider and opens the browser; the provider redirects to `wilma://oauth`,
//! the OS starts `callback`, and that process trades the code for tokens and
//! the tokens for portal session cookies.

pub mod auth;
pub mod config;
pub mod error;
pub mod flow;
pub mod handoff;
pub mod portal;
pub mod registrar;
pub mod session;
pub mod ui;

pub use error::{Error, Result};
