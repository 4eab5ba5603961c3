//! The two halves of a login
//!
//! - [`Initiator`] runs in `wilma-auth login`: picks a provider, stores the
//!   handoff and sends the user to the browser
//! - [`CallbackHandler`] runs in `wilma-auth callback`, started by the OS when
//!   the provider redirects to `wilma://oauth`

mod initiate;
mod callback;

pub use initiate::{parse_selection, Initiator};
pub use callback::{CallbackHandler, ExchangeState};

use std::path::{Path, PathBuf};
use crate::registrar::{InvocationTemplate, URL_PLACEHOLDER};

/// Command the OS runs on activation
///
/// The state directory is passed along so both processes agree on where the
/// handoff lives; it must already be absolute.
pub fn callback_template(program: impl Into<PathBuf>, state_dir: &Path) -> InvocationTemplate {
    let args = vec![
        "--data-dir".to_string(),
        state_dir.to_string_lossy().into_owned(),
        "callback".to_string(),
        "--pause".to_string(),
        URL_PLACEHOLDER.to_string(),
    ];
    InvocationTemplate::new(program, args)
}
