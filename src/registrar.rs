//! Custom URI scheme registration
//!
//! The callback half of the login runs in a process the OS starts when the
//! browser follows `wilma://oauth?...`. Registration tells the OS which
//! command to run, with the activating URL substituted into it.
//!
//! # Platforms
//!
//! - **Linux / BSD**: a desktop entry plus `xdg-mime default`
//! - **Windows**: `HKCU\Software\Classes\<scheme>` through `winreg`

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::Error;
use crate::Result;

/// Placeholder argument replaced by the activating URL
pub const URL_PLACEHOLDER: &str = "{url}";

/// Desktop entry file name used on XDG systems
const DESKTOP_FILE: &str = "wilma-auth-handler.desktop";

/// The command the OS should run for an activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationTemplate {
    pub program: PathBuf,
    /// Arguments; exactly one should be [`URL_PLACEHOLDER`]
    pub args: Vec<String>,
}

impl InvocationTemplate {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Render with the given token in place of the URL
    ///
    /// Every other part goes through `quote`; the URL token is inserted as is.
    fn render(&self, url_token: &str, quote: fn(&str) -> String) -> String {
        let mut parts = vec![quote(&self.program.to_string_lossy())];
        for arg in &self.args {
            if arg == URL_PLACEHOLDER {
                parts.push(url_token.to_string());
            } else {
                parts.push(quote(arg));
            }
        }
        parts.join(" ")
    }

    /// `Exec=` line of a desktop entry; `%u` is the single-URL field code
    pub fn to_desktop_exec(&self) -> String {
        self.render("%u", quote_desktop)
    }

    /// Registry `shell\open\command` default value
    pub fn to_windows_command(&self) -> String {
        self.render("\"%1\"", quote_windows)
    }
}

/// Desktop entry quoting
///
/// Quote, backtick, dollar and backslash get a backslash inside the quotes,
/// then every backslash is doubled again for the string value escape layer.
/// A literal `%` is written `%%` so it is not read as a field code.
fn quote_desktop(part: &str) -> String {
    let mut quoted = String::with_capacity(part.len() + 2);
    quoted.push('"');
    for c in part.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push_str("\\\\");
        }
        match c {
            '\\' => quoted.push_str("\\\\"),
            '%' => quoted.push_str("%%"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Windows paths cannot contain quotes, so wrapping is enough
fn quote_windows(part: &str) -> String {
    format!("\"{}\"", part)
}

/// OS capability binding a URI scheme to a command
#[async_trait]
pub trait SchemeRegistrar: Send + Sync {
    /// Registrar name for diagnostics
    fn name(&self) -> &str;

    /// Route `scheme://` activations to `template`, replacing any previous handler
    async fn register(&self, scheme: &str, template: &InvocationTemplate) -> Result<()>;

    /// Remove the handler for `scheme`
    async fn unregister(&self, scheme: &str) -> Result<()>;
}

/// Pick the registrar for the running platform
#[cfg(windows)]
pub fn system_registrar() -> Result<Box<dyn SchemeRegistrar>> {
    Ok(Box::new(WindowsRegistrar))
}

/// Pick the registrar for the running platform
#[cfg(all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android")))]
pub fn system_registrar() -> Result<Box<dyn SchemeRegistrar>> {
    Ok(Box::new(XdgRegistrar::for_current_user()?))
}

/// Pick the registrar for the running platform
#[cfg(not(any(
    windows,
    all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
)))]
pub fn system_registrar() -> Result<Box<dyn SchemeRegistrar>> {
    Err(Error::Registration(format!(
        "URI scheme registration is not supported on {}",
        std::env::consts::OS
    )))
}

/// Registrar for freedesktop.org systems
#[derive(Debug, Clone)]
pub struct XdgRegistrar {
    applications_dir: PathBuf,
    xdg_mime: String,
}

impl XdgRegistrar {
    pub fn new(applications_dir: impl Into<PathBuf>, xdg_mime: impl Into<String>) -> Self {
        Self {
            applications_dir: applications_dir.into(),
            xdg_mime: xdg_mime.into(),
        }
    }

    /// `~/.local/share/applications` and the `xdg-mime` on `PATH`
    pub fn for_current_user() -> Result<Self> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            Error::Registration("Could not determine the user data directory".to_string())
        })?;
        Ok(Self::new(data_dir.join("applications"), "xdg-mime"))
    }

    pub fn desktop_file(&self) -> PathBuf {
        self.applications_dir.join(DESKTOP_FILE)
    }
}

/// Contents of the desktop entry handling `scheme`
pub fn desktop_entry(scheme: &str, template: &InvocationTemplate) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Wilma login callback\n\
         Exec={}\n\
         Terminal=true\n\
         NoDisplay=true\n\
         MimeType=x-scheme-handler/{};\n",
        template.to_desktop_exec(),
        scheme
    )
}

#[async_trait]
impl SchemeRegistrar for XdgRegistrar {
    fn name(&self) -> &str {
        "xdg"
    }

    async fn register(&self, scheme: &str, template: &InvocationTemplate) -> Result<()> {
        let path = self.desktop_file();
        tokio::fs::create_dir_all(&self.applications_dir)
            .await
            .map_err(|e| Error::Registration(format!("Failed to create {}: {}", self.applications_dir.display(), e)))?;
        tokio::fs::write(&path, desktop_entry(scheme, template))
            .await
            .map_err(|e| Error::Registration(format!("Failed to write {}: {}", path.display(), e)))?;
        tracing::debug!("Wrote desktop entry {}", path.display());

        let mime = format!("x-scheme-handler/{}", scheme);
        run_command(&self.xdg_mime, &["default", DESKTOP_FILE, mime.as_str()]).await
    }

    async fn unregister(&self, _scheme: &str) -> Result<()> {
        let path = self.desktop_file();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Registration(format!("Failed to remove {}: {}", path.display(), e))),
        }
    }
}

/// Registrar writing the per-user classes hive
#[cfg(windows)]
#[derive(Debug, Clone, Default)]
pub struct WindowsRegistrar;

#[cfg(windows)]
impl WindowsRegistrar {
    const CLASSES: &'static str = r"Software\Classes";

    fn write_class(scheme: &str, command: &str) -> std::io::Result<()> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;

        let classes = RegKey::predef(HKEY_CURRENT_USER).create_subkey(Self::CLASSES)?.0;
        let (class, _) = classes.create_subkey(scheme)?;
        class.set_value("", &format!("URL:{}", scheme))?;
        class.set_value("URL Protocol", &"")?;

        let (open, _) = class.create_subkey(r"shell\open\command")?;
        open.set_value("", &command)
    }

    fn delete_class(scheme: &str) -> std::io::Result<()> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;

        let path = format!(r"{}\{}", Self::CLASSES, scheme);
        match RegKey::predef(HKEY_CURRENT_USER).delete_subkey_all(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(windows)]
#[async_trait]
impl SchemeRegistrar for WindowsRegistrar {
    fn name(&self) -> &str {
        "windows-registry"
    }

    async fn register(&self, scheme: &str, template: &InvocationTemplate) -> Result<()> {
        let command = template.to_windows_command();
        Self::write_class(scheme, &command)
            .map_err(|e| Error::Registration(format!("Failed to write registry class {}: {}", scheme, e)))?;
        tracing::debug!("Registered {}:// as {}", scheme, command);
        Ok(())
    }

    async fn unregister(&self, scheme: &str) -> Result<()> {
        Self::delete_class(scheme)
            .map_err(|e| Error::Registration(format!("Failed to delete registry class {}: {}", scheme, e)))
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Registration(format!("Failed to run {}: {}", program, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Error::Registration(format!(
            "{} exited with code {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
