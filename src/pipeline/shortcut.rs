//! Internet-shortcut synthesis for link-type modules
//!
//! A url module carries no downloadable bytes; instead of a transfer, the
//! pipeline writes a small platform-native shortcut file whose target is the
//! remote URL: a `.desktop` entry on POSIX systems, a `.URL` file on Windows.

/// Extension of the platform's shortcut format
#[cfg(windows)]
pub(crate) const SHORTCUT_EXTENSION: &str = "URL";
/// Extension of the platform's shortcut format
#[cfg(not(windows))]
pub(crate) const SHORTCUT_EXTENSION: &str = "desktop";

/// File name the shortcut is written under
pub(crate) fn shortcut_file_name(filename: &str) -> String {
    format!("{filename}.{SHORTCUT_EXTENSION}")
}

/// Render the shortcut file body for a link target
#[cfg(windows)]
pub(crate) fn shortcut_contents(name: &str, url: &str) -> String {
    let _ = name; // .URL files carry no display name field
    format!("[InternetShortcut]\r\nURL={url}\r\n")
}

/// Render the shortcut file body for a link target
#[cfg(not(windows))]
pub(crate) fn shortcut_contents(name: &str, url: &str) -> String {
    format!(
        "[Desktop Entry]\nEncoding=UTF-8\nName={name}\nType=Link\nURL={url}\nIcon=text-html\n"
    )
}
