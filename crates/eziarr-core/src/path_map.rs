//! Translation of local filesystem paths into the namespace the upstream
//! services see.
//!
//! The downloads root is usually mounted at one place inside this process
//! (for example `/app/downloads`) and at another on the host running the
//! media services (for example `C:\Imports`). Import commands must carry the
//! path as the service sees it.

use serde_json::{Map, Value as JsonValue};

use crate::models::setting_keys;

/// Separator convention of the target namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// Forward slashes, left untouched.
    Posix,
    /// Backslashes, with an upper-case drive letter.
    Windows,
}

impl PathStyle {
    /// Style of the platform this process runs on.
    pub fn native() -> Self {
        if std::path::MAIN_SEPARATOR == '\\' {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    /// Infer the target style from a remote prefix, falling back to native.
    pub fn infer(remote_prefix: &str) -> Self {
        let bytes = remote_prefix.as_bytes();
        let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
        if has_drive || remote_prefix.contains('\\') {
            PathStyle::Windows
        } else {
            Self::native()
        }
    }
}

/// Rewrite `path` from the local namespace to the remote one.
///
/// The prefix is replaced only when both prefixes are non-empty and `path`
/// starts with the local prefix. Windows style then normalizes every
/// separator to `\` and capitalizes a lower-case drive letter.
pub fn translate_path(path: &str, local_prefix: &str, remote_prefix: &str, style: PathStyle) -> String {
    let mut out = match path.strip_prefix(local_prefix) {
        Some(rest) if !local_prefix.is_empty() && !remote_prefix.is_empty() => {
            format!("{remote_prefix}{rest}")
        }
        _ => path.to_string(),
    };

    if style == PathStyle::Windows {
        out = out.replace('/', "\\");
        let bytes = out.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_lowercase() && bytes[1] == b':' {
            out[..1].make_ascii_uppercase();
        }
    }

    out
}

/// The configured prefix pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMapping {
    pub local_prefix: String,
    pub remote_prefix: String,
}

impl PathMapping {
    pub fn new(local_prefix: impl Into<String>, remote_prefix: impl Into<String>) -> Self {
        Self {
            local_prefix: local_prefix.into(),
            remote_prefix: remote_prefix.into(),
        }
    }

    /// Read the prefixes from the settings map; non-string values count as unset.
    pub fn from_settings(settings: &Map<String, JsonValue>) -> Self {
        let read = |key: &str| {
            settings
                .get(key)
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self::new(
            read(setting_keys::PATH_MAP_LOCAL),
            read(setting_keys::PATH_MAP_REMOTE),
        )
    }

    pub fn is_configured(&self) -> bool {
        !self.local_prefix.is_empty() && !self.remote_prefix.is_empty()
    }

    /// Translate with the style inferred from the remote prefix.
    pub fn translate(&self, path: &str) -> String {
        let style = if self.is_configured() {
            PathStyle::infer(&self.remote_prefix)
        } else {
            PathStyle::native()
        };
        translate_path(path, &self.local_prefix, &self.remote_prefix, style)
    }
}
