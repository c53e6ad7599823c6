//! # URI Mapping / URI 映射
//!
//! Conversion between `file://` URIs and filesystem paths. The mapping has to agree
//! byte for byte with the editor side, so it is done by hand on top of `url` and
//! `urlencoding` instead of `Url::to_file_path`, and both the POSIX and the Windows
//! rules are available on every platform through [`PathStyle`].
//!
//! `file://` URI 与文件系统路径之间的转换。该映射必须与编辑器端逐字节一致，
//! 因此基于 `url` 和 `urlencoding` 手动实现，而不是使用 `Url::to_file_path`；
//! 通过 [`PathStyle`]，POSIX 与 Windows 两套规则在所有平台上均可使用。

use std::path::PathBuf;

use url::Url;

/// Which platform's path rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Posix,
    Windows,
}

impl PathStyle {
    /// The style of the platform this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    fn separator(self) -> char {
        match self {
            PathStyle::Posix => '/',
            PathStyle::Windows => '\\',
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            PathStyle::Posix => c == '/',
            PathStyle::Windows => c == '/' || c == '\\',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("invalid URI `{uri}`: {reason}")]
    Invalid { uri: String, reason: String },
    #[error("URI `{0}` does not use the file scheme")]
    NotFile(String),
    #[error("non-absolute path `{0}` cannot be converted to a URI")]
    RelativePath(String),
}

fn unescape(uri: &str, component: &str) -> Result<String, UriError> {
    urlencoding::decode(component)
        .map(|s| s.into_owned())
        .map_err(|e| UriError::Invalid {
            uri: uri.to_string(),
            reason: e.to_string(),
        })
}

fn is_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
}

/// The authority of `uri` exactly as written, without any userinfo or port.
fn raw_authority(uri: &str) -> &str {
    let Some((_, rest)) = uri.split_once("//") else {
        return "";
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    match authority.rfind(':') {
        Some(i) if !authority.ends_with(']') => &authority[..i],
        _ => authority,
    }
}

/// Maps a `file://` URI to a path string following `style`'s rules.
pub fn uri_to_path_styled(uri: &str, style: PathStyle) -> Result<String, UriError> {
    let parsed = Url::parse(uri).map_err(|e| UriError::Invalid {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.scheme() != "file" {
        return Err(UriError::NotFile(uri.to_string()));
    }
    let path = unescape(uri, parsed.path())?;
    // `Url` lowercases hosts, so the original spelling is taken from the raw text.
    let host = match parsed.host_str() {
        Some(_) => unescape(uri, raw_authority(uri))?,
        None => String::new(),
    };

    let value = if !host.is_empty() && path.len() > 1 {
        format!("//{host}{path}")
    } else if is_drive_path(&path) {
        let drive = path[1..2].to_ascii_lowercase();
        format!("{drive}{}", &path[2..])
    } else {
        path
    };
    let value = match style {
        PathStyle::Windows => value.replace('/', "\\"),
        PathStyle::Posix => value,
    };
    Ok(normalize(&value, style))
}

/// Maps a `file://` URI to a path on the current platform.
pub fn uri_to_path(uri: &str) -> Result<PathBuf, UriError> {
    uri_to_path_styled(uri, PathStyle::native()).map(PathBuf::from)
}

/// Maps an absolute path to a `file://` URI following `style`'s rules.
pub fn path_to_uri_styled(path: &str, style: PathStyle) -> Result<String, UriError> {
    if !is_absolute(path, style) {
        return Err(UriError::RelativePath(path.to_string()));
    }
    let normalized = normalize(path, style);
    match style {
        PathStyle::Windows => {
            let forward = normalized.replace('\\', "/");
            let escaped = urlencoding::encode(&forward).replace("%2F", "/");
            if escaped.starts_with("//") {
                Ok(format!("file:{escaped}"))
            } else {
                Ok(format!("file:///{escaped}"))
            }
        }
        PathStyle::Posix => {
            let escaped = urlencoding::encode(&normalized).replace("%2F", "/");
            Ok(format!("file://{escaped}"))
        }
    }
}

/// Maps an absolute path on the current platform to a `file://` URI.
pub fn path_to_uri(path: &str) -> Result<String, UriError> {
    path_to_uri_styled(path, PathStyle::native())
}

/// Like [`path_to_uri`], but yields an empty string for anything that is not an
/// absolute path. Used for diagnostic locations, where an unknown origin is expected.
pub fn path_to_uri_lenient(path: &str) -> String {
    path_to_uri(path).unwrap_or_default()
}

/// Splits a Windows path into its prefix (`c:` or `\\host\share`) and the rest.
fn split_windows_prefix(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return path.split_at(2);
    }
    let sep = |c: char| PathStyle::Windows.is_separator(c);
    let mut chars = path.chars();
    if chars.next().is_some_and(sep) && chars.next().is_some_and(sep) {
        let after = &path[2..];
        let host_end = after.find(sep).map(|i| i + 2);
        let Some(host_end) = host_end else {
            return (path, "");
        };
        let share_end = path[host_end + 1..]
            .find(sep)
            .map(|i| i + host_end + 1)
            .unwrap_or(path.len());
        return path.split_at(share_end);
    }
    ("", path)
}

pub fn is_absolute(path: &str, style: PathStyle) -> bool {
    match style {
        PathStyle::Posix => path.starts_with('/'),
        PathStyle::Windows => {
            let (prefix, rest) = split_windows_prefix(path);
            if prefix.len() > 2 {
                // UNC share
                return true;
            }
            !prefix.is_empty() && rest.starts_with(|c: char| style.is_separator(c))
        }
    }
}

/// Lexical normalization: collapses repeated separators, drops `.` components and
/// resolves `..` against preceding components. Never touches the filesystem.
pub fn normalize(path: &str, style: PathStyle) -> String {
    let sep = style.separator();
    let (prefix, rest) = match style {
        PathStyle::Windows => split_windows_prefix(path),
        PathStyle::Posix => ("", path),
    };
    let prefix = match style {
        PathStyle::Windows => prefix.replace('/', "\\"),
        PathStyle::Posix => prefix.to_string(),
    };
    let rooted = rest.starts_with(|c: char| style.is_separator(c));
    let trailing = rest.len() > 1 && rest.ends_with(|c: char| style.is_separator(c));

    let mut parts: Vec<&str> = Vec::new();
    for component in rest.split(|c: char| style.is_separator(c)) {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let mut out = prefix;
    if rooted {
        out.push(sep);
    }
    out.push_str(&parts.join(&sep.to_string()));
    if trailing && !parts.is_empty() {
        out.push(sep);
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}
