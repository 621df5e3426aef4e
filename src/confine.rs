//! Rewriting of path candidates so they cannot leave a jail root.
//!
//! Everything here is pure: candidates are resolved lexically against `/`
//! and re-rooted under the jail, using only the facts in a [`Host`].

use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::trace;
use url::Url;

use crate::confined_path::{ConfinedPath, Placement};
use crate::lexical;
use crate::platform::{Host, Platform};
use crate::value::FsValue;

/// Characters escaped when a confined path is written back into a URL.
const URL_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Absolute path under the host temp directory, to be used as-is.
    Temp(String),
    /// Root-relative remainder, to be joined under a jail root.
    Fragment(String),
}

impl Normalized {
    pub fn as_str(&self) -> &str {
        match self {
            Normalized::Temp(path) | Normalized::Fragment(path) => path,
        }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Normalized::Temp(_))
    }
}

/// Collapse `candidate` as if rooted at the filesystem root.
///
/// `.` and `..` are resolved textually and never climb above the root. With
/// `allow_temp`, a result inside the host temp directory is returned whole;
/// otherwise the platform root (`C:\`, `\\host\share\`) is stripped so the
/// remainder can be joined under a jail.
pub fn normalize(host: &Host, candidate: &str, allow_temp: bool) -> Normalized {
    let platform = host.platform();
    let resolved = lexical::resolve(platform, host.cwd(), &["/", candidate]);

    if allow_temp && lexical::is_within(platform, &resolved, host.temp_dir()) {
        return Normalized::Temp(resolved);
    }

    let strip = lexical::strip_len(platform, &resolved);
    Normalized::Fragment(resolved[strip..].to_string())
}

/// Confine one candidate under `root`, passing through anything that is not a
/// text path, byte path or `file:` URL.
///
/// `root` is resolved against the host working directory first.
pub fn confine_argument(host: &Host, candidate: FsValue, root: &str, allow_temp: bool) -> FsValue {
    let root = lexical::resolve(host.platform(), host.cwd(), &[root]);
    confine_value(host, &root, allow_temp, candidate)
}

pub(crate) fn confine_text(host: &Host, root: &str, candidate: &str, allow_temp: bool) -> ConfinedPath {
    let confined = match normalize(host, candidate, allow_temp) {
        Normalized::Temp(path) => ConfinedPath::new(path, Placement::Temp),
        Normalized::Fragment(fragment) => ConfinedPath::new(
            lexical::join(host.platform(), root, &fragment),
            Placement::Jail,
        ),
    };
    trace!(candidate, confined = %confined, placement = ?confined.placement(), "Confined path");
    confined
}

/// `root` must already be resolved.
pub(crate) fn confine_value(host: &Host, root: &str, allow_temp: bool, candidate: FsValue) -> FsValue {
    match candidate {
        FsValue::Text(text) => FsValue::Text(confine_text(host, root, &text, allow_temp).into_string()),
        FsValue::Bytes(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let confined = confine_text(host, root, &text, allow_temp);
            FsValue::Bytes(Bytes::from(confined.into_string()))
        }
        FsValue::Url(url) if is_file_url(&url) => FsValue::Url(confine_url(host, root, &url, allow_temp)),
        other => other,
    }
}

pub(crate) fn is_file_url(url: &Url) -> bool {
    url.scheme() == "file"
}

fn confine_url(host: &Host, root: &str, url: &Url, allow_temp: bool) -> Url {
    let platform = host.platform();
    let path = url_to_path(platform, url);
    let confined = confine_text(host, root, &path, allow_temp);
    let mut confined = confined.into_string();
    // Directory URLs keep their trailing slash
    if path.ends_with(|c| platform.is_separator(c)) && !confined.ends_with(|c| platform.is_separator(c)) {
        confined.push(platform.separator());
    }
    path_to_url(platform, url, &confined)
}

/// Filesystem path named by a `file:` URL, percent-decoded.
fn url_to_path(platform: Platform, url: &Url) -> String {
    let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
    match platform {
        Platform::Posix => decoded.into_owned(),
        Platform::Windows => {
            let server = url
                .host_str()
                .filter(|server| !server.is_empty() && !server.eq_ignore_ascii_case("localhost"));
            if let Some(server) = server {
                return format!(r"\\{server}{}", decoded.replace('/', r"\"));
            }
            let bytes = decoded.as_bytes();
            // `/C:/dir` names `C:/dir`
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
                decoded[1..].to_string()
            } else {
                decoded.into_owned()
            }
        }
    }
}

/// Copy of `original` pointing at `path`.
fn path_to_url(platform: Platform, original: &Url, path: &str) -> Url {
    let mut url = original.clone();
    match platform {
        Platform::Posix => {
            // file URLs always accept an empty host
            let _ = url.set_host(None);
            url.set_path(&encode(path));
        }
        Platform::Windows => {
            let root = lexical::parse_root(platform, path);
            let server = root
                .device
                .get(2..)
                .and_then(|device| device.split('\\').next())
                .filter(|_| root.unc);
            match server {
                Some(server) if url.set_host(Some(server)).is_ok() => {
                    let rest = &path[2 + server.len()..];
                    url.set_path(&encode(&rest.replace('\\', "/")));
                }
                _ => {
                    let _ = url.set_host(None);
                    let slashed = path.replace('\\', "/");
                    if slashed.starts_with('/') {
                        url.set_path(&encode(&slashed));
                    } else {
                        url.set_path(&format!("/{}", encode(&slashed)));
                    }
                }
            }
        }
    }
    url
}

fn encode(path: &str) -> String {
    utf8_percent_encode(path, URL_PATH).to_string()
}
