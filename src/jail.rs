use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::confine::{self, Normalized};
use crate::confined_path::ConfinedPath;
use crate::error::JailError;
use crate::lexical;
use crate::platform::Host;
use crate::value::FsValue;

/// What a jail does with a path argument it cannot confine.
///
/// Text, byte and `file:` URL paths are always confined. The policy only
/// decides the fate of everything else: non-`file:` URLs, descriptors where
/// none is expected, and provider-specific objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Reject with [`JailError::UnsupportedArgument`] before the provider is called.
    #[default]
    Strict,
    /// Forward unchanged. Such values get **no** confinement at all; a
    /// provider that interprets them as paths can be led outside the jail.
    Tolerant,
}

/// Jail settings that can be loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JailOptions {
    /// Let paths under the host temp directory through unchanged.
    pub allow_temp: bool,
    pub policy: Policy,
}

impl Default for JailOptions {
    fn default() -> Self {
        Self {
            allow_temp: true,
            policy: Policy::Strict,
        }
    }
}

/// Which candidate shapes an argument position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    /// Text or byte paths only, always placed under the root even when they
    /// name the temp directory.
    Text,
    /// Text, byte, or `file:` URL paths.
    Path,
    /// Any path, or an already-open descriptor.
    PathOrDescriptor,
}

/// A confinement boundary: every path it produces lies under its root, or
/// under the host temp directory when that is allowed.
#[derive(Debug, Clone)]
pub struct Jail {
    root: String,
    options: JailOptions,
    host: Host,
}

impl Jail {
    /// Create a jail at `root` with default options on the current host.
    ///
    /// The root is resolved lexically; it does not need to exist. Errors if
    /// it is empty or names a filesystem root (`/`, `C:\`, `\\server\share`).
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, JailError> {
        Self::builder(root).build()
    }

    pub fn with_options<P: AsRef<Path>>(root: P, options: JailOptions) -> Result<Self, JailError> {
        Self::builder(root).options(options).build()
    }

    /// Like [`new`](Self::new), but resolves symlinks in the root first.
    ///
    /// The root must exist and be a directory.
    pub fn canonicalized<P: AsRef<Path>>(root: P) -> Result<Self, JailError> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(JailError::InvalidRoot {
                root,
                reason: "not a directory",
            });
        }
        Self::new(root)
    }

    pub fn builder<P: AsRef<Path>>(root: P) -> JailBuilder {
        JailBuilder {
            root: root.as_ref().to_path_buf(),
            options: JailOptions::default(),
            host: None,
        }
    }

    /// Returns the resolved root path.
    pub fn root(&self) -> &Path {
        Path::new(&self.root)
    }

    pub fn root_str(&self) -> &str {
        &self.root
    }

    pub fn options(&self) -> &JailOptions {
        &self.options
    }

    pub fn allows_temp(&self) -> bool {
        self.options.allow_temp
    }

    pub fn policy(&self) -> Policy {
        self.options.policy
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Normalize `candidate` under this jail's host and temp setting.
    pub fn normalize(&self, candidate: &str) -> Normalized {
        confine::normalize(&self.host, candidate, self.options.allow_temp)
    }

    /// Confine a text path.
    ///
    /// Never fails: `..` is clamped at the root, absolute paths are re-rooted
    /// under the jail.
    #[must_use = "use the returned path, not the original input"]
    pub fn join<P: AsRef<str>>(&self, candidate: P) -> ConfinedPath {
        confine::confine_text(&self.host, &self.root, candidate.as_ref(), self.options.allow_temp)
    }

    /// Confine any candidate, passing through shapes that are not paths.
    ///
    /// This ignores the jail's [`Policy`]; see [`confine_strict`](Self::confine_strict).
    pub fn confine(&self, candidate: FsValue) -> FsValue {
        confine::confine_value(&self.host, &self.root, self.options.allow_temp, candidate)
    }

    /// Confine a candidate, rejecting anything that is not a path (or, with
    /// `accept_fd`, a descriptor).
    pub fn confine_strict(&self, candidate: FsValue, accept_fd: bool) -> Result<FsValue, JailError> {
        let accepts = if accept_fd {
            Accepts::PathOrDescriptor
        } else {
            Accepts::Path
        };
        self.confine_with(candidate, accepts, Policy::Strict, "confine", 1)
    }

    /// True when `path` normalizes to the root or a descendant of it.
    pub fn contains<P: AsRef<str>>(&self, path: P) -> bool {
        let platform = self.host.platform();
        let resolved = lexical::resolve(platform, self.host.cwd(), &[path.as_ref()]);
        lexical::is_within(platform, &resolved, &self.root)
    }

    /// Confine argument `position` (1-based) of `operation` under this jail's policy.
    pub(crate) fn confine_arg(
        &self,
        operation: &'static str,
        position: usize,
        candidate: FsValue,
        accepts: Accepts,
    ) -> Result<FsValue, JailError> {
        self.confine_with(candidate, accepts, self.options.policy, operation, position)
    }

    fn confine_with(
        &self,
        candidate: FsValue,
        accepts: Accepts,
        policy: Policy,
        operation: &'static str,
        position: usize,
    ) -> Result<FsValue, JailError> {
        let confinable = match &candidate {
            FsValue::Text(_) | FsValue::Bytes(_) => true,
            FsValue::Url(url) => accepts != Accepts::Text && confine::is_file_url(url),
            _ => false,
        };
        if confinable {
            let allow_temp = self.options.allow_temp && accepts != Accepts::Text;
            return Ok(confine::confine_value(&self.host, &self.root, allow_temp, candidate));
        }
        if accepts == Accepts::PathOrDescriptor && matches!(candidate, FsValue::Fd(_)) {
            return Ok(candidate);
        }

        let kind = candidate.kind();
        match policy {
            Policy::Strict => Err(JailError::UnsupportedArgument {
                operation,
                position,
                kind,
            }),
            Policy::Tolerant => {
                warn!(operation, position, kind, "Forwarding argument without confinement");
                Ok(candidate)
            }
        }
    }
}

impl AsRef<Path> for Jail {
    fn as_ref(&self) -> &Path {
        self.root()
    }
}

/// Builder for [`Jail`].
#[derive(Debug, Clone)]
pub struct JailBuilder {
    root: PathBuf,
    options: JailOptions,
    host: Option<Host>,
}

impl JailBuilder {
    pub fn allow_temp(mut self, allow: bool) -> Self {
        self.options.allow_temp = allow;
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.options.policy = policy;
        self
    }

    pub fn options(mut self, options: JailOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve against `host` instead of the detected one.
    pub fn host(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }

    pub fn build(self) -> Result<Jail, JailError> {
        if self.root.as_os_str().is_empty() {
            return Err(JailError::InvalidRoot {
                root: self.root,
                reason: "empty path",
            });
        }

        let raw = self.root.to_string_lossy();
        let host = self.host.unwrap_or_else(|| Host::current().clone());
        let platform = host.platform();
        let root = lexical::resolve(platform, host.cwd(), &[raw.as_ref()]);

        // Reject filesystem roots (/, C:\, \\server\share) - they confine nothing
        if lexical::is_root(platform, &root) {
            return Err(JailError::InvalidRoot {
                root: PathBuf::from(root),
                reason: "filesystem root",
            });
        }

        debug!(
            root = %root,
            allow_temp = self.options.allow_temp,
            policy = ?self.options.policy,
            "Jail created"
        );
        Ok(Jail {
            root,
            options: self.options,
            host,
        })
    }
}
