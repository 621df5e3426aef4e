//! Host platform facts the confiner depends on.
//!
//! Detection happens once per process ([`Host::current`]). Everything else in
//! the crate receives a [`Host`] explicitly, so the Windows rules can be
//! exercised on any machine by building a `Host` by hand.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::lexical;

/// `OSTYPE` values that mean a POSIX emulation layer running on Windows.
const WINDOWS_OSTYPES: &[&str] = &["cygwin", "msys"];

const POSIX_TEMP_DIR: &str = "/tmp";
const WINDOWS_TEMP_DIR: &str = r"C:\Windows\Temp";

/// Path syntax family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// `/`-separated paths with a single root.
    Posix,
    /// Drive letters, UNC shares, and both `\` and `/` as separators.
    Windows,
}

impl Platform {
    /// Detect the platform family of the running process.
    pub fn detect() -> Self {
        Self::from_env(env::var("OSTYPE").ok().as_deref())
    }

    fn from_env(ostype: Option<&str>) -> Self {
        if cfg!(windows) {
            return Platform::Windows;
        }
        match ostype {
            Some(value) if WINDOWS_OSTYPES.contains(&value) => Platform::Windows,
            _ => Platform::Posix,
        }
    }

    /// Preferred separator when building paths.
    pub fn separator(self) -> char {
        match self {
            Platform::Posix => '/',
            Platform::Windows => '\\',
        }
    }

    /// Temp directory used when the reported one is unusable.
    pub fn default_temp_dir(self) -> &'static str {
        match self {
            Platform::Posix => POSIX_TEMP_DIR,
            Platform::Windows => WINDOWS_TEMP_DIR,
        }
    }

    pub(crate) fn is_separator(self, c: char) -> bool {
        match self {
            Platform::Posix => c == '/',
            Platform::Windows => c == '/' || c == '\\',
        }
    }
}

/// Process-wide facts used to resolve candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    platform: Platform,
    temp_dir: String,
    cwd: String,
}

impl Host {
    /// Build a host description. `temp_dir` and `cwd` are normalized for
    /// `platform`; `cwd` should be absolute.
    ///
    /// The temp directory is never resolved against `cwd`. An empty or
    /// relative `temp_dir`, or one naming a filesystem root, is replaced by
    /// [`Platform::default_temp_dir`]. A Windows `\Temp` without a drive
    /// takes the drive of `cwd`.
    pub fn new(platform: Platform, temp_dir: impl AsRef<str>, cwd: impl AsRef<str>) -> Self {
        let cwd = lexical::resolve(platform, "", &[cwd.as_ref()]);
        let temp_dir = usable_temp_dir(platform, temp_dir.as_ref(), &cwd);
        Self {
            platform,
            temp_dir,
            cwd,
        }
    }

    /// The host this process runs on, computed on first use.
    pub fn current() -> &'static Host {
        static CURRENT: OnceLock<Host> = OnceLock::new();
        CURRENT.get_or_init(|| {
            let platform = Platform::detect();
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from(platform.separator().to_string()));
            let host = Host::new(platform, lossy(&env::temp_dir()), lossy(&cwd));
            debug!(
                platform = ?host.platform,
                temp_dir = %host.temp_dir,
                cwd = %host.cwd,
                "Detected host"
            );
            host
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Normalized temporary directory.
    pub fn temp_dir(&self) -> &str {
        &self.temp_dir
    }

    /// Normalized working directory at detection time.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }
}

fn usable_temp_dir(platform: Platform, reported: &str, cwd: &str) -> String {
    if lexical::parse_root(platform, reported).absolute {
        let resolved = lexical::resolve(platform, cwd, &[reported]);
        if !lexical::is_root(platform, &resolved) {
            return resolved;
        }
    }
    let fallback = platform.default_temp_dir();
    warn!(reported, fallback, "Unusable temp directory, using the platform default");
    fallback.to_string()
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
