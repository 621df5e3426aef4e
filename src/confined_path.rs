//! A text path that has been through the confiner.

use std::ffi::OsStr;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Where a confined path ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placement {
    /// Re-rooted under the jail root.
    Jail,
    /// Left alone because it lies under the host temp directory.
    Temp,
}

/// A path produced by [`Jail::join`](crate::Jail::join).
///
/// It is either the jail root, a descendant of it, or (when the jail allows
/// it) a location under the host temp directory. [`placement`](Self::placement)
/// says which.
///
/// # Example
///
/// ```
/// use sandboxed_fs::{Host, Jail, Placement, Platform};
///
/// let host = Host::new(Platform::Posix, "/tmp", "/");
/// let jail = Jail::builder("/srv/uploads").host(host).build()?;
///
/// let path = jail.join("../../etc/passwd");
/// assert_eq!(path.as_str(), "/srv/uploads/etc/passwd");
/// assert_eq!(path.placement(), Placement::Jail);
/// # Ok::<(), sandboxed_fs::JailError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfinedPath {
    inner: String,
    placement: Placement,
}

impl ConfinedPath {
    pub(crate) fn new(inner: String, placement: Placement) -> Self {
        Self { inner, placement }
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    #[inline]
    pub fn as_path(&self) -> &Path {
        Path::new(&self.inner)
    }

    /// Consumes the `ConfinedPath` and returns the underlying string.
    #[inline]
    pub fn into_string(self) -> String {
        self.inner
    }
}

impl Deref for ConfinedPath {
    type Target = Path;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_path()
    }
}

impl AsRef<Path> for ConfinedPath {
    #[inline]
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<OsStr> for ConfinedPath {
    #[inline]
    fn as_ref(&self) -> &OsStr {
        OsStr::new(&self.inner)
    }
}

impl fmt::Display for ConfinedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<ConfinedPath> for PathBuf {
    #[inline]
    fn from(path: ConfinedPath) -> Self {
        PathBuf::from(path.inner)
    }
}

impl From<ConfinedPath> for String {
    #[inline]
    fn from(path: ConfinedPath) -> Self {
        path.inner
    }
}
