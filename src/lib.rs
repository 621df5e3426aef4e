//! A filesystem surface whose path arguments cannot leave a root directory.
//!
//! Binding a root produces a [`Surface`] shaped exactly like the provider it
//! wraps. Every path-taking operation rewrites its path arguments first, so
//! `../../etc/passwd` lands at `<root>/etc/passwd`, absolute paths are
//! re-rooted under the jail, and paths under the system temp directory may be
//! let through unchanged.
//!
//! # Quick Start
//!
//! Bind the bundled `std::fs` provider:
//!
//! ```no_run
//! let fs = sandboxed_fs::bind("/var/uploads", false)?;
//! fs.call_sync("write_file_sync", vec!["../../etc/passwd".into(), "data".into()])?;
//! // wrote /var/uploads/etc/passwd
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! For confining paths without a provider, use a [`Jail`] directly:
//!
//! ```
//! use sandboxed_fs::{Host, Jail, Platform};
//!
//! let host = Host::new(Platform::Posix, "/tmp", "/");
//! let jail = Jail::builder("/var/uploads").host(host).build()?;
//! assert_eq!(jail.join("/etc/passwd").as_str(), "/var/uploads/etc/passwd");
//! # Ok::<(), sandboxed_fs::JailError>(())
//! ```
//!
//! # Security
//!
//! Confinement is lexical. This crate blocks:
//! - Path traversal (`../../etc/passwd`)
//! - Absolute path injection (`/etc/passwd`, `C:\Windows`, `\\server\share`)
//! - Encoded traversal inside `file:` URLs (`%2F..%2F`)
//!
//! It does not resolve symlinks, so a link already inside the root can still
//! point outside it, and open descriptors are never rewritten. See [`Policy`]
//! for how values that are not paths are treated.

mod binder;
mod confine;
mod confined_path;
mod error;
mod jail;
mod lexical;
mod ops;
mod platform;
pub mod std_fs;
mod surface;
mod value;

use std::path::Path;

pub use binder::bind_surface;
pub use confine::{confine_argument, normalize, Normalized};
pub use confined_path::{ConfinedPath, Placement};
pub use error::JailError;
pub use jail::{Accepts, Jail, JailBuilder, JailOptions, Policy};
pub use ops::{classify, classified, OperationClass, Strategy, OPERATION_CLASSES};
pub use platform::{Host, Platform};
pub use surface::{sync_name, Call, Callback, Member, Operation, Surface, PROMISES, SYNC_SUFFIX};
pub use value::{Args, FsValue, Handle};

/// Bind the bundled `std::fs` provider to `root`.
///
/// With `allow_temp`, paths under the host temp directory pass through
/// unchanged. Arguments that are not paths are rejected; use
/// [`bind_with`] to choose another [`Policy`].
///
/// # Example
///
/// ```no_run
/// let fs = sandboxed_fs::bind("/srv/site", true)?;
/// let index = fs.call_sync("read_file_sync", vec!["/index.html".into()])?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn bind<R: AsRef<Path>>(root: R, allow_temp: bool) -> Result<Surface, JailError> {
    bind_with(root, JailOptions {
        allow_temp,
        ..JailOptions::default()
    })
}

/// Bind the bundled `std::fs` provider to `root` with explicit options.
pub fn bind_with<R: AsRef<Path>>(root: R, options: JailOptions) -> Result<Surface, JailError> {
    let jail = Jail::with_options(root, options)?;
    Ok(bind_surface(&std_fs::surface(), &jail))
}
