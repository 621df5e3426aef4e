//! Values that flow through a filesystem surface, as arguments and results.

use std::any::Any;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

/// Positional arguments of an operation.
pub type Args = Vec<FsValue>;

/// Provider-specific object passed around opaquely (streams, watchers,
/// option bags).
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handle(..)")
    }
}

/// Any value an operation accepts or returns.
///
/// In a path position, `Text`, `Bytes` and `file:` URLs are confined, `Fd`
/// is an already-open descriptor, and every other variant is something the
/// confiner does not understand.
#[derive(Debug, Clone)]
pub enum FsValue {
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Bytes),
    Url(Url),
    Fd(i32),
    List(Vec<FsValue>),
    Metadata(Arc<fs::Metadata>),
    Handle(Handle),
}

impl FsValue {
    /// Short name of the variant, used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FsValue::Unit => "unit",
            FsValue::Bool(_) => "bool",
            FsValue::Int(_) => "integer",
            FsValue::Text(_) => "text",
            FsValue::Bytes(_) => "bytes",
            FsValue::Url(_) => "url",
            FsValue::Fd(_) => "descriptor",
            FsValue::List(_) => "list",
            FsValue::Metadata(_) => "metadata",
            FsValue::Handle(_) => "handle",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FsValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FsValue::Bytes(bytes) => Some(bytes),
            FsValue::Text(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FsValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_fd(&self) -> Option<i32> {
        match self {
            FsValue::Fd(fd) => Some(*fd),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&Url> {
        match self {
            FsValue::Url(url) => Some(url),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FsValue]> {
        match self {
            FsValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&fs::Metadata> {
        match self {
            FsValue::Metadata(md) => Some(md),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            FsValue::Handle(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Structural equality; metadata and handles compare by identity.
impl PartialEq for FsValue {
    fn eq(&self, other: &Self) -> bool {
        use FsValue::*;
        match (self, other) {
            (Unit, Unit) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Url(a), Url(b)) => a == b,
            (Fd(a), Fd(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Metadata(a), Metadata(b)) => Arc::ptr_eq(a, b),
            (Handle(a), Handle(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for FsValue {
    fn from(text: &str) -> Self {
        FsValue::Text(text.to_string())
    }
}

impl From<String> for FsValue {
    fn from(text: String) -> Self {
        FsValue::Text(text)
    }
}

impl From<&Path> for FsValue {
    fn from(path: &Path) -> Self {
        FsValue::Text(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for FsValue {
    fn from(path: PathBuf) -> Self {
        FsValue::from(path.as_path())
    }
}

impl From<Bytes> for FsValue {
    fn from(bytes: Bytes) -> Self {
        FsValue::Bytes(bytes)
    }
}

impl From<&[u8]> for FsValue {
    fn from(bytes: &[u8]) -> Self {
        FsValue::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<&[u8; N]> for FsValue {
    fn from(bytes: &[u8; N]) -> Self {
        FsValue::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<u8>> for FsValue {
    fn from(bytes: Vec<u8>) -> Self {
        FsValue::Bytes(Bytes::from(bytes))
    }
}

impl From<Url> for FsValue {
    fn from(url: Url) -> Self {
        FsValue::Url(url)
    }
}

impl From<bool> for FsValue {
    fn from(b: bool) -> Self {
        FsValue::Bool(b)
    }
}

impl From<i64> for FsValue {
    fn from(n: i64) -> Self {
        FsValue::Int(n)
    }
}

impl From<Handle> for FsValue {
    fn from(handle: Handle) -> Self {
        FsValue::Handle(handle)
    }
}
