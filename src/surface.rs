//! A filesystem provider described as named members.
//!
//! A [`Surface`] maps member names to operations, constants and nested
//! namespaces. Operations come in three shapes: synchronous, callback and
//! promise (a boxed future). Naming follows one convention throughout: the
//! callback form is `name`, the synchronous form is `name_sync`, and the
//! promise form is `name` inside the `promises` namespace.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use crate::value::{Args, FsValue};

/// Suffix of synchronous members.
pub const SYNC_SUFFIX: &str = "_sync";

/// Name of the nested namespace holding promise-shaped members.
pub const PROMISES: &str = "promises";

pub type SyncFn = Arc<dyn Fn(Args) -> io::Result<FsValue> + Send + Sync>;
pub type Callback = Box<dyn FnOnce(io::Result<FsValue>) + Send>;
pub type CallbackFn = Arc<dyn Fn(Args, Callback) + Send + Sync>;
pub type PromiseFn = Arc<dyn Fn(Args) -> BoxFuture<'static, io::Result<FsValue>> + Send + Sync>;

/// Name of the synchronous counterpart of `name`.
pub fn sync_name(name: &str) -> String {
    format!("{name}{SYNC_SUFFIX}")
}

/// One way of invoking an operation.
#[derive(Clone)]
pub enum Call {
    Sync(SyncFn),
    Callback(CallbackFn),
    Promise(PromiseFn),
}

impl Call {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Args) -> io::Result<FsValue> + Send + Sync + 'static,
    {
        Call::Sync(Arc::new(f))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Args, Callback) + Send + Sync + 'static,
    {
        Call::Callback(Arc::new(f))
    }

    pub fn promise<F>(f: F) -> Self
    where
        F: Fn(Args) -> BoxFuture<'static, io::Result<FsValue>> + Send + Sync + 'static,
    {
        Call::Promise(Arc::new(f))
    }

    /// Same shape, with `rewrite` applied to the arguments before delegating.
    ///
    /// A rewrite error is reported through the call's own channel without
    /// reaching `self`: returned, passed to the callback, or as a ready future.
    pub fn rewritten<R>(&self, rewrite: R) -> Call
    where
        R: Fn(Args) -> io::Result<Args> + Send + Sync + 'static,
    {
        match self {
            Call::Sync(inner) => {
                let inner = Arc::clone(inner);
                Call::sync(move |args| inner(rewrite(args)?))
            }
            Call::Callback(inner) => {
                let inner = Arc::clone(inner);
                Call::callback(move |args, done| match rewrite(args) {
                    Ok(args) => inner(args, done),
                    Err(err) => done(Err(err)),
                })
            }
            Call::Promise(inner) => {
                let inner = Arc::clone(inner);
                Call::promise(move |args| match rewrite(args) {
                    Ok(args) => inner(args),
                    Err(err) => future::ready(Err(err)).boxed(),
                })
            }
        }
    }

    pub fn ptr_eq(&self, other: &Call) -> bool {
        match (self, other) {
            (Call::Sync(a), Call::Sync(b)) => Arc::ptr_eq(a, b),
            (Call::Callback(a), Call::Callback(b)) => Arc::ptr_eq(a, b),
            (Call::Promise(a), Call::Promise(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Call::Sync(_) => "sync",
            Call::Callback(_) => "callback",
            Call::Promise(_) => "promise",
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Call::{}(..)", self.shape())
    }
}

/// An operation, optionally carrying a `native` variant (as `realpath` does).
#[derive(Debug, Clone)]
pub struct Operation {
    pub call: Call,
    pub native: Option<Call>,
}

impl Operation {
    pub fn new(call: Call) -> Self {
        Self { call, native: None }
    }

    pub fn with_native(mut self, native: Call) -> Self {
        self.native = Some(native);
        self
    }
}

impl From<Call> for Operation {
    fn from(call: Call) -> Self {
        Operation::new(call)
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Operation(Operation),
    Constant(FsValue),
    Namespace(Surface),
}

impl Member {
    /// True when both members are the same implementation.
    ///
    /// Operations compare by reference, constants by value, namespaces member
    /// by member.
    pub fn same_as(&self, other: &Member) -> bool {
        match (self, other) {
            (Member::Operation(a), Member::Operation(b)) => {
                a.call.ptr_eq(&b.call)
                    && match (&a.native, &b.native) {
                        (Some(x), Some(y)) => x.ptr_eq(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (Member::Constant(a), Member::Constant(b)) => a == b,
            (Member::Namespace(a), Member::Namespace(b)) => {
                a.members.len() == b.members.len()
                    && a.members.iter().all(|(name, member)| {
                        b.members.get(name).is_some_and(|other| member.same_as(other))
                    })
            }
            _ => false,
        }
    }
}

impl From<Call> for Member {
    fn from(call: Call) -> Self {
        Member::Operation(Operation::new(call))
    }
}

impl From<Operation> for Member {
    fn from(operation: Operation) -> Self {
        Member::Operation(operation)
    }
}

impl From<Surface> for Member {
    fn from(surface: Surface) -> Self {
        Member::Namespace(surface)
    }
}

/// Named members of a filesystem provider.
///
/// Cloning is shallow: operations are shared by reference.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    members: BTreeMap<String, Member>,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, member: impl Into<Member>) -> Option<Member> {
        self.members.insert(name.into(), member.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, member: impl Into<Member>) -> Self {
        self.insert(name, member);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Member> {
        self.members.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        match self.members.get(name)? {
            Member::Operation(operation) => Some(operation),
            _ => None,
        }
    }

    pub fn namespace(&self, name: &str) -> Option<&Surface> {
        match self.members.get(name)? {
            Member::Namespace(surface) => Some(surface),
            _ => None,
        }
    }

    pub(crate) fn namespace_mut(&mut self, name: &str) -> Option<&mut Surface> {
        match self.members.get_mut(name)? {
            Member::Namespace(surface) => Some(surface),
            _ => None,
        }
    }

    pub fn constant(&self, name: &str) -> Option<&FsValue> {
        match self.members.get(name)? {
            Member::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Invoke a synchronous member.
    pub fn call_sync(&self, name: &str, args: Args) -> io::Result<FsValue> {
        match self.call_of(name)? {
            Call::Sync(f) => f(args),
            other => Err(wrong_shape(name, other, "sync")),
        }
    }

    /// Invoke a callback-shaped member.
    pub fn call<F>(&self, name: &str, args: Args, done: F)
    where
        F: FnOnce(io::Result<FsValue>) + Send + 'static,
    {
        match self.call_of(name) {
            Ok(Call::Callback(f)) => f(args, Box::new(done)),
            Ok(other) => done(Err(wrong_shape(name, other, "callback"))),
            Err(err) => done(Err(err)),
        }
    }

    /// Invoke a promise-shaped member.
    pub fn call_async(&self, name: &str, args: Args) -> BoxFuture<'static, io::Result<FsValue>> {
        match self.call_of(name) {
            Ok(Call::Promise(f)) => f(args),
            Ok(other) => future::ready(Err(wrong_shape(name, other, "promise"))).boxed(),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    fn call_of(&self, name: &str) -> io::Result<&Call> {
        self.operation(name).map(|operation| &operation.call).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no operation named '{name}'"),
            )
        })
    }
}

fn wrong_shape(name: &str, call: &Call, wanted: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("'{name}' is {}-shaped, not {wanted}", call.shape()),
    )
}
