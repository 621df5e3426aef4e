//! Which provider operations take paths, and where.

use crate::jail::Accepts;

/// How an operation's arguments are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Argument 1 is a path.
    SinglePath,
    /// Argument 1 is a text path joined under the root without the temp
    /// escape; URLs and descriptors are not paths here.
    TextPath,
    /// Argument 1 is a path, and the operation's `native` variant is wrapped too.
    SinglePathWithNative,
    /// Argument 1 is a path or an open descriptor.
    FileOrDescriptor,
    /// Arguments 1 and 2 are independent paths.
    TwoPaths,
}

impl Strategy {
    /// Accepted shape of each rewritten argument, in order.
    pub fn positions(self) -> &'static [Accepts] {
        match self {
            Strategy::SinglePath | Strategy::SinglePathWithNative => &[Accepts::Path],
            Strategy::TextPath => &[Accepts::Text],
            Strategy::FileOrDescriptor => &[Accepts::PathOrDescriptor],
            Strategy::TwoPaths => &[Accepts::Path, Accepts::Path],
        }
    }
}

/// A group of operations sharing a rewrite strategy.
#[derive(Debug, Clone, Copy)]
pub struct OperationClass {
    pub strategy: Strategy,
    pub names: &'static [&'static str],
    /// Whether a `<name>_sync` member exists alongside the callback form.
    pub has_sync: bool,
}

pub const OPERATION_CLASSES: &[OperationClass] = &[
    OperationClass {
        strategy: Strategy::SinglePath,
        names: &[
            "access", "chmod", "chown", "exists", "lchmod", "lchown", "lstat", "mkdir", "open",
            "readdir", "readlink", "rmdir", "stat", "truncate", "unlink", "utimes",
        ],
        has_sync: true,
    },
    OperationClass {
        strategy: Strategy::TextPath,
        names: &["mkdtemp"],
        has_sync: true,
    },
    OperationClass {
        strategy: Strategy::SinglePathWithNative,
        names: &["realpath"],
        has_sync: true,
    },
    OperationClass {
        strategy: Strategy::SinglePath,
        names: &[
            "create_read_stream",
            "create_write_stream",
            "unwatch_file",
            "watch",
            "watch_file",
        ],
        has_sync: false,
    },
    OperationClass {
        strategy: Strategy::FileOrDescriptor,
        names: &["append_file", "read_file", "write_file"],
        has_sync: true,
    },
    OperationClass {
        strategy: Strategy::TwoPaths,
        names: &["copy_file", "link", "rename", "symlink"],
        has_sync: true,
    },
];

/// Every classified operation with its class.
pub fn classified() -> impl Iterator<Item = (&'static str, &'static OperationClass)> {
    OPERATION_CLASSES
        .iter()
        .flat_map(|class| class.names.iter().map(move |name| (*name, class)))
}

/// Class of `name`, if it takes paths.
pub fn classify(name: &str) -> Option<&'static OperationClass> {
    classified().find(|(candidate, _)| *candidate == name).map(|(_, class)| class)
}
