//! Provider surface over the host filesystem.
//!
//! Every operation is one blocking primitive exposed in up to three shapes:
//! `name` takes a callback and runs on the tokio blocking pool (or a thread
//! of its own outside a runtime), `name_sync` runs inline, and
//! `promises.name` returns a future that must be polled inside a tokio
//! runtime; outside one it resolves to an error.
//!
//! Descriptors are small integers local to one surface, handed out by
//! `open` and released by `close`.

use std::collections::HashMap;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::future::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::surface::{sync_name, Call, Callback, Member, Operation, Surface, PROMISES};
use crate::value::{Args, FsValue, Handle};

/// What `create_read_stream` and `create_write_stream` hand back, inside
/// [`FsValue::Handle`].
pub type FileStream = Mutex<File>;

pub const F_OK: i64 = 0;
pub const X_OK: i64 = 1;
pub const W_OK: i64 = 2;
pub const R_OK: i64 = 4;

const FIRST_FD: i32 = 3;
const MKDTEMP_ATTEMPTS: usize = 16;

type Primitive = fn(&StdFs, Args) -> io::Result<FsValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Callback, `_sync` and promise members.
    All,
    /// Like `All`, and each callback/sync member carries a `native` variant.
    AllWithNative,
    /// Callback and `_sync` members only.
    NoPromise,
    /// A single member under the base name that returns immediately.
    Immediate,
}

const PRIMITIVES: &[(&str, Primitive, Shape)] = &[
    ("access", access, Shape::All),
    ("chmod", chmod, Shape::All),
    ("exists", exists, Shape::NoPromise),
    ("lstat", lstat, Shape::All),
    ("mkdir", mkdir, Shape::All),
    ("open", open, Shape::All),
    ("readdir", readdir, Shape::All),
    ("readlink", readlink, Shape::All),
    ("rmdir", rmdir, Shape::All),
    ("stat", stat, Shape::All),
    ("truncate", truncate, Shape::All),
    ("unlink", unlink, Shape::All),
    ("utimes", utimes, Shape::All),
    ("mkdtemp", mkdtemp, Shape::All),
    ("realpath", realpath, Shape::AllWithNative),
    ("create_read_stream", create_read_stream, Shape::Immediate),
    ("create_write_stream", create_write_stream, Shape::Immediate),
    ("append_file", append_file, Shape::All),
    ("read_file", read_file, Shape::All),
    ("write_file", write_file, Shape::All),
    ("copy_file", copy_file, Shape::All),
    ("link", link, Shape::All),
    ("rename", rename, Shape::All),
    ("symlink", symlink, Shape::All),
    ("close", close, Shape::All),
    ("fstat", fstat, Shape::All),
];

#[cfg(unix)]
const OWNERSHIP: &[(&str, Primitive, Shape)] = &[
    ("chown", chown, Shape::All),
    ("lchown", lchown, Shape::All),
];

/// Build a fresh surface over the host filesystem with its own descriptor table.
pub fn surface() -> Surface {
    let table = Arc::new(StdFs::new());
    let mut surface = Surface::new();
    let mut promises = Surface::new();

    let primitives = PRIMITIVES.iter();
    #[cfg(unix)]
    let primitives = primitives.chain(OWNERSHIP.iter());

    for &(name, primitive, shape) in primitives {
        register(&mut surface, &mut promises, &table, name, primitive, shape);
    }

    surface.insert(PROMISES, promises);
    surface.insert("constants", constants());
    debug!(members = surface.len(), "Built std filesystem surface");
    surface
}

fn register(
    surface: &mut Surface,
    promises: &mut Surface,
    table: &Arc<StdFs>,
    name: &str,
    primitive: Primitive,
    shape: Shape,
) {
    let with_native = |call: Call, native: Call| {
        let operation = Operation::new(call);
        if shape == Shape::AllWithNative {
            operation.with_native(native)
        } else {
            operation
        }
    };

    match shape {
        Shape::Immediate => {
            surface.insert(name, sync_call(table, primitive));
        }
        Shape::All | Shape::AllWithNative | Shape::NoPromise => {
            surface.insert(
                name,
                with_native(callback_call(table, primitive), callback_call(table, primitive)),
            );
            surface.insert(
                sync_name(name),
                with_native(sync_call(table, primitive), sync_call(table, primitive)),
            );
            if shape != Shape::NoPromise {
                promises.insert(name, promise_call(table, primitive));
            }
        }
    }
}

fn constants() -> Surface {
    Surface::new()
        .with("F_OK", Member::Constant(FsValue::Int(F_OK)))
        .with("R_OK", Member::Constant(FsValue::Int(R_OK)))
        .with("W_OK", Member::Constant(FsValue::Int(W_OK)))
        .with("X_OK", Member::Constant(FsValue::Int(X_OK)))
}

fn sync_call(table: &Arc<StdFs>, primitive: Primitive) -> Call {
    let table = Arc::clone(table);
    Call::sync(move |args| primitive(&table, args))
}

fn callback_call(table: &Arc<StdFs>, primitive: Primitive) -> Call {
    let table = Arc::clone(table);
    Call::callback(move |args, done| run_callback(Arc::clone(&table), primitive, args, done))
}

fn promise_call(table: &Arc<StdFs>, primitive: Primitive) -> Call {
    let table = Arc::clone(table);
    Call::promise(move |args| {
        let table = Arc::clone(&table);
        async move {
            let runtime = tokio::runtime::Handle::try_current().map_err(io::Error::other)?;
            runtime
                .spawn_blocking(move || primitive(&table, args))
                .await
                .map_err(io::Error::other)?
        }
        .boxed()
    })
}

fn run_callback(table: Arc<StdFs>, primitive: Primitive, args: Args, done: Callback) {
    let job = move || done(primitive(&table, args));
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(job);
        }
        Err(_) => {
            std::thread::spawn(job);
        }
    }
}

/// Descriptor table shared by every member of one surface.
#[derive(Debug)]
struct StdFs {
    files: Mutex<HashMap<i32, Arc<Mutex<File>>>>,
    next_fd: AtomicI32,
}

impl StdFs {
    fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            next_fd: AtomicI32::new(FIRST_FD),
        }
    }

    fn insert(&self, file: File) -> i32 {
        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        self.files.lock().insert(fd, Arc::new(Mutex::new(file)));
        trace!(fd, "Opened descriptor");
        fd
    }

    fn get(&self, fd: i32) -> io::Result<Arc<Mutex<File>>> {
        self.files.lock().get(&fd).cloned().ok_or_else(|| bad_descriptor(fd))
    }

    fn remove(&self, fd: i32) -> io::Result<()> {
        self.files.lock().remove(&fd).ok_or_else(|| bad_descriptor(fd))?;
        trace!(fd, "Closed descriptor");
        Ok(())
    }
}

// === Argument helpers ===

fn invalid(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.into())
}

fn bad_descriptor(fd: i32) -> io::Error {
    invalid(format!("bad file descriptor {fd}"))
}

fn path_arg(args: &[FsValue], index: usize) -> io::Result<PathBuf> {
    match args.get(index) {
        Some(FsValue::Text(text)) => Ok(PathBuf::from(text)),
        Some(FsValue::Bytes(bytes)) => Ok(path_from_bytes(bytes)),
        Some(FsValue::Url(url)) => url
            .to_file_path()
            .map_err(|()| invalid(format!("'{url}' is not a local file URL"))),
        Some(other) => Err(invalid(format!("argument {} must be a path, got {}", index + 1, other.kind()))),
        None => Err(invalid(format!("missing path argument {}", index + 1))),
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: &Bytes) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &Bytes) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

fn int_arg(args: &[FsValue], index: usize) -> Option<i64> {
    args.get(index).and_then(FsValue::as_int)
}

fn text_arg(args: &[FsValue], index: usize) -> Option<&str> {
    args.get(index).and_then(FsValue::as_text)
}

fn data_arg(args: &[FsValue], index: usize) -> io::Result<&[u8]> {
    args.get(index)
        .and_then(FsValue::as_bytes)
        .ok_or_else(|| invalid(format!("argument {} must be text or bytes", index + 1)))
}

fn time_arg(args: &[FsValue], index: usize) -> io::Result<SystemTime> {
    let secs = int_arg(args, index).ok_or_else(|| invalid(format!("argument {} must be seconds", index + 1)))?;
    let secs = u64::try_from(secs).map_err(|_| invalid("times before the epoch are not supported"))?;
    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(unix)]
fn owner_arg(args: &[FsValue], index: usize) -> Option<u32> {
    int_arg(args, index).and_then(|id| u32::try_from(id).ok())
}

fn text_value(path: PathBuf) -> FsValue {
    FsValue::Text(path.to_string_lossy().into_owned())
}

fn open_options(flags: &str) -> io::Result<OpenOptions> {
    let mut options = OpenOptions::new();
    match flags {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => options.write(true).create(true).truncate(true),
        "wx" | "xw" => options.write(true).create_new(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "wx+" | "xw+" => options.read(true).write(true).create_new(true),
        "a" => options.append(true).create(true),
        "ax" | "xa" => options.append(true).create_new(true),
        "a+" => options.read(true).append(true).create(true),
        "ax+" | "xa+" => options.read(true).append(true).create_new(true),
        other => return Err(invalid(format!("unknown open flags '{other}'"))),
    };
    Ok(options)
}

// === Primitives ===

fn access(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let mode = int_arg(&args, 1).unwrap_or(F_OK);
    let metadata = fs::metadata(&path)?;
    if mode & W_OK != 0 && metadata.permissions().readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("'{}' is read-only", path.display()),
        ));
    }
    Ok(FsValue::Unit)
}

fn chmod(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let mode = int_arg(&args, 1).ok_or_else(|| invalid("chmod needs a mode"))?;
    let mode = u32::try_from(mode).map_err(|_| invalid("mode out of range"))?;

    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        fs::Permissions::from_mode(mode)
    };
    #[cfg(not(unix))]
    let permissions = {
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        permissions
    };

    fs::set_permissions(&path, permissions)?;
    Ok(FsValue::Unit)
}

#[cfg(unix)]
fn chown(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    std::os::unix::fs::chown(&path, owner_arg(&args, 1), owner_arg(&args, 2))?;
    Ok(FsValue::Unit)
}

#[cfg(unix)]
fn lchown(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    std::os::unix::fs::lchown(&path, owner_arg(&args, 1), owner_arg(&args, 2))?;
    Ok(FsValue::Unit)
}

fn exists(_: &StdFs, args: Args) -> io::Result<FsValue> {
    Ok(FsValue::Bool(path_arg(&args, 0).is_ok_and(|path| path.exists())))
}

fn lstat(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let metadata = fs::symlink_metadata(path_arg(&args, 0)?)?;
    Ok(FsValue::Metadata(Arc::new(metadata)))
}

fn stat(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let metadata = fs::metadata(path_arg(&args, 0)?)?;
    Ok(FsValue::Metadata(Arc::new(metadata)))
}

fn mkdir(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let recursive = args.get(1).and_then(FsValue::as_bool).unwrap_or(false);
    if recursive {
        fs::create_dir_all(&path)?;
    } else {
        fs::create_dir(&path)?;
    }
    Ok(FsValue::Unit)
}

fn open(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let file = open_options(text_arg(&args, 1).unwrap_or("r"))?.open(&path)?;
    Ok(FsValue::Fd(table.insert(file)))
}

fn close(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let fd = args.first().and_then(FsValue::as_fd).ok_or_else(|| invalid("close needs a descriptor"))?;
    table.remove(fd)?;
    Ok(FsValue::Unit)
}

fn fstat(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let fd = args.first().and_then(FsValue::as_fd).ok_or_else(|| invalid("fstat needs a descriptor"))?;
    let metadata = table.get(fd)?.lock().metadata()?;
    Ok(FsValue::Metadata(Arc::new(metadata)))
}

fn readdir(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let mut names = fs::read_dir(path_arg(&args, 0)?)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<io::Result<Vec<_>>>()?;
    names.sort();
    Ok(FsValue::List(names.into_iter().map(FsValue::Text).collect()))
}

fn readlink(_: &StdFs, args: Args) -> io::Result<FsValue> {
    Ok(text_value(fs::read_link(path_arg(&args, 0)?)?))
}

fn realpath(_: &StdFs, args: Args) -> io::Result<FsValue> {
    Ok(text_value(fs::canonicalize(path_arg(&args, 0)?)?))
}

fn rmdir(_: &StdFs, args: Args) -> io::Result<FsValue> {
    fs::remove_dir(path_arg(&args, 0)?)?;
    Ok(FsValue::Unit)
}

fn unlink(_: &StdFs, args: Args) -> io::Result<FsValue> {
    fs::remove_file(path_arg(&args, 0)?)?;
    Ok(FsValue::Unit)
}

fn truncate(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let len = int_arg(&args, 1).unwrap_or(0);
    let len = u64::try_from(len).map_err(|_| invalid("length must not be negative"))?;
    OpenOptions::new().write(true).open(&path)?.set_len(len)?;
    Ok(FsValue::Unit)
}

fn utimes(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let times = FileTimes::new()
        .set_accessed(time_arg(&args, 1)?)
        .set_modified(time_arg(&args, 2)?);
    File::open(&path)?.set_times(times)?;
    Ok(FsValue::Unit)
}

fn mkdtemp(_: &StdFs, args: Args) -> io::Result<FsValue> {
    // The prefix is a plain path; a URL here was never confined
    if let Some(FsValue::Url(url)) = args.first() {
        return Err(invalid(format!("mkdtemp prefix must be a text or byte path, got '{url}'")));
    }
    let prefix = path_arg(&args, 0)?;
    for _ in 0..MKDTEMP_ATTEMPTS {
        let suffix = Uuid::new_v4().simple().to_string();
        let mut name = prefix.clone().into_os_string();
        name.push(&suffix[..6]);
        let candidate = PathBuf::from(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(text_value(candidate)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "could not find an unused temporary directory name",
    ))
}

fn create_read_stream(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let file = File::open(path_arg(&args, 0)?)?;
    Ok(FsValue::Handle(Handle::new(FileStream::new(file))))
}

fn create_write_stream(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let path = path_arg(&args, 0)?;
    let file = open_options(text_arg(&args, 1).unwrap_or("w"))?.open(&path)?;
    Ok(FsValue::Handle(Handle::new(FileStream::new(file))))
}

fn read_file(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let data = match args.first() {
        Some(FsValue::Fd(fd)) => {
            let mut data = Vec::new();
            table.get(*fd)?.lock().read_to_end(&mut data)?;
            data
        }
        _ => fs::read(path_arg(&args, 0)?)?,
    };

    match text_arg(&args, 1) {
        Some("utf8" | "utf-8") => String::from_utf8(data)
            .map(FsValue::Text)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
        Some(other) => Err(invalid(format!("unsupported encoding '{other}'"))),
        None => Ok(FsValue::Bytes(Bytes::from(data))),
    }
}

fn write_file(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let data = data_arg(&args, 1)?;
    match args.first() {
        Some(FsValue::Fd(fd)) => table.get(*fd)?.lock().write_all(data)?,
        _ => fs::write(path_arg(&args, 0)?, data)?,
    }
    Ok(FsValue::Unit)
}

fn append_file(table: &StdFs, args: Args) -> io::Result<FsValue> {
    let data = data_arg(&args, 1)?;
    match args.first() {
        Some(FsValue::Fd(fd)) => table.get(*fd)?.lock().write_all(data)?,
        _ => OpenOptions::new()
            .append(true)
            .create(true)
            .open(path_arg(&args, 0)?)?
            .write_all(data)?,
    }
    Ok(FsValue::Unit)
}

fn copy_file(_: &StdFs, args: Args) -> io::Result<FsValue> {
    fs::copy(path_arg(&args, 0)?, path_arg(&args, 1)?)?;
    Ok(FsValue::Unit)
}

fn link(_: &StdFs, args: Args) -> io::Result<FsValue> {
    fs::hard_link(path_arg(&args, 0)?, path_arg(&args, 1)?)?;
    Ok(FsValue::Unit)
}

fn rename(_: &StdFs, args: Args) -> io::Result<FsValue> {
    fs::rename(path_arg(&args, 0)?, path_arg(&args, 1)?)?;
    Ok(FsValue::Unit)
}

fn symlink(_: &StdFs, args: Args) -> io::Result<FsValue> {
    let target = path_arg(&args, 0)?;
    let path = path_arg(&args, 1)?;

    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, &path)?;

    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(&target, &path)?;
        } else {
            std::os::windows::fs::symlink_file(&target, &path)?;
        }
    }

    Ok(FsValue::Unit)
}
