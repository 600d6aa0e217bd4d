//! The native primitive layer
//!
//! Everything above this module is a safe wrapper; everything below the
//! public functions here is the runtime's own business. The surface mirrors
//! the C API this library models: opaque integer handles for info objects
//! and communicators, position-based enumeration of info keys, a capacity
//! query, and a blocking process-launch primitive. The wrapper layer never
//! caches what it can re-query here — the handle is the single source of
//! truth.
//!
//! Launch requests are served by starting operating-system processes via
//! `std::process`. Spawned children find their application number and the
//! universe size in the `MPX_APPNUM` and `MPX_UNIVERSE_SIZE` environment
//! variables.
//!
//! # Standard section(s)
//!
//! 9 (info objects), 10.3 (process creation), 10.5.3 (universe size)

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use once_cell::sync::Lazy;

/// An opaque handle to a key-value info table.
pub type RawInfo = u32;
/// An opaque handle to a communicator.
pub type RawComm = u32;
/// A per-process status code as produced by the launch primitive.
pub type ErrCode = i32;

/// The null info handle. Never refers to a live table.
pub const INFO_NULL: RawInfo = 0;
/// Well-known handle of the environment info table. Owned by the runtime,
/// must never be freed through a wrapper.
pub const INFO_ENV: RawInfo = 1;
const INFO_FIRST_DYNAMIC: RawInfo = 2;

/// The null communicator handle.
pub const COMM_NULL: RawComm = 0;
/// The world communicator handle.
pub const COMM_WORLD: RawComm = 1;
/// The self communicator handle.
pub const COMM_SELF: RawComm = 2;
const COMM_FIRST_DYNAMIC: RawComm = 3;

/// Maximum length in bytes of an info key.
pub const MAX_INFO_KEY: usize = 255;
/// Maximum length in bytes of an info value.
pub const MAX_INFO_VAL: usize = 1024;

pub const SUCCESS: ErrCode = 0;
pub const ERR_INFO: ErrCode = 1;
pub const ERR_INFO_KEY: ErrCode = 2;
pub const ERR_INFO_VALUE: ErrCode = 3;
pub const ERR_INFO_NOKEY: ErrCode = 4;
pub const ERR_ARG: ErrCode = 5;
pub const ERR_ROOT: ErrCode = 6;
pub const ERR_COMM: ErrCode = 7;
pub const ERR_SPAWN: ErrCode = 8;
pub const ERR_INTERN: ErrCode = 9;
pub const ERR_UNKNOWN: ErrCode = 10;
pub const ERR_LASTCODE: ErrCode = 10;

/// Minimum thread support: only single-threaded callers.
pub const THREAD_SINGLE: i32 = 0;
/// Multi-threaded callers, runtime calls only from the main thread.
pub const THREAD_FUNNELED: i32 = 1;
/// Multi-threaded callers, runtime calls serialized by the caller.
pub const THREAD_SERIALIZED: i32 = 2;
/// Unrestricted multi-threaded use.
pub const THREAD_MULTIPLE: i32 = 3;

struct InfoRegistry {
    next: RawInfo,
    tables: HashMap<RawInfo, Vec<(String, String)>>,
}

static INFOS: Lazy<RwLock<InfoRegistry>> = Lazy::new(|| {
    let mut tables = HashMap::new();
    tables.insert(INFO_ENV, environment_table());
    RwLock::new(InfoRegistry {
        next: INFO_FIRST_DYNAMIC,
        tables,
    })
});

/// Builds the table behind `INFO_ENV` from the startup environment of the
/// calling process.
fn environment_table() -> Vec<(String, String)> {
    let mut table = Vec::new();
    let mut args = env::args();
    if let Some(command) = args.next() {
        table.push(("command".to_string(), command));
    }
    let argv = args.collect::<Vec<_>>().join(" ");
    if !argv.is_empty() {
        table.push(("argv".to_string(), argv));
    }
    table.push((
        "maxprocs".to_string(),
        env::var("MPX_MAXPROCS").unwrap_or_else(|_| "1".to_string()),
    ));
    if let Ok(dir) = env::current_dir() {
        table.push(("wdir".to_string(), dir.to_string_lossy().into_owned()));
    }
    table.push((
        "thread_level".to_string(),
        thread_level_name(thread_support()).to_string(),
    ));
    table
}

fn registry_read() -> std::sync::RwLockReadGuard<'static, InfoRegistry> {
    INFOS.read().expect("info registry poisoned")
}

fn registry_write() -> std::sync::RwLockWriteGuard<'static, InfoRegistry> {
    INFOS.write().expect("info registry poisoned")
}

/// Allocates a fresh, empty info table and returns its handle.
pub fn info_create() -> RawInfo {
    let mut reg = registry_write();
    let handle = reg.next;
    reg.next += 1;
    reg.tables.insert(handle, Vec::new());
    handle
}

/// Duplicates the table behind `handle` into a freshly allocated one.
pub fn info_dup(handle: RawInfo) -> RawInfo {
    let mut reg = registry_write();
    let copy = reg
        .tables
        .get(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle))
        .clone();
    let new_handle = reg.next;
    reg.next += 1;
    reg.tables.insert(new_handle, copy);
    new_handle
}

/// Releases the table behind `handle`. The well-known `INFO_ENV` table is
/// owned by the runtime and cannot be freed.
pub fn info_free(handle: RawInfo) {
    assert_ne!(handle, INFO_ENV, "cannot free the environment info table");
    let removed = registry_write().tables.remove(&handle);
    assert!(removed.is_some(), "invalid info handle {}", handle);
}

/// Stores `value` under `key`. An existing key keeps its position and only
/// has its value replaced; a new key is appended.
pub fn info_set(handle: RawInfo, key: &str, value: &str) {
    assert!(
        !key.is_empty() && key.len() <= MAX_INFO_KEY,
        "info key length must be within (0, {}]",
        MAX_INFO_KEY
    );
    assert!(
        !value.is_empty() && value.len() <= MAX_INFO_VAL,
        "info value length must be within (0, {}]",
        MAX_INFO_VAL
    );
    let mut reg = registry_write();
    let table = reg
        .tables
        .get_mut(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle));
    match table.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value.to_string(),
        None => table.push((key.to_string(), value.to_string())),
    }
}

/// Looks up the value stored under `key`, if any.
pub fn info_get(handle: RawInfo, key: &str) -> Option<String> {
    let reg = registry_read();
    let table = reg
        .tables
        .get(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle));
    table.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

/// Removes `key` and its value. Returns whether the key was present.
/// Positions of keys past the removed one shift down by one.
pub fn info_delete(handle: RawInfo, key: &str) -> bool {
    let mut reg = registry_write();
    let table = reg
        .tables
        .get_mut(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle));
    match table.iter().position(|(k, _)| k == key) {
        Some(pos) => {
            table.remove(pos);
            true
        }
        None => false,
    }
}

/// Number of keys currently stored behind `handle`.
pub fn info_get_nkeys(handle: RawInfo) -> usize {
    let reg = registry_read();
    reg.tables
        .get(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle))
        .len()
}

/// The key at position `n`, or `None` past the end. Positions are stable
/// only while no insertion or deletion intervenes.
pub fn info_get_nthkey(handle: RawInfo, n: usize) -> Option<String> {
    let reg = registry_read();
    let table = reg
        .tables
        .get(&handle)
        .unwrap_or_else(|| panic!("invalid info handle {}", handle));
    table.get(n).map(|(k, _)| k.clone())
}

static UNIVERSE_SIZE: Lazy<Option<usize>> = Lazy::new(|| {
    env::var("MPX_UNIVERSE_SIZE").ok().and_then(|v| v.parse().ok())
});

/// How many processes the runtime can host in total, if it knows.
///
/// # Standard section(s)
///
/// 10.5.3
pub fn universe_size() -> Option<usize> {
    *UNIVERSE_SIZE
}

/// The application number assigned to this process when it was spawned,
/// or `None` if it was started directly.
pub fn appnum() -> Option<i32> {
    env::var("MPX_APPNUM").ok().and_then(|v| v.parse().ok())
}

static THREAD_SUPPORT: Lazy<i32> = Lazy::new(|| {
    match env::var("MPX_THREAD_LEVEL").as_deref() {
        Ok("single") => THREAD_SINGLE,
        Ok("funneled") => THREAD_FUNNELED,
        Ok("serialized") => THREAD_SERIALIZED,
        _ => THREAD_MULTIPLE,
    }
});

/// The highest thread-support level this runtime provides.
pub fn thread_support() -> i32 {
    *THREAD_SUPPORT
}

fn thread_level_name(level: i32) -> &'static str {
    match level {
        THREAD_SINGLE => "single",
        THREAD_FUNNELED => "funneled",
        THREAD_SERIALIZED => "serialized",
        _ => "multiple",
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Whether the runtime is currently initialized.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::SeqCst)
}

/// Initializes the runtime with the requested thread-support level and
/// returns the level actually provided.
pub fn init_thread(required: i32) -> i32 {
    INITIALIZED.store(true, Ordering::SeqCst);
    required.min(thread_support())
}

/// Tears the runtime down, disconnecting every live communicator and
/// reaping its children.
pub fn finalize() {
    let entries: Vec<CommEntry> = {
        let mut reg = COMMS.write().expect("comm registry poisoned");
        reg.comms.drain().map(|(_, entry)| entry).collect()
    };
    for mut entry in entries {
        entry.reap();
    }
    INITIALIZED.store(false, Ordering::SeqCst);
}

struct CommEntry {
    children: Vec<Child>,
    remote_size: usize,
}

impl CommEntry {
    fn reap(&mut self) {
        for child in &mut self.children {
            let _ = child.wait();
        }
        self.children.clear();
    }
}

struct CommRegistry {
    next: RawComm,
    comms: HashMap<RawComm, CommEntry>,
}

static COMMS: Lazy<RwLock<CommRegistry>> = Lazy::new(|| {
    RwLock::new(CommRegistry {
        next: COMM_FIRST_DYNAMIC,
        comms: HashMap::new(),
    })
});

/// Number of processes in the local group of `handle`.
pub fn comm_size(handle: RawComm) -> usize {
    match handle {
        COMM_NULL => 0,
        _ => 1,
    }
}

/// Rank of the calling process in `handle`.
pub fn comm_rank(_handle: RawComm) -> i32 {
    0
}

/// Number of processes in the remote group of an inter-communicator
/// produced by a launch.
pub fn comm_remote_size(handle: RawComm) -> usize {
    let reg = COMMS.read().expect("comm registry poisoned");
    reg.comms
        .get(&handle)
        .unwrap_or_else(|| panic!("invalid communicator handle {}", handle))
        .remote_size
}

/// Disconnects an inter-communicator, blocking until every child process
/// it refers to has terminated.
pub fn comm_disconnect(handle: RawComm) {
    let entry = {
        let mut reg = COMMS.write().expect("comm registry poisoned");
        reg.comms.remove(&handle)
    };
    match entry {
        Some(mut entry) => entry.reap(),
        None => panic!("invalid communicator handle {}", handle),
    }
}

/// Launches `maxprocs` instances of a single executable. Equivalent to a
/// one-element [`spawn_multiple`].
///
/// # Standard section(s)
///
/// 10.3.2
pub fn spawn(
    command: &str,
    argv: &[String],
    maxprocs: usize,
    info: RawInfo,
) -> (RawComm, Vec<ErrCode>) {
    spawn_multiple(
        &[command.to_string()],
        &[argv.to_vec()],
        &[maxprocs],
        &[info],
    )
}

/// Launches several executables at once, each with its own argument vector,
/// process count, and info table. Returns the inter-communicator handle and
/// one status code per requested process slot, in slot order. A failed slot
/// never prevents later slots from being attempted; partial failure is
/// reported through the codes, not through an early return.
///
/// # Standard section(s)
///
/// 10.3.3
pub fn spawn_multiple(
    commands: &[String],
    argvs: &[Vec<String>],
    maxprocs: &[usize],
    infos: &[RawInfo],
) -> (RawComm, Vec<ErrCode>) {
    assert!(
        commands.len() == argvs.len()
            && commands.len() == maxprocs.len()
            && commands.len() == infos.len(),
        "launch arrays must have one entry per executable"
    );

    let mut children = Vec::new();
    let mut errcodes = Vec::with_capacity(maxprocs.iter().sum());
    for (appnum, command) in commands.iter().enumerate() {
        let info = infos[appnum];
        let wdir = lookup_launch_key(info, "wdir");
        let path = lookup_launch_key(info, "path");
        let resolved = resolve_command(command, path.as_deref());
        for _ in 0..maxprocs[appnum] {
            let mut process = Command::new(&resolved);
            process
                .args(&argvs[appnum])
                .env("MPX_APPNUM", appnum.to_string())
                .stdin(Stdio::null());
            if let Some(universe) = universe_size() {
                process.env("MPX_UNIVERSE_SIZE", universe.to_string());
            }
            if let Some(dir) = &wdir {
                process.current_dir(dir);
            }
            match process.spawn() {
                Ok(child) => {
                    children.push(child);
                    errcodes.push(SUCCESS);
                }
                Err(_) => errcodes.push(ERR_SPAWN),
            }
        }
    }

    let remote_size = children.len();
    let handle = {
        let mut reg = COMMS.write().expect("comm registry poisoned");
        let handle = reg.next;
        reg.next += 1;
        reg.comms.insert(
            handle,
            CommEntry {
                children,
                remote_size,
            },
        );
        handle
    };
    (handle, errcodes)
}

fn lookup_launch_key(info: RawInfo, key: &str) -> Option<String> {
    if info == INFO_NULL {
        None
    } else {
        info_get(info, key)
    }
}

/// Resolves `command` against an info-supplied search path. Commands that
/// already carry a path separator are taken as-is; unresolved commands fall
/// back to the operating system's own lookup.
fn resolve_command(command: &str, path: Option<&str>) -> PathBuf {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return PathBuf::from(command);
    }
    if let Some(path) = path {
        for dir in path.split(':').filter(|d| !d.is_empty()) {
            let candidate = Path::new(dir).join(command);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(command)
}

/// A human-readable description of a status code produced by the launch
/// primitive.
///
/// # Standard section(s)
///
/// 8.4
pub fn error_string(code: ErrCode) -> String {
    let description = match code {
        SUCCESS => "no error",
        ERR_INFO => "invalid info object",
        ERR_INFO_KEY => "info key too long or empty",
        ERR_INFO_VALUE => "info value too long or empty",
        ERR_INFO_NOKEY => "no such info key",
        ERR_ARG => "invalid argument",
        ERR_ROOT => "invalid root rank",
        ERR_COMM => "invalid communicator",
        ERR_SPAWN => "error spawning process",
        ERR_INTERN => "internal runtime error",
        _ => "unknown error",
    };
    description.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_tables_are_isolated() {
        let a = info_create();
        let b = info_create();
        info_set(a, "host", "node01");
        assert_eq!(info_get(a, "host").as_deref(), Some("node01"));
        assert_eq!(info_get(b, "host"), None);
        assert_eq!(info_get_nkeys(b), 0);
        info_free(a);
        info_free(b);
    }

    #[test]
    fn info_set_keeps_position_on_overwrite() {
        let h = info_create();
        info_set(h, "one", "1");
        info_set(h, "two", "2");
        info_set(h, "one", "uno");
        assert_eq!(info_get_nthkey(h, 0).as_deref(), Some("one"));
        assert_eq!(info_get(h, "one").as_deref(), Some("uno"));
        assert_eq!(info_get_nkeys(h), 2);
        info_free(h);
    }

    #[test]
    fn info_delete_shifts_positions() {
        let h = info_create();
        info_set(h, "a", "1");
        info_set(h, "b", "2");
        info_set(h, "c", "3");
        assert!(info_delete(h, "a"));
        assert!(!info_delete(h, "a"));
        assert_eq!(info_get_nthkey(h, 0).as_deref(), Some("b"));
        assert_eq!(info_get_nthkey(h, 1).as_deref(), Some("c"));
        assert_eq!(info_get_nthkey(h, 2), None);
        info_free(h);
    }

    #[test]
    fn info_dup_is_deep() {
        let h = info_create();
        info_set(h, "k", "v");
        let d = info_dup(h);
        info_set(d, "k", "other");
        assert_eq!(info_get(h, "k").as_deref(), Some("v"));
        info_free(h);
        info_free(d);
    }

    #[test]
    fn environment_table_is_populated() {
        assert!(info_get(INFO_ENV, "command").is_some());
        assert!(info_get(INFO_ENV, "maxprocs").is_some());
    }

    #[test]
    fn resolve_command_prefers_info_path() {
        let dir = env::temp_dir();
        let name = "mpx-resolve-test";
        let candidate = dir.join(name);
        std::fs::write(&candidate, b"").unwrap();
        let resolved = resolve_command(name, Some(dir.to_str().unwrap()));
        assert_eq!(resolved, candidate);
        std::fs::remove_file(&candidate).unwrap();
    }

    #[test]
    fn resolve_command_passes_through_paths() {
        let resolved = resolve_command("/bin/true", Some("/nonexistent"));
        assert_eq!(resolved, PathBuf::from("/bin/true"));
    }

    #[test]
    fn spawn_reports_bad_commands_per_slot() {
        let (comm, codes) = spawn("mpx-definitely-not-a-command", &[], 2, INFO_NULL);
        assert_eq!(codes, vec![ERR_SPAWN, ERR_SPAWN]);
        assert_eq!(comm_remote_size(comm), 0);
        comm_disconnect(comm);
    }
}
