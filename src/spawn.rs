//! Spawning processes at runtime
//!
//! A [`SingleSpawner`] launches one executable on a number of processes; a
//! [`MultipleSpawner`] launches several different executables at once,
//! keeping one command, argument vector, process count, and info object per
//! executable. Both are builders: fields are populated through fluent
//! setters, each of which re-validates its own invariant, and the terminal
//! [`spawn`](SingleSpawner::spawn) call flattens the accumulated state into
//! the shape the launch primitive expects.
//!
//! Structural misuse (empty commands, marker-only argument keys, process
//! counts outside the runtime's capacity, invalid roots) is a checked
//! precondition and fatal in debug builds. The indexed `*_at` accessors of
//! [`MultipleSpawner`] are the one place where validation is a catchable
//! [`Error`] instead, since an out-of-range index is a recoverable runtime
//! condition rather than structural misuse.
//!
//! # Standard section(s)
//!
//! 10.3

use conv::ConvUtil;
use smallvec::SmallVec;

use crate::error::{error_kind, Error};
use crate::info::Info;
use crate::raw::AsRaw;
use crate::runtime;
use crate::runtime::{ErrCode, RawInfo};
use crate::topology::{Communicator, InterCommunicator, Rank, SystemCommunicator};
use crate::Count;

/// Scratch array for a flattened argument vector.
type ArgvArray = SmallVec<[String; 8]>;

/// The character that introduces an argument key on a command line.
const ARGV_MARKER: char = '-';

/// A process count is valid if it is positive and, when the runtime knows
/// its capacity, within it. Unknown capacity means only the lower bound
/// can be checked.
fn check_maxprocs(maxprocs: Count, capacity: Option<usize>) -> bool {
    maxprocs > 0 && capacity.map_or(true, |cap| maxprocs as usize <= cap)
}

/// Every count must be individually valid and their sum must also stay
/// within capacity.
fn check_total_maxprocs(counts: &[Count], capacity: Option<usize>) -> bool {
    counts.iter().all(|&n| check_maxprocs(n, capacity))
        && capacity.map_or(true, |cap| {
            counts.iter().map(|&n| n as usize).sum::<usize>() <= cap
        })
}

/// Prefixes `key` with the marker character unless it already carries one.
fn normalize_argv_key(key: &str) -> String {
    if key.starts_with(ARGV_MARKER) {
        key.to_string()
    } else {
        format!("{}{}", ARGV_MARKER, key)
    }
}

/// A normalized key must contain something besides marker characters.
fn argv_key_is_meaningful(key: &str) -> bool {
    key.chars().any(|c| c != ARGV_MARKER)
}

fn check_root(root: Rank, comm: &SystemCommunicator) -> bool {
    !comm.is_null() && root >= 0 && root < comm.size()
}

/// Flattens `(key, value)` pairs into the alternating shape the launch
/// primitive expects. Empty values are omitted, leaving a bare key.
fn flatten_argv(pairs: &[(String, String)]) -> ArgvArray {
    let mut flat = ArgvArray::new();
    for (key, value) in pairs {
        flat.push(key.clone());
        if !value.is_empty() {
            flat.push(value.clone());
        }
    }
    flat
}

/// Builder for launching one executable on a number of processes.
///
/// # Examples
///
/// ```no_run
/// use mpx::SingleSpawner;
///
/// let mut spawner = SingleSpawner::new("worker", 4);
/// spawner.add_argv("threads", 2).add_argv("-verbose", "");
/// let result = spawner.spawn_with_errcodes();
/// assert!(result.all_succeeded());
/// ```
///
/// # Standard section(s)
///
/// 10.3.2
#[derive(Debug, Clone)]
pub struct SingleSpawner {
    command: String,
    argv: Vec<(String, String)>,
    maxprocs: Count,
    info: Info,
    root: Rank,
    comm: SystemCommunicator,
}

impl SingleSpawner {
    /// Creates a spawner for `maxprocs` instances of `command`, rooted at
    /// rank 0 of the world communicator with an empty info object.
    ///
    /// `command` must be non-empty and `maxprocs` positive and within the
    /// runtime's capacity, when it reports one.
    pub fn new(command: impl Into<String>, maxprocs: Count) -> SingleSpawner {
        let command = command.into();
        debug_assert!(!command.is_empty(), "spawn command must not be empty");
        debug_assert!(
            check_maxprocs(maxprocs, runtime::universe_size()),
            "process count {} outside (0, {:?}]",
            maxprocs,
            runtime::universe_size()
        );
        SingleSpawner {
            command,
            argv: Vec::new(),
            maxprocs,
            info: Info::new(),
            root: 0,
            comm: SystemCommunicator::world(),
        }
    }

    /// The executable to launch.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Replaces the executable to launch. Must be non-empty.
    pub fn set_command(&mut self, command: impl Into<String>) -> &mut SingleSpawner {
        let command = command.into();
        debug_assert!(!command.is_empty(), "spawn command must not be empty");
        self.command = command;
        self
    }

    /// The accumulated `(key, value)` argument pairs, keys normalized.
    pub fn argv(&self) -> &[(String, String)] {
        &self.argv
    }

    /// Appends one `(key, value)` argument pair.
    ///
    /// The key is normalized to carry a leading marker character; a key
    /// that consists of nothing but markers after normalization is
    /// structural misuse. Any value convertible to text is accepted; an
    /// empty value leaves a bare key on the final command line.
    pub fn add_argv<K: ToString, V: ToString>(&mut self, key: K, value: V) -> &mut SingleSpawner {
        let key = normalize_argv_key(&key.to_string());
        debug_assert!(
            argv_key_is_meaningful(&key),
            "argument key consists only of the marker character"
        );
        self.argv.push((key, value.to_string()));
        self
    }

    /// The number of processes to launch.
    pub fn maxprocs(&self) -> Count {
        self.maxprocs
    }

    /// Replaces the number of processes to launch. Must be positive and
    /// within the runtime's capacity, when it reports one.
    pub fn set_maxprocs(&mut self, maxprocs: Count) -> &mut SingleSpawner {
        debug_assert!(
            check_maxprocs(maxprocs, runtime::universe_size()),
            "process count {} outside (0, {:?}]",
            maxprocs,
            runtime::universe_size()
        );
        self.maxprocs = maxprocs;
        self
    }

    /// The info object passed to the launch primitive.
    pub fn spawn_info(&self) -> &Info {
        &self.info
    }

    /// Replaces the info object passed to the launch primitive.
    pub fn set_spawn_info(&mut self, info: Info) -> &mut SingleSpawner {
        self.info = info;
        self
    }

    /// The rank that performs the launch.
    pub fn root(&self) -> Rank {
        self.root
    }

    /// Replaces the launching rank. Must be a valid rank within the
    /// current communicator.
    pub fn set_root(&mut self, root: Rank) -> &mut SingleSpawner {
        debug_assert!(
            check_root(root, &self.comm),
            "root {} is not a valid rank in the communicator",
            root
        );
        self.root = root;
        self
    }

    /// The communicator scope of the launch.
    pub fn communicator(&self) -> SystemCommunicator {
        self.comm
    }

    /// Replaces the communicator scope. The current root must be a valid
    /// rank within the new communicator as well.
    pub fn set_communicator(&mut self, comm: SystemCommunicator) -> &mut SingleSpawner {
        debug_assert!(
            check_root(self.root, &comm),
            "root {} is not a valid rank in the new communicator",
            self.root
        );
        self.comm = comm;
        self
    }

    /// Launches the processes. Blocks until the launch primitive returns;
    /// how long that takes is up to the runtime.
    pub fn spawn(&self) -> SpawnResult {
        self.launch(false)
    }

    /// Like [`SingleSpawner::spawn`], but additionally captures one status
    /// code per requested process slot in the result.
    pub fn spawn_with_errcodes(&self) -> SpawnResult {
        self.launch(true)
    }

    fn launch(&self, want_errcodes: bool) -> SpawnResult {
        debug_assert!(!self.command.is_empty(), "spawn command must not be empty");
        debug_assert!(check_root(self.root, &self.comm));
        let argv = flatten_argv(&self.argv);
        let maxprocs = self
            .maxprocs
            .value_as::<usize>()
            .expect("Process count cannot be expressed as a usize.");
        let (handle, errcodes) =
            runtime::spawn(&self.command, &argv, maxprocs, self.info.as_raw());
        SpawnResult {
            intercomm: InterCommunicator::from_handle(handle),
            requested: self.maxprocs,
            errcodes: want_errcodes.then_some(errcodes),
        }
    }
}

/// Builder for launching several different executables at once.
///
/// Commands, argument vectors, process counts, and info objects are kept
/// as parallel arrays sharing one length, the executable count. Whole-array
/// setters require a replacement of exactly that length; the indexed
/// `*_at` setters are bounds-checked and return [`Error::OutOfRange`] for
/// a bad index.
///
/// # Standard section(s)
///
/// 10.3.3
#[derive(Debug, Clone)]
pub struct MultipleSpawner {
    commands: Vec<String>,
    argvs: Vec<Vec<(String, String)>>,
    maxprocs: Vec<Count>,
    infos: Vec<Info>,
    root: Rank,
    comm: SystemCommunicator,
}

impl MultipleSpawner {
    /// Creates a spawner from `(command, maxprocs)` pairs, one per
    /// executable, rooted at rank 0 of the world communicator with empty
    /// argument vectors and info objects.
    ///
    /// Every pair is validated individually, then the sum of all process
    /// counts is validated against the runtime's capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpx::MultipleSpawner;
    ///
    /// let multi = MultipleSpawner::new([("foo", 2), ("bar", 3)]);
    /// assert_eq!(multi.size(), 2);
    /// assert_eq!(multi.total_maxprocs(), 5);
    /// ```
    pub fn new<C, I>(pairs: I) -> MultipleSpawner
    where
        C: Into<String>,
        I: IntoIterator<Item = (C, Count)>,
    {
        let mut commands = Vec::new();
        let mut maxprocs = Vec::new();
        for (command, count) in pairs {
            let command = command.into();
            debug_assert!(!command.is_empty(), "spawn command must not be empty");
            debug_assert!(
                check_maxprocs(count, runtime::universe_size()),
                "process count {} outside (0, {:?}]",
                count,
                runtime::universe_size()
            );
            commands.push(command);
            maxprocs.push(count);
        }
        debug_assert!(
            !commands.is_empty(),
            "a multiple spawner needs at least one executable"
        );
        debug_assert!(
            check_total_maxprocs(&maxprocs, runtime::universe_size()),
            "total process count {} exceeds capacity {:?}",
            maxprocs.iter().sum::<Count>(),
            runtime::universe_size()
        );
        let len = commands.len();
        let spawner = MultipleSpawner {
            commands,
            argvs: vec![Vec::new(); len],
            maxprocs,
            infos: (0..len).map(|_| Info::new()).collect(),
            root: 0,
            comm: SystemCommunicator::world(),
        };
        debug_assert!(spawner.arrays_synchronized());
        spawner
    }

    /// Builds a multiple spawner by merging existing single spawners.
    ///
    /// All merged spawners must share the same root and the same
    /// communicator; their commands, argument vectors, process counts, and
    /// info objects are concatenated in argument order.
    pub fn from_single_spawners<I>(spawners: I) -> MultipleSpawner
    where
        I: IntoIterator<Item = SingleSpawner>,
    {
        let mut iter = spawners.into_iter();
        let first = iter
            .next()
            .expect("a multiple spawner needs at least one executable");
        let mut merged = MultipleSpawner {
            commands: vec![first.command],
            argvs: vec![first.argv],
            maxprocs: vec![first.maxprocs],
            infos: vec![first.info],
            root: first.root,
            comm: first.comm,
        };
        for spawner in iter {
            merged.push(spawner);
        }
        debug_assert!(check_total_maxprocs(
            &merged.maxprocs,
            runtime::universe_size()
        ));
        merged
    }

    /// Appends one single spawner. It must share this spawner's root and
    /// communicator.
    pub fn push(&mut self, spawner: SingleSpawner) -> &mut MultipleSpawner {
        debug_assert!(
            spawner.root == self.root && spawner.comm == self.comm,
            "merged spawners must share root and communicator"
        );
        self.commands.push(spawner.command);
        self.argvs.push(spawner.argv);
        self.maxprocs.push(spawner.maxprocs);
        self.infos.push(spawner.info);
        debug_assert!(self.arrays_synchronized());
        debug_assert!(check_total_maxprocs(
            &self.maxprocs,
            runtime::universe_size()
        ));
        self
    }

    /// Concatenates another multiple spawner onto this one. Both must
    /// share root and communicator.
    pub fn merge(&mut self, other: MultipleSpawner) -> &mut MultipleSpawner {
        debug_assert!(
            other.root == self.root && other.comm == self.comm,
            "merged spawners must share root and communicator"
        );
        self.commands.extend(other.commands);
        self.argvs.extend(other.argvs);
        self.maxprocs.extend(other.maxprocs);
        self.infos.extend(other.infos);
        debug_assert!(self.arrays_synchronized());
        debug_assert!(check_total_maxprocs(
            &self.maxprocs,
            runtime::universe_size()
        ));
        self
    }

    /// The executable count: the shared length of the parallel arrays.
    pub fn size(&self) -> usize {
        debug_assert!(self.arrays_synchronized());
        self.commands.len()
    }

    /// The sum of all per-executable process counts.
    pub fn total_maxprocs(&self) -> Count {
        self.maxprocs.iter().sum()
    }

    /// The executables to launch.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Replaces every command. The replacement must cover exactly the
    /// current executable count.
    pub fn set_commands<C, I>(&mut self, commands: I) -> &mut MultipleSpawner
    where
        C: Into<String>,
        I: IntoIterator<Item = C>,
    {
        let commands: Vec<String> = commands.into_iter().map(Into::into).collect();
        debug_assert!(
            commands.len() == self.size(),
            "replacement has {} commands for {} executables",
            commands.len(),
            self.size()
        );
        debug_assert!(commands.iter().all(|c| !c.is_empty()));
        self.commands = commands;
        debug_assert!(self.arrays_synchronized());
        self
    }

    /// Replaces the command of the executable at `index`.
    pub fn set_command_at(
        &mut self,
        index: usize,
        command: impl Into<String>,
    ) -> Result<&mut MultipleSpawner, Error> {
        self.check_index(index)?;
        let command = command.into();
        debug_assert!(!command.is_empty(), "spawn command must not be empty");
        self.commands[index] = command;
        Ok(self)
    }

    /// The per-executable `(key, value)` argument pairs, keys normalized.
    pub fn argvs(&self) -> &[Vec<(String, String)>] {
        &self.argvs
    }

    /// Appends argument pairs to every executable at once; the outer
    /// sequence must hold exactly one inner sequence per executable.
    pub fn add_argv<K, V, P, I>(&mut self, argvs: I) -> &mut MultipleSpawner
    where
        K: ToString,
        V: ToString,
        P: IntoIterator<Item = (K, V)>,
        I: IntoIterator<Item = P>,
    {
        let additions: Vec<Vec<(String, String)>> = argvs
            .into_iter()
            .map(|pairs| {
                pairs
                    .into_iter()
                    .map(|(key, value)| {
                        let key = normalize_argv_key(&key.to_string());
                        debug_assert!(
                            argv_key_is_meaningful(&key),
                            "argument key consists only of the marker character"
                        );
                        (key, value.to_string())
                    })
                    .collect()
            })
            .collect();
        debug_assert!(
            additions.len() == self.size(),
            "replacement has {} argument vectors for {} executables",
            additions.len(),
            self.size()
        );
        for (argv, addition) in self.argvs.iter_mut().zip(additions) {
            argv.extend(addition);
        }
        self
    }

    /// Appends one `(key, value)` argument pair to the executable at
    /// `index`.
    pub fn add_argv_at<K: ToString, V: ToString>(
        &mut self,
        index: usize,
        key: K,
        value: V,
    ) -> Result<&mut MultipleSpawner, Error> {
        self.check_index(index)?;
        let key = normalize_argv_key(&key.to_string());
        debug_assert!(
            argv_key_is_meaningful(&key),
            "argument key consists only of the marker character"
        );
        self.argvs[index].push((key, value.to_string()));
        Ok(self)
    }

    /// The per-executable process counts.
    pub fn maxprocs(&self) -> &[Count] {
        &self.maxprocs
    }

    /// Replaces every process count. The replacement must cover exactly
    /// the current executable count, each count must be individually
    /// valid, and the new sum must stay within capacity.
    pub fn set_maxprocs<I>(&mut self, counts: I) -> &mut MultipleSpawner
    where
        I: IntoIterator<Item = Count>,
    {
        let counts: Vec<Count> = counts.into_iter().collect();
        debug_assert!(
            counts.len() == self.size(),
            "replacement has {} counts for {} executables",
            counts.len(),
            self.size()
        );
        debug_assert!(
            check_total_maxprocs(&counts, runtime::universe_size()),
            "total process count {} exceeds capacity {:?}",
            counts.iter().sum::<Count>(),
            runtime::universe_size()
        );
        self.maxprocs = counts;
        debug_assert!(self.arrays_synchronized());
        self
    }

    /// Replaces the process count of the executable at `index`. The new
    /// count and the new total must satisfy the same bounds as a full
    /// replacement.
    pub fn set_maxprocs_at(
        &mut self,
        index: usize,
        maxprocs: Count,
    ) -> Result<&mut MultipleSpawner, Error> {
        self.check_index(index)?;
        debug_assert!(
            {
                let mut counts = self.maxprocs.clone();
                counts[index] = maxprocs;
                check_total_maxprocs(&counts, runtime::universe_size())
            },
            "process count {} at index {} violates capacity {:?}",
            maxprocs,
            index,
            runtime::universe_size()
        );
        self.maxprocs[index] = maxprocs;
        Ok(self)
    }

    /// The per-executable info objects.
    pub fn spawn_infos(&self) -> &[Info] {
        &self.infos
    }

    /// Replaces every info object. The replacement must cover exactly the
    /// current executable count.
    pub fn set_spawn_info<I>(&mut self, infos: I) -> &mut MultipleSpawner
    where
        I: IntoIterator<Item = Info>,
    {
        let infos: Vec<Info> = infos.into_iter().collect();
        debug_assert!(
            infos.len() == self.size(),
            "replacement has {} info objects for {} executables",
            infos.len(),
            self.size()
        );
        self.infos = infos;
        debug_assert!(self.arrays_synchronized());
        self
    }

    /// Replaces the info object of the executable at `index`.
    pub fn set_spawn_info_at(
        &mut self,
        index: usize,
        info: Info,
    ) -> Result<&mut MultipleSpawner, Error> {
        self.check_index(index)?;
        self.infos[index] = info;
        Ok(self)
    }

    /// The rank that performs the launch.
    pub fn root(&self) -> Rank {
        self.root
    }

    /// Replaces the launching rank. Must be a valid rank within the
    /// current communicator.
    pub fn set_root(&mut self, root: Rank) -> &mut MultipleSpawner {
        debug_assert!(
            check_root(root, &self.comm),
            "root {} is not a valid rank in the communicator",
            root
        );
        self.root = root;
        self
    }

    /// The communicator scope of the launch.
    pub fn communicator(&self) -> SystemCommunicator {
        self.comm
    }

    /// Replaces the communicator scope. The current root must be a valid
    /// rank within the new communicator as well.
    pub fn set_communicator(&mut self, comm: SystemCommunicator) -> &mut MultipleSpawner {
        debug_assert!(
            check_root(self.root, &comm),
            "root {} is not a valid rank in the new communicator",
            self.root
        );
        self.comm = comm;
        self
    }

    /// Launches all executables. Blocks until the launch primitive
    /// returns.
    pub fn spawn(&self) -> SpawnResult {
        self.launch(false)
    }

    /// Like [`MultipleSpawner::spawn`], but additionally captures one
    /// status code per requested process slot, across all executables in
    /// argument order.
    pub fn spawn_with_errcodes(&self) -> SpawnResult {
        self.launch(true)
    }

    fn launch(&self, want_errcodes: bool) -> SpawnResult {
        debug_assert!(self.arrays_synchronized());
        debug_assert!(check_root(self.root, &self.comm));
        let argvs: Vec<Vec<String>> = self
            .argvs
            .iter()
            .map(|pairs| flatten_argv(pairs).into_vec())
            .collect();
        let counts: SmallVec<[usize; 4]> = self
            .maxprocs
            .iter()
            .map(|&n| {
                n.value_as::<usize>()
                    .expect("Process count cannot be expressed as a usize.")
            })
            .collect();
        let raw_infos: SmallVec<[RawInfo; 4]> =
            self.infos.iter().map(|info| info.as_raw()).collect();
        let (handle, errcodes) =
            runtime::spawn_multiple(&self.commands, &argvs, &counts, &raw_infos);
        SpawnResult {
            intercomm: InterCommunicator::from_handle(handle),
            requested: self.total_maxprocs(),
            errcodes: want_errcodes.then_some(errcodes),
        }
    }

    /// The parallel arrays must stay length-synchronized at every
    /// mutation point.
    fn arrays_synchronized(&self) -> bool {
        self.argvs.len() == self.commands.len()
            && self.maxprocs.len() == self.commands.len()
            && self.infos.len() == self.commands.len()
    }

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index < self.commands.len() {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                index,
                len: self.commands.len(),
            })
        }
    }
}

/// The outcome of a spawn invocation: the inter-communicator linking to
/// the launched processes and, when requested, one status code per
/// process slot. Read-only after construction.
#[derive(Debug)]
pub struct SpawnResult {
    intercomm: InterCommunicator,
    requested: Count,
    errcodes: Option<Vec<ErrCode>>,
}

impl SpawnResult {
    /// The inter-communicator linking to the spawned processes.
    pub fn communicator(&self) -> &InterCommunicator {
        &self.intercomm
    }

    /// Consumes the result, keeping only the inter-communicator.
    pub fn into_communicator(self) -> InterCommunicator {
        self.intercomm
    }

    /// The total number of process slots that were requested.
    pub fn requested(&self) -> Count {
        self.requested
    }

    /// One status code per requested slot, if the errcodes variant of
    /// spawn was used.
    pub fn errcodes(&self) -> Option<&[ErrCode]> {
        self.errcodes.as_deref()
    }

    /// Whether every requested slot was launched. Without captured status
    /// codes this falls back to comparing the remote group size against
    /// the request.
    pub fn all_succeeded(&self) -> bool {
        match &self.errcodes {
            Some(codes) => codes.iter().all(|&code| code == runtime::SUCCESS),
            None => self.intercomm.remote_size() == self.requested,
        }
    }

    /// The slots that failed to launch, with a human-readable description
    /// per slot. Empty when status codes were not captured.
    pub fn failures(&self) -> Vec<(usize, String)> {
        self.errcodes
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .filter(|&(_, &code)| code != runtime::SUCCESS)
            .map(|(slot, &code)| (slot, error_kind(code).description_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxprocs_bounds_with_known_capacity() {
        assert!(check_maxprocs(1, Some(10)));
        assert!(check_maxprocs(10, Some(10)));
        assert!(!check_maxprocs(0, Some(10)));
        assert!(!check_maxprocs(-3, Some(10)));
        assert!(!check_maxprocs(11, Some(10)));
    }

    #[test]
    fn maxprocs_bounds_with_unknown_capacity() {
        assert!(check_maxprocs(1_000_000, None));
        assert!(!check_maxprocs(0, None));
        assert!(!check_maxprocs(-1, None));
    }

    #[test]
    fn total_maxprocs_is_bounded_even_when_parts_are_valid() {
        assert!(check_total_maxprocs(&[5, 5], Some(10)));
        assert!(!check_total_maxprocs(&[5, 6], Some(10)));
        assert!(!check_total_maxprocs(&[5, 0], Some(10)));
        assert!(check_total_maxprocs(&[100, 200], None));
    }

    #[test]
    fn argv_keys_are_normalized() {
        assert_eq!(normalize_argv_key("key"), "-key");
        assert_eq!(normalize_argv_key("-key"), "-key");
        assert_eq!(normalize_argv_key("--key"), "--key");
        assert!(argv_key_is_meaningful("-key"));
        assert!(!argv_key_is_meaningful("-"));
        assert!(!argv_key_is_meaningful("--"));
    }

    #[test]
    fn flatten_alternates_keys_and_values_and_drops_empty_values() {
        let pairs = vec![
            ("-np".to_string(), "4".to_string()),
            ("-verbose".to_string(), String::new()),
            ("-host".to_string(), "node01".to_string()),
        ];
        let flat = flatten_argv(&pairs);
        assert_eq!(
            flat.as_slice(),
            ["-np", "4", "-verbose", "-host", "node01"]
        );
    }

    #[test]
    fn single_spawner_accumulates_state_fluently() {
        let mut spawner = SingleSpawner::new("worker", 2);
        spawner
            .add_argv("np", 4)
            .add_argv("-flag", "")
            .set_maxprocs(3)
            .set_root(0);
        assert_eq!(spawner.command(), "worker");
        assert_eq!(spawner.maxprocs(), 3);
        assert_eq!(spawner.root(), 0);
        assert_eq!(
            spawner.argv(),
            [
                ("-np".to_string(), "4".to_string()),
                ("-flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn empty_command_is_structural_misuse() {
        let _ = SingleSpawner::new("", 1);
    }

    #[test]
    #[should_panic(expected = "process count")]
    fn zero_maxprocs_is_structural_misuse() {
        let _ = SingleSpawner::new("worker", 0);
    }

    #[test]
    #[should_panic(expected = "process count")]
    fn negative_maxprocs_is_structural_misuse() {
        let _ = SingleSpawner::new("worker", -2);
    }

    #[test]
    #[should_panic(expected = "marker")]
    fn marker_only_argv_key_is_structural_misuse() {
        let mut spawner = SingleSpawner::new("worker", 1);
        spawner.add_argv("-", "value");
    }

    #[test]
    #[should_panic(expected = "not a valid rank")]
    fn out_of_range_root_is_structural_misuse() {
        let mut spawner = SingleSpawner::new("worker", 1);
        spawner.set_root(1);
    }

    #[test]
    #[should_panic(expected = "not a valid rank")]
    fn null_communicator_is_structural_misuse() {
        let mut spawner = SingleSpawner::new("worker", 1);
        spawner.set_communicator(SystemCommunicator::null());
    }

    #[test]
    fn multiple_spawner_tracks_parallel_arrays() {
        let mut multi = MultipleSpawner::new([("foo", 2), ("bar", 3)]);
        assert_eq!(multi.size(), 2);
        assert_eq!(multi.total_maxprocs(), 5);
        assert_eq!(multi.commands(), ["foo", "bar"]);
        multi.set_commands(["baz", "qux"]);
        assert_eq!(multi.commands(), ["baz", "qux"]);
        multi.set_maxprocs([1, 1]);
        assert_eq!(multi.total_maxprocs(), 2);
    }

    #[test]
    fn indexed_setters_report_out_of_range_indices() {
        let mut multi = MultipleSpawner::new([("foo", 1)]);
        assert!(multi.set_command_at(0, "bar").is_ok());
        assert_eq!(
            multi.set_command_at(3, "bar").unwrap_err(),
            Error::OutOfRange { index: 3, len: 1 }
        );
        assert_eq!(
            multi.set_maxprocs_at(1, 2).unwrap_err(),
            Error::OutOfRange { index: 1, len: 1 }
        );
        assert_eq!(
            multi.add_argv_at(9, "k", "v").unwrap_err(),
            Error::OutOfRange { index: 9, len: 1 }
        );
        assert_eq!(
            multi.set_spawn_info_at(1, crate::Info::new()).unwrap_err(),
            Error::OutOfRange { index: 1, len: 1 }
        );
    }

    #[test]
    fn add_argv_distributes_per_executable() {
        let mut multi = MultipleSpawner::new([("foo", 1), ("bar", 1)]);
        multi.add_argv([vec![("a", "1")], vec![("b", "2"), ("c", "3")]]);
        assert_eq!(multi.argvs()[0], [("-a".to_string(), "1".to_string())]);
        assert_eq!(multi.argvs()[1].len(), 2);
        multi.add_argv_at(0, "d", 4).unwrap();
        assert_eq!(multi.argvs()[0].len(), 2);
    }

    #[test]
    fn merging_singles_concatenates_in_argument_order() {
        let mut first = SingleSpawner::new("foo", 2);
        first.add_argv("np", 4);
        let second = SingleSpawner::new("bar", 3);
        let multi = MultipleSpawner::from_single_spawners([first, second]);
        assert_eq!(multi.size(), 2);
        assert_eq!(multi.commands(), ["foo", "bar"]);
        assert_eq!(multi.maxprocs(), [2, 3]);
        assert_eq!(multi.argvs()[0].len(), 1);
        assert!(multi.argvs()[1].is_empty());
    }

    #[test]
    fn merging_multiples_concatenates_in_argument_order() {
        let mut multi = MultipleSpawner::new([("foo", 1)]);
        multi.merge(MultipleSpawner::new([("bar", 2), ("baz", 3)]));
        assert_eq!(multi.commands(), ["foo", "bar", "baz"]);
        assert_eq!(multi.total_maxprocs(), 6);
    }

    #[test]
    #[should_panic(expected = "share root and communicator")]
    fn merging_with_differing_scope_is_structural_misuse() {
        let first = SingleSpawner::new("foo", 1);
        let mut second = SingleSpawner::new("bar", 1);
        second.set_communicator(SystemCommunicator::self_comm());
        let _ = MultipleSpawner::from_single_spawners([first, second]);
    }

    #[test]
    #[should_panic(expected = "replacement has")]
    fn length_mismatched_replacement_is_structural_misuse() {
        let mut multi = MultipleSpawner::new([("foo", 1), ("bar", 1)]);
        multi.set_maxprocs([1]);
    }
}
