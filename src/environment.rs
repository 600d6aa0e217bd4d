//! Environmental management
//!
//! This module provides ways for a program to interact with its runtime
//! environment: initialization and finalization, thread-support
//! negotiation, and identity/version/capacity queries.

use std::cmp::Ordering;
use std::env;
use std::marker::PhantomData;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::error::Error;
use crate::runtime;
use crate::topology::SystemCommunicator;

/// Global context
pub struct Universe(PhantomData<()>);

impl Universe {
    /// The 'world communicator'
    ///
    /// Contains all processes initially partaking in the computation.
    pub fn world(&self) -> SystemCommunicator {
        SystemCommunicator::world()
    }

    /// How many processes the runtime can host in total, or `None` if it
    /// does not know.
    ///
    /// Every spawner validates its requested process counts against this
    /// capacity; an unknown capacity means only lower bounds are enforced.
    ///
    /// # Standard section(s)
    ///
    /// 10.5.3
    pub fn size(&self) -> Option<usize> {
        runtime::universe_size()
    }

    /// The application number this process was assigned when it was
    /// spawned, or `None` if it was started directly.
    ///
    /// # Standard section(s)
    ///
    /// 10.5.3
    pub fn appnum(&self) -> Option<i32> {
        runtime::appnum()
    }
}

impl Drop for Universe {
    fn drop(&mut self) {
        runtime::finalize();
    }
}

/// Describes the various levels of multithreading that can be supported by
/// the runtime.
///
/// # Standard section(s)
///
/// 12.4.3
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Threading {
    /// All processes partaking in the computation are single-threaded.
    Single,
    /// Processes may be multi-threaded, but runtime functions will only
    /// ever be called from the main thread.
    Funneled,
    /// Processes may be multi-threaded, but calls to runtime functions will
    /// not be made concurrently. The user is responsible for serializing
    /// the calls.
    Serialized,
    /// Processes may be multi-threaded with no restrictions on the use of
    /// runtime functions from the threads.
    Multiple,
}

impl Threading {
    /// The raw value understood by the primitive layer
    fn as_raw(self) -> i32 {
        use self::Threading::*;
        match self {
            Single => runtime::THREAD_SINGLE,
            Funneled => runtime::THREAD_FUNNELED,
            Serialized => runtime::THREAD_SERIALIZED,
            Multiple => runtime::THREAD_MULTIPLE,
        }
    }
}

impl PartialOrd<Threading> for Threading {
    fn partial_cmp(&self, other: &Threading) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Threading {
    fn cmp(&self, other: &Threading) -> Ordering {
        self.as_raw().cmp(&other.as_raw())
    }
}

impl From<i32> for Threading {
    fn from(i: i32) -> Threading {
        use self::Threading::*;
        if i == runtime::THREAD_SINGLE {
            return Single;
        } else if i == runtime::THREAD_FUNNELED {
            return Funneled;
        } else if i == runtime::THREAD_SERIALIZED {
            return Serialized;
        } else if i == runtime::THREAD_MULTIPLE {
            return Multiple;
        }
        panic!("Unknown threading level: {}", i)
    }
}

/// Initialize the runtime.
///
/// If the runtime has not been initialized so far, initializes and returns
/// a representation of the `Universe` which provides access to additional
/// functions. Otherwise returns `None`.
///
/// Equivalent to: `initialize_with_threading(Threading::Single)`
///
/// # Standard section(s)
///
/// 8.7
pub fn initialize() -> Option<Universe> {
    initialize_with_threading(Threading::Single)
        .ok()
        .map(|x| x.0)
}

/// Initialize the runtime with the desired level of multithreading support.
///
/// Tries to initialize with the desired level of multithreading support and
/// returns the `Universe` together with the level actually provided.
///
/// If the runtime cannot satisfy the requested level, returns
/// [`Error::Threading`] carrying both the requested and the provided level,
/// so the caller can decide whether to degrade gracefully or abort. A
/// second initialization attempt while a `Universe` is live returns
/// [`Error::AlreadyInitialized`].
///
/// # Standard section(s)
///
/// 12.4.3
pub fn initialize_with_threading(threading: Threading) -> Result<(Universe, Threading), Error> {
    if runtime::is_initialized() {
        return Err(Error::AlreadyInitialized);
    }
    let provided = Threading::from(runtime::init_thread(threading.as_raw()));
    if provided < threading {
        // Leave the runtime uninitialized so the caller can retry lower.
        runtime::finalize();
        return Err(Error::Threading {
            requested: threading,
            provided,
        });
    }
    Ok((Universe(PhantomData), provided))
}

/// Level of multithreading supported by the runtime
///
/// See the `Threading` enum.
///
/// # Standard section(s)
///
/// 12.4.3
pub fn threading_support() -> Threading {
    runtime::thread_support().into()
}

/// Identifies the version of the process-management interface implemented
/// by this library.
///
/// Returns a tuple of `(version, subversion)`.
///
/// Can be called without initializing the runtime.
pub fn version() -> (i32, i32) {
    let major = env!("CARGO_PKG_VERSION_MAJOR")
        .parse()
        .expect("package major version is not a number");
    let minor = env!("CARGO_PKG_VERSION_MINOR")
        .parse()
        .expect("package minor version is not a number");
    (major, minor)
}

/// Describes the runtime library itself.
///
/// Can be called without initializing the runtime.
pub fn library_version() -> String {
    format!("mpx embedded runtime {}", env!("CARGO_PKG_VERSION"))
}

/// Names the processor that the calling process is running on.
///
/// Resolved from the environment; falls back to a static name on hosts
/// that do not export one.
pub fn processor_name() -> String {
    env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Time in seconds since an arbitrary time in the past.
///
/// The cheapest high-resolution monotonic timer available will be used.
pub fn time() -> f64 {
    EPOCH.elapsed().as_secs_f64()
}

/// Resolution of the timer used in `time()` in seconds
pub fn time_resolution() -> f64 {
    1.0e-9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threading_levels_are_totally_ordered() {
        use Threading::*;
        assert!(Single < Funneled);
        assert!(Funneled < Serialized);
        assert!(Serialized < Multiple);
        assert_eq!(Multiple.max(Single), Multiple);
    }

    #[test]
    fn threading_round_trips_through_raw() {
        use Threading::*;
        for level in [Single, Funneled, Serialized, Multiple] {
            assert_eq!(Threading::from(level.as_raw()), level);
        }
    }

    #[test]
    fn version_matches_package_metadata() {
        let (major, minor) = version();
        assert!(major >= 0 && minor >= 0);
        assert!(library_version().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn time_is_monotonic() {
        let earlier = time();
        assert!(time() >= earlier);
        assert!(time_resolution() > 0.0);
    }
}
