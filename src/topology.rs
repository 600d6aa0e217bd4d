//! Organizing processes as communicators
//!
//! Upon initialization of the library (via `initialize()` or
//! `initialize_with_threading()`) a singleton `Universe` is created. All
//! processes initially partaking in the computation are organized in the
//! 'world communicator', available as a property of the `Universe`.
//! Processes are addressed via their `Rank` within a specific communicator.
//!
//! Spawning new processes produces an [`InterCommunicator`] that links the
//! spawning group to the group of spawned children.
//!
//! # Standard section(s)
//!
//! 6.4, 10.3

use conv::ConvUtil;

use crate::raw::AsRaw;
use crate::runtime;
use crate::runtime::RawComm;

/// Topology traits
pub mod traits {
    pub use super::Communicator;
}

/// Identifies a certain process within a communicator.
pub type Rank = i32;

/// Communicators are contexts for process management
pub trait Communicator: AsRaw<Raw = RawComm> {
    /// Number of processes in this communicator
    ///
    /// # Standard section(s)
    ///
    /// 6.4.1
    fn size(&self) -> Rank {
        runtime::comm_size(self.as_raw())
            .value_as()
            .expect("Communicator size exceeds the range of a C int.")
    }

    /// The `Rank` that identifies the calling process within this
    /// communicator
    ///
    /// # Standard section(s)
    ///
    /// 6.4.1
    fn rank(&self) -> Rank {
        runtime::comm_rank(self.as_raw())
    }

    /// Whether this is the null communicator
    fn is_null(&self) -> bool {
        self.as_raw() == runtime::COMM_NULL
    }
}

/// A communicator whose handle is owned by the runtime and lives until
/// finalization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SystemCommunicator(RawComm);

impl SystemCommunicator {
    /// The 'world communicator'
    ///
    /// Contains all processes initially partaking in the computation.
    ///
    /// # Standard section(s)
    ///
    /// 6.2
    pub fn world() -> SystemCommunicator {
        SystemCommunicator(runtime::COMM_WORLD)
    }

    /// The 'self communicator'
    ///
    /// Contains only the calling process.
    ///
    /// # Standard section(s)
    ///
    /// 6.2
    pub fn self_comm() -> SystemCommunicator {
        SystemCommunicator(runtime::COMM_SELF)
    }

    /// The null communicator. Not a valid scope for any operation; only
    /// useful to probe for misuse.
    pub fn null() -> SystemCommunicator {
        SystemCommunicator(runtime::COMM_NULL)
    }
}

impl AsRaw for SystemCommunicator {
    type Raw = RawComm;
    fn as_raw(&self) -> Self::Raw {
        self.0
    }
}

impl crate::raw::RawCommunicator for SystemCommunicator {}

impl Communicator for SystemCommunicator {}

/// A communicator linking the local group to a remote group of spawned
/// processes.
///
/// The handle is exclusively owned: dropping the wrapper disconnects it,
/// which blocks until every child process in the remote group has
/// terminated.
///
/// # Standard section(s)
///
/// 6.6, 10.3
#[derive(Debug)]
pub struct InterCommunicator {
    handle: Option<RawComm>,
}

impl InterCommunicator {
    pub(crate) fn from_handle(handle: RawComm) -> InterCommunicator {
        InterCommunicator {
            handle: Some(handle),
        }
    }

    /// Number of processes in the remote group, i.e. the number of children
    /// that were actually launched.
    ///
    /// # Standard section(s)
    ///
    /// 6.6.1
    pub fn remote_size(&self) -> Rank {
        runtime::comm_remote_size(self.as_raw())
            .value_as()
            .expect("Remote group size exceeds the range of a C int.")
    }

    /// Disconnects from the remote group, blocking until every child has
    /// terminated. Dropping the communicator has the same effect.
    ///
    /// # Standard section(s)
    ///
    /// 10.5.4
    pub fn disconnect(mut self) {
        if let Some(handle) = self.handle.take() {
            runtime::comm_disconnect(handle);
        }
    }
}

impl AsRaw for InterCommunicator {
    type Raw = RawComm;
    fn as_raw(&self) -> Self::Raw {
        debug_assert!(self.handle.is_some(), "use of a disconnected communicator");
        self.handle.unwrap_or(runtime::COMM_NULL)
    }
}

impl crate::raw::RawCommunicator for InterCommunicator {}

impl Communicator for InterCommunicator {}

impl Drop for InterCommunicator {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            runtime::comm_disconnect(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_is_a_singleton_scope() {
        let world = SystemCommunicator::world();
        assert_eq!(world.size(), 1);
        assert_eq!(world.rank(), 0);
        assert!(!world.is_null());
        assert_eq!(world, SystemCommunicator::world());
    }

    #[test]
    fn null_communicator_has_no_processes() {
        let null = SystemCommunicator::null();
        assert!(null.is_null());
        assert_eq!(null.size(), 0);
    }

    #[test]
    fn world_and_self_are_distinct_scopes() {
        assert_ne!(SystemCommunicator::world(), SystemCommunicator::self_comm());
    }
}
