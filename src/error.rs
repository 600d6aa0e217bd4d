//! Error handling and constants
//!
//! Two kinds of failure surface from this library. Structural misuse of the
//! API (empty commands, malformed argument keys, out-of-range process
//! counts, mismatched parallel arrays) is a checked precondition: fatal in
//! debug builds, compiled out in release builds, never catchable. Runtime
//! conditions a caller can reasonably recover from are reported through
//! [`Error`]: indexed accessors carry the offending index and the valid
//! bound, thread-support negotiation carries the requested and the provided
//! level. Per-process launch failures are data, delivered as status codes
//! in the spawn result rather than through either channel.
//!
//! # Standard section(s)
//!
//! 8.4

use thiserror::Error;

use crate::environment::Threading;
use crate::runtime;
use crate::runtime::ErrCode;

/// Success constant for easier checking of per-process status codes.
pub const MPX_SUCCESS: ErrCode = runtime::SUCCESS;

macro_rules! build_error_kind {
    {
        $(#[$doc:meta])*
        pub enum $name:ident {
            $(
                 #[$err_doc:meta]
                 #[err($code:ident)]
                 $kind:ident,
            )*
        }
    } => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $(
            #[$err_doc]
            $kind,
            )*
        }

        impl $name {
            /// Convert a raw status code into an error class, as a Rust enum.
            pub(crate) fn from_raw(err: ErrCode) -> Option<$name> {
                $(
                if err == runtime::$code {
                    return Some($name::$kind)
                }
                )*
                None
            }

            fn as_raw(self) -> ErrCode {
                match self {
                    $(
                    $name::$kind => runtime::$code,
                    )*
                }
            }
        }
    }
}

build_error_kind! {
    /// Set of error classes a status code can belong to.
    pub enum ErrorKind {
        /// Invalid info object
        #[err(ERR_INFO)]
        Info,
        /// Key longer than the protocol bound, or empty
        #[err(ERR_INFO_KEY)]
        InfoKey,
        /// Key not present in the info object
        #[err(ERR_INFO_NOKEY)]
        InfoNokey,
        /// Value longer than the protocol bound, or empty
        #[err(ERR_INFO_VALUE)]
        InfoValue,
        /// Invalid argument of some other kind
        #[err(ERR_ARG)]
        Arg,
        /// Invalid root argument
        #[err(ERR_ROOT)]
        Root,
        /// Invalid communicator argument
        #[err(ERR_COMM)]
        Comm,
        /// Error in spawning processes
        #[err(ERR_SPAWN)]
        Spawn,
        /// Internal runtime error
        #[err(ERR_INTERN)]
        Intern,
        /// Known error not in this list
        #[err(ERR_UNKNOWN)]
        Unknown,
    }
}

impl ErrorKind {
    /// A human-readable description of this error class, as reported by the
    /// runtime's error-string lookup.
    pub fn description_string(self) -> String {
        runtime::error_string(self.as_raw())
    }
}

/// Crate-internal function for mapping from a status code to an `ErrorKind`
pub(crate) fn error_kind(res: ErrCode) -> ErrorKind {
    match ErrorKind::from_raw(res) {
        Some(kind) => kind,
        None => panic!("could not find matching ErrorKind for returncode '{}'", res),
    }
}

/// A recoverable error condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An indexed spawner accessor was called with an index past the number
    /// of executables it manages.
    #[error("index {index} is out of range for a spawner with {len} executables")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// The number of executables, i.e. the exclusive upper bound.
        len: usize,
    },

    /// The runtime cannot provide the requested level of thread support.
    /// The caller may retry with the provided level or abort.
    #[error("requested thread support {requested:?} but the runtime provides {provided:?}")]
    Threading {
        /// The level asked for.
        requested: Threading,
        /// The level the runtime actually provides.
        provided: Threading,
    },

    /// The runtime was already initialized by an earlier call.
    #[error("the runtime is already initialized")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_raw_codes() {
        for kind in [
            ErrorKind::Info,
            ErrorKind::InfoKey,
            ErrorKind::InfoNokey,
            ErrorKind::InfoValue,
            ErrorKind::Arg,
            ErrorKind::Root,
            ErrorKind::Comm,
            ErrorKind::Spawn,
            ErrorKind::Intern,
            ErrorKind::Unknown,
        ] {
            assert_eq!(ErrorKind::from_raw(kind.as_raw()), Some(kind));
        }
    }

    #[test]
    fn success_is_not_an_error_kind() {
        assert_eq!(ErrorKind::from_raw(MPX_SUCCESS), None);
    }

    #[test]
    fn out_of_range_formats_index_and_bound() {
        let err = Error::OutOfRange { index: 5, len: 2 };
        let msg = err.to_string();
        assert!(msg.contains('5') && msg.contains('2'));
    }
}
