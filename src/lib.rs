//! Process management and key-value configuration for message-passing
//! programs
//!
//! This library provides the dynamic-process-management slice of a
//! message-passing interface in a rustic shape: insertion-ordered
//! key-value [`Info`] objects, builders for launching one
//! ([`SingleSpawner`]) or several ([`MultipleSpawner`]) executables on a
//! number of processes, and the environment surface
//! (initialization, thread-support negotiation, capacity queries) they
//! rely on. Launches are served by an embedded single-node runtime that
//! starts real operating-system processes.
//!
//! # Usage
//!
//! Add the `mpx` crate as a dependency in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mpx = "0.1.0"
//! ```
//!
//! Then use it in your program like this:
//!
//! ```no_run
//! use mpx::traits::*;
//!
//! fn main() {
//!     let universe = mpx::initialize().unwrap();
//!     println!("capacity: {:?}", universe.size());
//!
//!     let mut spawner = mpx::SingleSpawner::new("worker", 2);
//!     spawner.add_argv("threads", 4);
//!     let child = spawner.spawn_with_errcodes();
//!     assert_eq!(child.communicator().remote_size(), 2);
//! }
//! ```
//!
//! # Features
//!
//! The bindings follow the process-management and info chapters of the
//! MPI 3.1 specification.
//!
//! Currently supported:
//!
//! - **Info objects**: creation, duplication, upsert/lookup/delete,
//!   position-based enumeration, iteration with write-through proxies,
//!   merge/extract, the well-known environment info
//! - **Process creation**: single- and multiple-executable spawners with
//!   argument-vector building, per-executable info objects, capacity
//!   validation, and per-slot status codes
//! - **Environmental management**: initialization with thread-support
//!   negotiation, capacity and application-number queries, version and
//!   timer queries
//!
//! Not supported (and out of scope):
//!
//! - Point-to-point and collective communication
//! - One-sided communication (RMA)
//! - Datatypes and parallel I/O
//! - Connecting independently started processes (ports, name publishing)
//!
//! The sub-modules contain a more detailed description of which features
//! are and are not supported.

pub mod environment;
pub mod error;
pub mod info;
pub mod raw;
pub mod runtime;
pub mod spawn;
pub mod topology;
pub mod traits;

pub use crate::environment::{
    initialize, initialize_with_threading, threading_support, Threading, Universe,
};
pub use crate::error::{Error, ErrorKind};
pub use crate::info::Info;
pub use crate::spawn::{MultipleSpawner, SingleSpawner, SpawnResult};
pub use crate::topology::{Rank, SystemCommunicator};

/// Encodes number of processes in spawn requests.
pub type Count = i32;
