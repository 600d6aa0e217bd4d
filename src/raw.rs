//! Bridge between wrapper types and raw handle values

use crate::runtime::{RawComm, RawInfo};

/// Raw handle bridge traits
pub mod traits {
    pub use super::{AsRaw, RawCommunicator, RawInfoHandle};
}

/// A wrapper type that can identify as a raw handle understood by the
/// runtime's primitive layer.
pub trait AsRaw {
    /// The raw handle type
    type Raw;
    /// The raw value
    fn as_raw(&self) -> Self::Raw;
}

impl<'a, T: 'a + AsRaw> AsRaw for &'a T {
    type Raw = <T as AsRaw>::Raw;
    fn as_raw(&self) -> Self::Raw {
        (*self).as_raw()
    }
}

/// A type that can identify as a raw communicator handle
pub trait RawCommunicator: AsRaw<Raw = RawComm> {}
impl<'a, T: 'a + RawCommunicator> RawCommunicator for &'a T {}

/// A type that can identify as a raw info handle
pub trait RawInfoHandle: AsRaw<Raw = RawInfo> {}
impl<'a, T: 'a + RawInfoHandle> RawInfoHandle for &'a T {}
