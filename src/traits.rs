//! Re-exports all traits.

pub use crate::raw::traits::*;
pub use crate::topology::traits::*;
