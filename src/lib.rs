#![doc = include_str!("../README.md")]

mod multi;
pub use multi::*;

mod collector;
pub use collector::*;

#[cfg(feature = "anyhow")]
mod interop;
#[cfg(feature = "anyhow")]
pub use interop::from_anyhow;
