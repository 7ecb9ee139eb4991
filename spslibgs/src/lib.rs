//! SpacePython Ground/Space Library (spslibgs)
//!
//! This library contains the definitions shared by every part of the
//! procedural API: values, data kinds, the time types, restrictions and
//! parameters. Links, devices and the catalog live in spslib.

pub mod error;
pub mod types;
pub mod time;
pub mod kinds;
pub mod restriction;
pub mod parameter;

pub use error::*;
pub use types::*;
pub use time::*;
pub use kinds::*;
pub use restriction::*;
pub use parameter::*;
