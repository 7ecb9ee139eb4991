//! SpacePython Ground Library (spslib)
//!
//! This library provides the procedure-facing side of SpacePython: the
//! catalog of space systems and ground devices, the handles used to reach
//! them, command and directive dispatch, waits and the procedure
//! environment.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod directives;
pub mod environment;
pub mod gems;
pub mod handle;
pub mod links;
pub mod loader;
pub mod system;
pub mod transport;
pub mod waits;

pub use catalog::*;
pub use commands::*;
pub use config::*;
pub use directives::*;
pub use environment::*;
pub use gems::*;
pub use handle::*;
pub use links::*;
pub use loader::*;
pub use system::*;
pub use transport::*;
pub use waits::*;
pub use spslibgs::*;
