//! stream-archiver library crate.
//!
//! Records scheduled live streams with an external capture program, then
//! hands finished recordings to a post-processing stage and a publishing
//! stage. The stages communicate only through the filesystem.

pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod scheduler;
pub mod services;
pub mod signal;
pub mod utils;

pub use error::{Error, Result};
