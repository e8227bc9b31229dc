//! Service layer module.
//!
//! Provides the container that starts and stops the recorder and the two
//! pipeline stages.

pub mod container;

pub use container::{Service, ServiceContainer, ShutdownSummary};
