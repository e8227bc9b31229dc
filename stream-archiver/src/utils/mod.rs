//! Shared helpers.

pub mod command;
pub mod fs;
pub mod http_client;
pub mod output_reader;
