//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::publish::PublishError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} {}: {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("{program} exited with code {code}")]
    CommandFailed { program: String, code: i32 },

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_path_display() {
        let err = Error::io_path(
            "renaming",
            Path::new("/tmp/a.mp4"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("renaming"));
        assert!(msg.contains("/tmp/a.mp4"));
    }

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            program: "postprocess.sh".to_string(),
            code: 2,
        };
        assert_eq!(err.to_string(), "postprocess.sh exited with code 2");
    }
}
