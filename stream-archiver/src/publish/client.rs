//! Publishing backend abstraction.

use std::path::Path;

use async_trait::async_trait;

use super::error::PublishError;
use super::metadata::VideoMetadata;

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Platform identifier of the uploaded video.
    pub video_id: String,
    /// Playlist the video was added to, if any.
    pub playlist_id: Option<String>,
}

/// A publishing platform client.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Authenticated session handed to [`PublishClient::publish`].
    type Session: Send + Sync;

    /// Obtain a fresh session.
    async fn authenticate(&self) -> Result<Self::Session, PublishError>;

    /// Upload `file` with `metadata`.
    async fn publish(
        &self,
        session: &Self::Session,
        file: &Path,
        metadata: &VideoMetadata,
    ) -> Result<PublishReceipt, PublishError>;
}
