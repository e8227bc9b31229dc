//! Publishing of processed recordings.

use async_trait::async_trait;
use tracing::{info, warn};

use super::traits::{Processor, ProcessorOutput};
use crate::Result;
use crate::config::UploadConfig;
use crate::pipeline::work_queue::WorkItem;
use crate::publish::{
    MetadataDefaults, PlaylistBinding, PublishClient, VideoMetadata, resolve_playlist,
};

/// Publishes each file through a [`PublishClient`].
///
/// A fresh session is obtained per item, so a token that expired during a
/// long queue never affects later uploads.
pub struct PublishProcessor<C: PublishClient> {
    client: C,
    playlists: Vec<PlaylistBinding>,
    defaults: MetadataDefaults,
}

impl<C: PublishClient> PublishProcessor<C> {
    pub fn new(client: C, playlists: Vec<PlaylistBinding>, defaults: MetadataDefaults) -> Self {
        Self {
            client,
            playlists,
            defaults,
        }
    }

    pub fn from_config(client: C, config: &UploadConfig) -> Self {
        Self::new(client, config.playlists.clone(), config.metadata.clone())
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: PublishClient + 'static> Processor for PublishProcessor<C> {
    fn name(&self) -> &'static str {
        "PublishProcessor"
    }

    async fn process(&self, item: &WorkItem) -> Result<ProcessorOutput> {
        let start = std::time::Instant::now();
        let file = item.path();

        let session = self.client.authenticate().await?;

        let playlist_id = match resolve_playlist(&self.playlists, file) {
            Some(binding) => Some(binding.playlist_id.clone()),
            None => {
                warn!(file = %file.display(), "No playlist matches this file, publishing without one");
                None
            }
        };

        let metadata = VideoMetadata::for_file(file, &self.defaults, playlist_id);
        info!(file = %file.display(), title = %metadata.title, "Publishing");

        let receipt = self.client.publish(&session, file, &metadata).await?;

        let duration_secs = start.elapsed().as_secs_f64();
        info!(
            file = %file.display(),
            video_id = %receipt.video_id,
            playlist_id = ?receipt.playlist_id,
            "Published in {:.2}s",
            duration_secs
        );

        Ok(ProcessorOutput {
            duration_secs,
            remote_id: Some(receipt.video_id),
            ..Default::default()
        })
    }
}
