//! Publishing of finished recordings to a video platform.

mod client;
mod error;
mod metadata;
mod playlist;
mod youtube;

pub use client::{PublishClient, PublishReceipt};
pub use error::PublishError;
pub use metadata::{MetadataDefaults, PrivacyStatus, VideoLicense, VideoMetadata};
pub use playlist::{PlaylistBinding, resolve_playlist};
pub use youtube::{YouTubeClient, YouTubeSession};
