//! Video metadata sent along with every published file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Visibility of a published video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    Private,
    #[default]
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
        }
    }
}

/// License attached to a published video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoLicense {
    #[default]
    #[serde(rename = "youtube")]
    Standard,
    #[serde(rename = "creativeCommon")]
    CreativeCommon,
}

impl VideoLicense {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "youtube",
            Self::CreativeCommon => "creativeCommon",
        }
    }
}

fn default_category_id() -> String {
    "27".to_string()
}

fn default_keywords() -> Vec<String> {
    vec![
        "lecture".to_string(),
        "recording".to_string(),
        "education".to_string(),
    ]
}

fn default_language() -> String {
    "cs".to_string()
}

fn default_true() -> bool {
    true
}

/// Per-deployment defaults for published metadata (`[upload.metadata]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDefaults {
    #[serde(default)]
    pub description: String,
    /// Platform category; "27" is Education.
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub default_audio_language: Option<String>,
    #[serde(default)]
    pub license: VideoLicense,
    #[serde(default = "default_true")]
    pub public_stats_viewable: bool,
    #[serde(default)]
    pub made_for_kids: bool,
    /// RFC 3339 timestamp for scheduled publication (requires private status).
    #[serde(default)]
    pub publish_at: Option<String>,
    /// Thumbnail image uploaded after the video.
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,
}

impl Default for MetadataDefaults {
    fn default() -> Self {
        Self {
            description: String::new(),
            category_id: default_category_id(),
            keywords: default_keywords(),
            privacy_status: PrivacyStatus::default(),
            language: default_language(),
            default_audio_language: None,
            license: VideoLicense::default(),
            public_stats_viewable: true,
            made_for_kids: false,
            publish_at: None,
            thumbnail: None,
        }
    }
}

/// Metadata for a single publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub keywords: Vec<String>,
    pub privacy_status: PrivacyStatus,
    pub language: String,
    pub default_audio_language: Option<String>,
    pub license: VideoLicense,
    pub public_stats_viewable: bool,
    pub made_for_kids: bool,
    pub publish_at: Option<String>,
    pub thumbnail: Option<PathBuf>,
    /// Collection the video is added to after upload.
    pub playlist_id: Option<String>,
}

impl VideoMetadata {
    /// Build metadata for `file`, titled after the file stem.
    pub fn for_file(file: &Path, defaults: &MetadataDefaults, playlist_id: Option<String>) -> Self {
        let title = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            title,
            description: defaults.description.clone(),
            category_id: defaults.category_id.clone(),
            keywords: defaults.keywords.clone(),
            privacy_status: defaults.privacy_status,
            language: defaults.language.clone(),
            default_audio_language: defaults.default_audio_language.clone(),
            license: defaults.license,
            public_stats_viewable: defaults.public_stats_viewable,
            made_for_kids: defaults.made_for_kids,
            publish_at: defaults.publish_at.clone(),
            thumbnail: defaults.thumbnail.clone(),
            playlist_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let defaults = MetadataDefaults::default();
        assert_eq!(defaults.category_id, "27");
        assert_eq!(defaults.privacy_status, PrivacyStatus::Unlisted);
        assert_eq!(defaults.language, "cs");
        assert_eq!(defaults.license.as_str(), "youtube");
        assert!(defaults.public_stats_viewable);
        assert!(!defaults.made_for_kids);
    }

    #[test]
    fn test_metadata_defaults_parse_partial() {
        let defaults: MetadataDefaults = toml::from_str(
            r#"
            privacy_status = "private"
            license = "creativeCommon"
            "#,
        )
        .unwrap();
        assert_eq!(defaults.privacy_status, PrivacyStatus::Private);
        assert_eq!(defaults.license, VideoLicense::CreativeCommon);
        assert_eq!(defaults.keywords.len(), 3);
    }

    #[test]
    fn test_metadata_title_from_stem() {
        let metadata = VideoMetadata::for_file(
            Path::new("/videos/pv179_2024-01-02_14-00-00.mp4"),
            &MetadataDefaults::default(),
            Some("PL1".to_string()),
        );
        assert_eq!(metadata.title, "pv179_2024-01-02_14-00-00");
        assert_eq!(metadata.playlist_id.as_deref(), Some("PL1"));
    }
}
