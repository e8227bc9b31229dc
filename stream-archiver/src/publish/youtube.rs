//! YouTube Data API publish client.
//!
//! Authentication refreshes an OAuth2 access token from credentials stored by
//! a previous interactive consent. Uploads use the resumable upload protocol
//! with the file body streamed from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::client::{PublishClient, PublishReceipt};
use super::error::PublishError;
use super::metadata::VideoMetadata;
use crate::config::UploadConfig;
use crate::utils::http_client;

const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";
const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Client secrets file as downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// Stored OAuth2 credentials. Only the refresh token is required; the other
/// fields override the client secrets file when present.
#[derive(Debug, Deserialize)]
struct StoredCredentials {
    refresh_token: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    id: String,
}

/// Authenticated YouTube session.
#[derive(Clone)]
pub struct YouTubeSession {
    access_token: String,
}

impl std::fmt::Debug for YouTubeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeSession")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Publishes videos to YouTube.
pub struct YouTubeClient {
    http: reqwest::Client,
    client_secrets: PathBuf,
    token_file: PathBuf,
    max_retries: u32,
}

impl YouTubeClient {
    pub fn new(
        client_secrets: impl Into<PathBuf>,
        token_file: impl Into<PathBuf>,
        max_retries: u32,
    ) -> Result<Self, PublishError> {
        Ok(Self {
            http: http_client::build_client(CONNECT_TIMEOUT)?,
            client_secrets: client_secrets.into(),
            token_file: token_file.into(),
            max_retries,
        })
    }

    pub fn from_config(config: &UploadConfig) -> Result<Self, PublishError> {
        Self::new(
            config.client_secrets.clone(),
            config.token_file.clone(),
            config.max_retries,
        )
    }

    async fn load_secret(&self) -> Result<ClientSecret, PublishError> {
        let content = tokio::fs::read_to_string(&self.client_secrets).await?;
        let file: ClientSecretsFile = serde_json::from_str(&content).map_err(|e| {
            PublishError::auth(format!(
                "invalid client secrets {}: {}",
                self.client_secrets.display(),
                e
            ))
        })?;
        file.installed.or(file.web).ok_or_else(|| {
            PublishError::auth(format!(
                "client secrets {} has neither an 'installed' nor a 'web' section",
                self.client_secrets.display()
            ))
        })
    }

    async fn load_credentials(&self) -> Result<StoredCredentials, PublishError> {
        let content = tokio::fs::read_to_string(&self.token_file).await?;
        serde_json::from_str(&content).map_err(|e| {
            PublishError::auth(format!(
                "invalid stored credentials {}: {}",
                self.token_file.display(),
                e
            ))
        })
    }

    /// Upload the file once, returning the new video id.
    async fn upload_once(
        &self,
        session: &YouTubeSession,
        file: &Path,
        metadata: &VideoMetadata,
    ) -> Result<String, PublishError> {
        let size = tokio::fs::metadata(file).await?.len();

        let response = self
            .http
            .post(format!("{UPLOAD_BASE}/videos"))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&session.access_token)
            .header("X-Upload-Content-Length", size.to_string())
            .header("X-Upload-Content-Type", "video/*")
            .json(&video_resource(metadata))
            .send()
            .await?;
        let response = check_status(response).await?;

        let upload_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PublishError::InvalidResponse("resumable session without Location header".into())
            })?
            .to_string();
        debug!(file = %file.display(), size, "Resumable upload session created");

        let body = reqwest::Body::wrap_stream(ReaderStream::new(tokio::fs::File::open(file).await?));
        let response = self
            .http
            .put(upload_url)
            .bearer_auth(&session.access_token)
            .header(CONTENT_LENGTH, size)
            .header(CONTENT_TYPE, "video/*")
            .body(body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let video: VideoResponse = response.json().await.map_err(|e| {
            PublishError::InvalidResponse(format!("upload response without video id: {}", e))
        })?;
        Ok(video.id)
    }

    async fn set_thumbnail(
        &self,
        session: &YouTubeSession,
        video_id: &str,
        thumbnail: &Path,
    ) -> Result<(), PublishError> {
        let bytes = tokio::fs::read(thumbnail).await?;
        let response = self
            .http
            .post(format!("{UPLOAD_BASE}/thumbnails/set"))
            .query(&[("videoId", video_id)])
            .bearer_auth(&session.access_token)
            .header(CONTENT_TYPE, image_content_type(thumbnail))
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn add_to_playlist(
        &self,
        session: &YouTubeSession,
        video_id: &str,
        playlist_id: &str,
    ) -> Result<(), PublishError> {
        let response = self
            .http
            .post(format!("{API_BASE}/playlistItems"))
            .query(&[("part", "snippet")])
            .bearer_auth(&session.access_token)
            .json(&playlist_item_resource(playlist_id, video_id))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PublishClient for YouTubeClient {
    type Session = YouTubeSession;

    async fn authenticate(&self) -> Result<YouTubeSession, PublishError> {
        let secret = self.load_secret().await?;
        let credentials = self.load_credentials().await?;

        let client_id = credentials.client_id.unwrap_or(secret.client_id);
        let client_secret = credentials.client_secret.unwrap_or(secret.client_secret);
        let token_uri = credentials.token_uri.unwrap_or(secret.token_uri);

        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;

        let response = check_status(response)
            .await
            .map_err(|e| PublishError::auth(format!("token refresh failed: {}", e)))?;
        let token: TokenResponse = response.json().await.map_err(|e| {
            PublishError::auth(format!("token endpoint returned no access token: {}", e))
        })?;

        debug!(expires_in = ?token.expires_in, "Access token refreshed");
        Ok(YouTubeSession {
            access_token: token.access_token,
        })
    }

    async fn publish(
        &self,
        session: &YouTubeSession,
        file: &Path,
        metadata: &VideoMetadata,
    ) -> Result<PublishReceipt, PublishError> {
        let mut attempt = 0;
        let video_id = loop {
            match self.upload_once(session, file, metadata).await {
                Ok(id) => break id,
                Err(e) if e.is_retriable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        file = %file.display(),
                        error = %e,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Retriable upload error, restarting upload"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        };
        info!(file = %file.display(), video_id = %video_id, "Video uploaded");

        if let Some(thumbnail) = &metadata.thumbnail {
            // The video is already live at this point; a missing thumbnail is cosmetic.
            if let Err(e) = self.set_thumbnail(session, &video_id, thumbnail).await {
                warn!(video_id = %video_id, error = %e, "Failed to set thumbnail");
            }
        }

        if let Some(playlist_id) = &metadata.playlist_id {
            self.add_to_playlist(session, &video_id, playlist_id).await?;
            info!(video_id = %video_id, playlist_id = %playlist_id, "Video added to playlist");
        }

        Ok(PublishReceipt {
            video_id,
            playlist_id: metadata.playlist_id.clone(),
        })
    }
}

/// Turn a non-success response into [`PublishError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

/// Extract `error.message` from a Google API error body, falling back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn video_resource(metadata: &VideoMetadata) -> Value {
    let mut snippet = json!({
        "title": metadata.title,
        "description": metadata.description,
        "tags": metadata.keywords,
        "categoryId": metadata.category_id,
        "defaultLanguage": metadata.language,
    });
    if let Some(lang) = &metadata.default_audio_language {
        snippet["defaultAudioLanguage"] = json!(lang);
    }

    let mut status = json!({
        "privacyStatus": metadata.privacy_status.as_str(),
        "license": metadata.license.as_str(),
        "publicStatsViewable": metadata.public_stats_viewable,
        "selfDeclaredMadeForKids": metadata.made_for_kids,
    });
    if let Some(publish_at) = &metadata.publish_at {
        status["publishAt"] = json!(publish_at);
    }

    json!({ "snippet": snippet, "status": status })
}

fn playlist_item_resource(playlist_id: &str, video_id: &str) -> Value {
    json!({
        "snippet": {
            "playlistId": playlist_id,
            "resourceId": {
                "kind": "youtube#video",
                "videoId": video_id,
            },
        },
    })
}

fn image_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::metadata::{MetadataDefaults, PrivacyStatus};

    #[test]
    fn test_video_resource() {
        let mut metadata = VideoMetadata::for_file(
            Path::new("pv179_2024-01-02_14-00-00.mp4"),
            &MetadataDefaults::default(),
            None,
        );
        metadata.privacy_status = PrivacyStatus::Private;
        metadata.publish_at = Some("2024-01-03T08:00:00Z".to_string());

        let resource = video_resource(&metadata);
        assert_eq!(resource["snippet"]["title"], "pv179_2024-01-02_14-00-00");
        assert_eq!(resource["snippet"]["categoryId"], "27");
        assert_eq!(resource["snippet"]["tags"][0], "lecture");
        assert!(resource["snippet"].get("defaultAudioLanguage").is_none());
        assert_eq!(resource["status"]["privacyStatus"], "private");
        assert_eq!(resource["status"]["license"], "youtube");
        assert_eq!(resource["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(resource["status"]["publishAt"], "2024-01-03T08:00:00Z");
    }

    #[test]
    fn test_playlist_item_resource() {
        let resource = playlist_item_resource("PL1", "abc123");
        assert_eq!(resource["snippet"]["playlistId"], "PL1");
        assert_eq!(resource["snippet"]["resourceId"]["videoId"], "abc123");
        assert_eq!(resource["snippet"]["resourceId"]["kind"], "youtube#video");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 403, "message": "The request cannot be completed because you have exceeded your quota."}}"#;
        assert_eq!(
            api_error_message(body),
            "The request cannot be completed because you have exceeded your quota."
        );
        assert_eq!(api_error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_client_secrets_parse() {
        let file: ClientSecretsFile = serde_json::from_str(
            r#"{"installed": {"client_id": "id", "client_secret": "secret", "redirect_uris": ["http://localhost"]}}"#,
        )
        .unwrap();
        let secret = file.installed.unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type(Path::new("thumb.PNG")), "image/png");
        assert_eq!(image_content_type(Path::new("thumb.jpg")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_authenticate_missing_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let client = YouTubeClient::new(
            temp_dir.path().join("client_secrets.json"),
            temp_dir.path().join("oauth2.json"),
            0,
        )
        .unwrap();
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, PublishError::Io(_)));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_secrets_without_section() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let secrets = temp_dir.path().join("client_secrets.json");
        tokio::fs::write(&secrets, r#"{"other": {}}"#).await.unwrap();
        let client = YouTubeClient::new(secrets, temp_dir.path().join("oauth2.json"), 0).unwrap();

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, PublishError::Auth(_)));
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = YouTubeSession {
            access_token: "ya29.secret".to_string(),
        };
        assert!(!format!("{:?}", session).contains("ya29"));
    }
}
