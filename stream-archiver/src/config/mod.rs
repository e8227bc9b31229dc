//! Application configuration loaded from a TOML file.
//!
//! Every recognized option is a typed field with a documented default, so a
//! minimal file only needs the `[[schedules]]` it actually uses.

mod schedule;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use schedule::{ScheduleEntry, parse_time_of_day, parse_weekday, weekday_to_string};

use crate::publish::{MetadataDefaults, PlaylistBinding};
use crate::{Error, Result};

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_capture_program() -> String {
    "yt-dlp".to_string()
}

fn default_capture_args() -> Vec<String> {
    vec!["{url}".to_string(), "-o".to_string(), "{output}".to_string()]
}

fn default_workers() -> usize {
    1
}

fn default_postprocess_program() -> String {
    "postprocessing/postprocess.sh".to_string()
}

fn default_postprocess_args() -> Vec<String> {
    vec!["{input}".to_string()]
}

fn default_upload_watch_dir() -> PathBuf {
    PathBuf::from("postprocessing")
}

fn default_client_secrets() -> PathBuf {
    PathBuf::from("client_secrets.json")
}

fn default_token_file() -> PathBuf {
    PathBuf::from("oauth2.json")
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_retention_days() -> i64 {
    7
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
    #[serde(default)]
    pub postprocess: PostprocessConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Capture process settings (`[capture]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Directory recordings are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Final file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Capture program.
    #[serde(default = "default_capture_program")]
    pub program: String,
    /// Arguments; `{url}`, `{output}` and `{name}` are substituted.
    #[serde(default = "default_capture_args")]
    pub args: Vec<String>,
    /// Upper bound on simultaneous recordings. Unbounded when absent.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    /// Kill a capture that is still running this long after the interrupt.
    /// When absent the supervisor waits for the process indefinitely.
    #[serde(default)]
    pub stop_timeout_secs: Option<u64>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extension: default_extension(),
            program: default_capture_program(),
            args: default_capture_args(),
            max_concurrent: None,
            stop_timeout_secs: None,
        }
    }
}

/// Post-processing stage settings (`[postprocess]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessConfig {
    #[serde(default = "default_output_dir")]
    pub watch_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Enqueue ready files already present at startup.
    #[serde(default)]
    pub scan_existing: bool,
    #[serde(default = "default_postprocess_program")]
    pub program: String,
    /// Arguments; `{input}` is substituted with the file path.
    #[serde(default = "default_postprocess_args")]
    pub args: Vec<String>,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_output_dir(),
            workers: default_workers(),
            extension: default_extension(),
            scan_existing: false,
            program: default_postprocess_program(),
            args: default_postprocess_args(),
        }
    }
}

/// Publishing stage settings (`[upload]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_watch_dir")]
    pub watch_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub scan_existing: bool,
    /// OAuth client secrets downloaded from the platform console.
    #[serde(default = "default_client_secrets")]
    pub client_secrets: PathBuf,
    /// Stored OAuth credentials holding the refresh token.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    /// Attempts for retriable transport failures within one publish call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub metadata: MetadataDefaults,
    /// Collection bindings, matched in order.
    #[serde(default)]
    pub playlists: Vec<PlaylistBinding>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_upload_watch_dir(),
            workers: default_workers(),
            extension: default_extension(),
            scan_existing: false,
            client_secrets: default_client_secrets(),
            token_file: default_token_file(),
            max_retries: default_max_retries(),
            metadata: MetadataDefaults::default(),
            playlists: Vec::new(),
        }
    }
}

/// Logging settings (`[logging]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: None,
            retention_days: default_retention_days(),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io_path("reading config", path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_extension("capture", &self.capture.extension)?;
        validate_extension("postprocess", &self.postprocess.extension)?;
        validate_extension("upload", &self.upload.extension)?;

        if self.capture.program.trim().is_empty() {
            return Err(Error::config("capture.program must not be empty"));
        }
        if self.capture.max_concurrent == Some(0) {
            return Err(Error::config("capture.max_concurrent must be at least 1"));
        }
        if self.postprocess.workers == 0 {
            return Err(Error::config("postprocess.workers must be at least 1"));
        }
        if self.upload.workers == 0 {
            return Err(Error::config("upload.workers must be at least 1"));
        }
        if self.postprocess.program.trim().is_empty() {
            return Err(Error::config("postprocess.program must not be empty"));
        }
        if self.upload.playlists.iter().any(|p| p.prefix.is_empty()) {
            return Err(Error::config("upload.playlists entries need a non-empty prefix"));
        }
        if self.logging.retention_days < 1 {
            return Err(Error::config("logging.retention_days must be at least 1"));
        }
        Ok(())
    }
}

fn validate_extension(section: &str, extension: &str) -> Result<()> {
    if extension.is_empty() || extension.starts_with('.') || extension.contains(['/', '\\']) {
        return Err(Error::config(format!(
            "{}.extension must be a bare extension such as \"mp4\", got '{}'",
            section, extension
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PrivacyStatus;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = AppConfig::from_toml("").unwrap();
        assert!(config.schedules.is_empty());
        assert_eq!(config.capture.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.capture.program, "yt-dlp");
        assert_eq!(config.capture.args, vec!["{url}", "-o", "{output}"]);
        assert!(config.capture.max_concurrent.is_none());
        assert!(config.capture.stop_timeout_secs.is_none());
        assert_eq!(config.postprocess.workers, 1);
        assert_eq!(config.postprocess.watch_dir, PathBuf::from("outputs"));
        assert_eq!(config.upload.watch_dir, PathBuf::from("postprocessing"));
        assert_eq!(config.logging.retention_days, 7);
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml(
            r#"
            [capture]
            output_dir = "recordings"
            max_concurrent = 2

            [[schedules]]
            url = "https://cdn.example.com/munifia318.stream/playlist.m3u8"
            name = "pv179"
            duration = 120
            day = "tuesday"
            time = "14:00"

            [[schedules]]
            url = "https://cdn.example.com/munifia217.stream/playlist.m3u8"
            name = "pv293"
            duration = 120
            day = "wednesday"
            time = "14:00"

            [postprocess]
            workers = 3

            [upload]
            workers = 2

            [upload.metadata]
            privacy_status = "private"

            [[upload.playlists]]
            prefix = "pv179"
            playlist_id = "PL179"
            "#,
        )
        .unwrap();

        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[1].name(), "pv293");
        assert_eq!(config.capture.max_concurrent, Some(2));
        assert_eq!(config.postprocess.workers, 3);
        assert_eq!(config.upload.workers, 2);
        assert_eq!(config.upload.metadata.privacy_status, PrivacyStatus::Private);
        assert_eq!(config.upload.playlists[0].playlist_id, "PL179");
    }

    #[test]
    fn test_rejects_zero_workers() {
        let result = AppConfig::from_toml("[postprocess]\nworkers = 0\n");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let result = AppConfig::from_toml("[capture]\nextension = \".mp4\"\n");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rejects_bad_schedule_day() {
        let result = AppConfig::from_toml(
            r#"
            [[schedules]]
            url = "https://cdn.example.com/a.m3u8"
            name = "pv179"
            duration = 120
            day = "caturday"
            time = "14:00"
            "#,
        );
        assert!(result.is_err());
    }
}
