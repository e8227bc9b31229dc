//! Collection bindings for published files.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Associates files whose name starts with `prefix` with a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistBinding {
    /// Job name prefix matched against the file's base name.
    pub prefix: String,
    /// Platform playlist identifier.
    pub playlist_id: String,
}

impl PlaylistBinding {
    pub fn new(prefix: impl Into<String>, playlist_id: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            playlist_id: playlist_id.into(),
        }
    }
}

/// Resolve the playlist for `file`. The first binding in configured order wins.
pub fn resolve_playlist<'a>(bindings: &'a [PlaylistBinding], file: &Path) -> Option<&'a PlaylistBinding> {
    let name = file.file_name()?.to_str()?;
    bindings
        .iter()
        .find(|binding| !binding.prefix.is_empty() && name.starts_with(&binding.prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Vec<PlaylistBinding> {
        vec![
            PlaylistBinding::new("lecture", "PL1"),
            PlaylistBinding::new("seminar", "PL2"),
        ]
    }

    #[test]
    fn test_resolve_matching_prefix() {
        let bindings = bindings();
        let found = resolve_playlist(
            &bindings,
            Path::new("/upload/lecture_2024-01-01_10-00-00.mp4"),
        );
        assert_eq!(found.map(|b| b.playlist_id.as_str()), Some("PL1"));

        let found = resolve_playlist(&bindings, Path::new("seminar_2024-01-01_10-00-00.mp4"));
        assert_eq!(found.map(|b| b.playlist_id.as_str()), Some("PL2"));
    }

    #[test]
    fn test_resolve_no_match() {
        let bindings = bindings();
        assert!(resolve_playlist(&bindings, Path::new("misc_2024-01-01_10-00-00.mp4")).is_none());
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let bindings = vec![
            PlaylistBinding::new("pv", "PL-broad"),
            PlaylistBinding::new("pv179", "PL-narrow"),
        ];
        let found = resolve_playlist(&bindings, Path::new("pv179_2024-01-02_14-00-00.mp4"));
        assert_eq!(found.map(|b| b.playlist_id.as_str()), Some("PL-broad"));
    }

    #[test]
    fn test_resolve_ignores_directory_names() {
        let bindings = bindings();
        assert!(resolve_playlist(&bindings, Path::new("/lecture/misc_2024.mp4")).is_none());
    }
}
