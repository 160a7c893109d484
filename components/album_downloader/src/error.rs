//! Error taxonomy for album downloads.
//!
//! Resolution and preparation errors abort a whole job. Fetch and tag errors
//! only ever affect the track they were raised for.

use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Required dependency not found: {0}")]
    DependencyNotFound(&'static str),

    #[error("URL not from {expected}")]
    InvalidDomain { url: String, expected: String },

    #[error("{url} is not an album")]
    NotAnAlbum { url: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("extraction rejected by service: {0}")]
    ExtractionRejected(String),

    #[error("failed to {operation}: {source}")]
    PreparationFailed {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("audio file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("cover art not found: {}", .0.display())]
    CoverArtMissing(PathBuf),

    #[error("failed to write tags to {}: {reason}", .path.display())]
    TagFailed { path: PathBuf, reason: String },
}

impl DownloadError {
    pub fn preparation(
        operation: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        DownloadError::PreparationFailed {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        DownloadError::FetchFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn tag(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DownloadError::TagFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that end the whole job rather than a single track
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            DownloadError::DependencyNotFound(_)
                | DownloadError::InvalidDomain { .. }
                | DownloadError::NotAnAlbum { .. }
                | DownloadError::ExtractionFailed(_)
                | DownloadError::ExtractionRejected(_)
                | DownloadError::PreparationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_domain_names_expected_host() {
        let err = DownloadError::InvalidDomain {
            url: "https://example.com/playlist?list=1".to_string(),
            expected: "music.youtube.com".to_string(),
        };
        assert_eq!(err.to_string(), "URL not from music.youtube.com");
        assert!(err.is_job_fatal());
    }

    #[test]
    fn track_errors_are_not_job_fatal() {
        assert!(!DownloadError::fetch("https://x", "boom").is_job_fatal());
        assert!(!DownloadError::FileNotFound(PathBuf::from("/a.mp3")).is_job_fatal());
        assert!(!DownloadError::CoverArtMissing(PathBuf::from("/cover.jpg")).is_job_fatal());
    }

    #[test]
    fn preparation_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DownloadError::preparation("create album directory", io);
        assert_eq!(err.to_string(), "failed to create album directory: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
