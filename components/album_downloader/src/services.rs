//! Seams to the external tools a job drives.
//!
//! Every service is a trait object so the orchestration can be exercised
//! without yt-dlp, the network or real audio files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DownloaderConfig;
use crate::cover::HttpCoverArt;
use crate::error::Result;
use crate::tagging::LoftyTagWriter;
use crate::types::{Album, Track};
use crate::ytdlp::YtDlp;

#[async_trait]
pub trait MetadataExtractor {
    /// Check if the extractor is available and has all required dependencies
    async fn check_available(&self) -> Result<()>;

    /// Resolve an album URL into its ordered track list without downloading anything
    async fn resolve(&self, url: &str) -> Result<Album>;
}

#[async_trait]
pub trait TrackFetcher {
    /// Download the best available audio of `url` into `folder`, named after `title`.
    /// Returns the path of the written file.
    async fn fetch(&self, url: &str, folder: &Path, title: &str) -> Result<PathBuf>;
}

#[async_trait]
pub trait TagWriter {
    /// Replace the text tags of `audio` with the album and track fields
    async fn write_text_tags(&self, album: &Album, track: &Track, audio: &Path) -> Result<()>;

    /// Embed the image at `cover` as the front cover of `audio`
    async fn write_cover_art(&self, cover: &Path, audio: &Path) -> Result<()>;
}

#[async_trait]
pub trait CoverArtSource {
    /// Retrieve `url` into the file at `target`
    async fn download(&self, url: &str, target: &Path) -> Result<()>;
}

/// The set of services shared by every job of a scheduler
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn MetadataExtractor + Send + Sync>,
    pub fetcher: Arc<dyn TrackFetcher + Send + Sync>,
    pub tags: Arc<dyn TagWriter + Send + Sync>,
    pub cover_art: Arc<dyn CoverArtSource + Send + Sync>,
}

impl Services {
    /// yt-dlp for extraction and fetching, lofty for tags, HTTP for cover art
    pub fn production(config: &DownloaderConfig) -> Self {
        let ytdlp = Arc::new(YtDlp::new(&config.expected_domain));
        Self {
            extractor: ytdlp.clone(),
            fetcher: ytdlp,
            tags: Arc::new(LoftyTagWriter),
            cover_art: Arc::new(HttpCoverArt::new()),
        }
    }
}
