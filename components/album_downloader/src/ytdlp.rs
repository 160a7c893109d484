use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{DownloadError, Result};
use crate::services::{MetadataExtractor, TrackFetcher};
use crate::types::{Album, Track};
use crate::utils::validate_domain;

const YT_DLP: &str = "yt-dlp";

/// Extension of every file the fetcher produces
pub const AUDIO_EXTENSION: &str = "mp3";

/// Album titles on the catalog carry this prefix
const ALBUM_PREFIX: &str = "Album - ";

/// Stderr fragments yt-dlp prints when the service refuses a URL
const REJECTION_MARKERS: [&str; 7] = [
    "private",
    "unavailable",
    "not available",
    "sign in",
    "blocked",
    "forbidden",
    "http error 403",
];

/// yt-dlp driven extraction and audio fetching
pub struct YtDlp {
    expected_domain: String,
}

impl YtDlp {
    pub fn new(expected_domain: impl Into<String>) -> Self {
        Self {
            expected_domain: expected_domain.into(),
        }
    }
}

#[async_trait]
impl MetadataExtractor for YtDlp {
    async fn check_available(&self) -> Result<()> {
        which::which(YT_DLP)
            .map(|_| ())
            .map_err(|_| DownloadError::DependencyNotFound(YT_DLP))
    }

    async fn resolve(&self, url: &str) -> Result<Album> {
        let url = validate_domain(url, &self.expected_domain)?;
        debug!("Resolving {} with {} --flat-playlist", url, YT_DLP);

        let output = Command::new(YT_DLP)
            .arg("--flat-playlist")
            .arg("--dump-single-json")
            .arg("--no-download")
            .arg("--quiet")
            .arg(url.as_str())
            .output()
            .await
            .map_err(|e| DownloadError::ExtractionFailed(format!("failed to run {}: {}", YT_DLP, e)))?;

        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let listing: FlatListing = serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::ExtractionFailed(e.to_string()))?;

        let album = album_from_listing(url.as_str(), listing)?;
        info!(
            "Resolved '{}' by '{}' with {} tracks",
            album.title(),
            album.artist(),
            album.tracks().len()
        );
        Ok(album)
    }
}

#[async_trait]
impl TrackFetcher for YtDlp {
    async fn fetch(&self, url: &str, folder: &Path, title: &str) -> Result<PathBuf> {
        // Output template is absolute so nothing depends on the working directory
        let folder = tokio::fs::canonicalize(folder)
            .await
            .map_err(|e| DownloadError::fetch(url, e.to_string()))?;
        let template = output_template(&folder, title);
        let template = template
            .to_str()
            .ok_or_else(|| DownloadError::fetch(url, "output path is not valid UTF-8"))?;

        debug!("Fetching {} to {}", url, template);

        let output = Command::new(YT_DLP)
            .arg("-x")
            .arg("--audio-format").arg(AUDIO_EXTENSION)
            .arg("--audio-quality").arg("0")
            .arg("--format").arg("bestaudio")
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("-o").arg(template)
            .arg(url)
            .output()
            .await
            .map_err(|e| DownloadError::fetch(url, format!("failed to run {}: {}", YT_DLP, e)))?;

        if !output.status.success() {
            return Err(DownloadError::fetch(
                url,
                format!(
                    "{} exited with status {}: {}",
                    YT_DLP,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(folder.join(format!("{}.{}", title, AUDIO_EXTENSION)))
    }
}

#[derive(Debug, Deserialize)]
struct FlatListing {
    title: Option<String>,
    entries: Option<Vec<Option<FlatEntry>>>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    uploader: Option<String>,
    channel: Option<String>,
    release_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    title: Option<String>,
    url: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

fn classify_failure(stderr: &str) -> DownloadError {
    let message = stderr.trim().to_string();
    let lowered = message.to_lowercase();
    if REJECTION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        DownloadError::ExtractionRejected(message)
    } else {
        DownloadError::ExtractionFailed(message)
    }
}

fn album_from_listing(url: &str, listing: FlatListing) -> Result<Album> {
    let entries = listing.entries.ok_or_else(|| DownloadError::NotAnAlbum {
        url: url.to_string(),
    })?;
    let entries: Vec<FlatEntry> = entries.into_iter().flatten().collect();

    let artist = entries
        .first()
        .and_then(|e| e.uploader.clone().or_else(|| e.channel.clone()))
        .or(listing.uploader)
        .or(listing.channel)
        .unwrap_or_default();

    let raw_title = listing.title.unwrap_or_default();
    let title = raw_title.strip_prefix(ALBUM_PREFIX).unwrap_or(&raw_title);

    // The smallest thumbnail sorts first; the second one is the usable cover
    let cover_art_url = listing
        .thumbnails
        .get(1)
        .or_else(|| listing.thumbnails.last())
        .map(|t| t.url.clone())
        .unwrap_or_default();

    let mut tracks = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(track_url) = entry.url else {
            debug!("Skipping entry without URL: {:?}", entry.title);
            continue;
        };
        let index = tracks.len() as u32 + 1;
        tracks.push(Track::new(
            entry.title.as_deref().unwrap_or_default(),
            track_url,
            index,
        ));
    }

    Ok(Album::new(
        title,
        &artist,
        listing.release_year.unwrap_or(0),
        tracks,
        cover_art_url,
    ))
}

/// yt-dlp output template for `title`. `%` starts a template field, so
/// literal percent signs in the title are doubled.
fn output_template(folder: &Path, title: &str) -> PathBuf {
    folder.join(format!("{}.%(ext)s", title.replace('%', "%%")))
}
