use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lofty::{Accessor, MimeType, Picture, PictureType, Probe, Tag, TagExt, TagType, TaggedFileExt};
use tracing::debug;

use crate::error::{DownloadError, Result};
use crate::services::TagWriter;
use crate::types::{Album, Track};

/// Writes ID3v2 tags with lofty. Lofty does blocking file I/O, so every
/// write runs on the blocking pool.
pub struct LoftyTagWriter;

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn write_text_tags(&self, album: &Album, track: &Track, audio: &Path) -> Result<()> {
        let fields = TextFields {
            title: track.title().to_string(),
            album: album.title().to_string(),
            artist: album.artist().to_string(),
            track_number: track.index(),
        };
        let audio = audio.to_path_buf();
        run_blocking(audio.clone(), move || write_text_tags(&fields, &audio)).await
    }

    async fn write_cover_art(&self, cover: &Path, audio: &Path) -> Result<()> {
        let cover = cover.to_path_buf();
        let audio = audio.to_path_buf();
        run_blocking(audio.clone(), move || write_cover_art(&cover, &audio)).await
    }
}

struct TextFields {
    title: String,
    album: String,
    artist: String,
    track_number: u32,
}

async fn run_blocking<F>(audio: PathBuf, work: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DownloadError::tag(audio, e))?
}

fn read_id3v2(audio: &Path) -> Result<Option<Tag>> {
    if !audio.is_file() {
        return Err(DownloadError::FileNotFound(audio.to_path_buf()));
    }
    let tagged_file = Probe::open(audio)
        .and_then(|probe| probe.read())
        .map_err(|e| DownloadError::tag(audio, e))?;
    Ok(tagged_file.tag(TagType::Id3v2).cloned())
}

fn write_text_tags(fields: &TextFields, audio: &Path) -> Result<()> {
    let existing = read_id3v2(audio)?;

    // Start from an empty tag so stale text frames disappear; pictures survive
    let mut tag = Tag::new(TagType::Id3v2);
    if let Some(existing) = existing {
        for picture in existing.pictures() {
            tag.push_picture(picture.clone());
        }
    }

    tag.set_title(fields.title.clone());
    tag.set_album(fields.album.clone());
    tag.set_artist(fields.artist.clone());
    tag.set_track(fields.track_number);

    tag.save_to_path(audio)
        .map_err(|e| DownloadError::tag(audio, e))?;
    debug!("Wrote text tags to {}", audio.display());
    Ok(())
}

fn write_cover_art(cover: &Path, audio: &Path) -> Result<()> {
    let mut tag = read_id3v2(audio)?.unwrap_or_else(|| Tag::new(TagType::Id3v2));

    let data = std::fs::read(cover).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DownloadError::CoverArtMissing(cover.to_path_buf()),
        _ => DownloadError::tag(audio, e),
    })?;

    tag.remove_picture_type(PictureType::CoverFront);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Jpeg),
        Some("Cover".to_string()),
        data,
    ));

    tag.save_to_path(audio)
        .map_err(|e| DownloadError::tag(audio, e))?;
    debug!("Embedded {} into {}", cover.display(), audio.display());
    Ok(())
}
