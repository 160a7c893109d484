use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::utils::path_component;

/// One audio item of an album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    source_url: String,
    index: u32,
}

impl Track {
    /// Build a track from an extracted title. The title is filtered for
    /// filesystem use; `index` is the 1-based position within the album.
    pub fn new(raw_title: &str, source_url: impl Into<String>, index: u32) -> Self {
        Self {
            title: path_component(raw_title, &format!("Track {}", index)),
            source_url: source_url.into(),
            index,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A resolved album. Track order is the order the extractor returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    title: String,
    artist: String,
    year: i32,
    tracks: Vec<Track>,
    cover_art_url: String,
}

impl Album {
    pub fn new(
        raw_title: &str,
        raw_artist: &str,
        year: i32,
        tracks: Vec<Track>,
        cover_art_url: impl Into<String>,
    ) -> Self {
        let title = path_component(raw_title, "Unknown Album");
        Self {
            tracks: distinct_titles(&title, tracks),
            title,
            artist: path_component(raw_artist, "Unknown Artist"),
            year,
            cover_art_url: cover_art_url.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn cover_art_url(&self) -> &str {
        &self.cover_art_url
    }

    /// `<root>/<artist>/<title>`
    pub fn directory(&self, root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(&self.artist).join(&self.title)
    }
}

/// Tracks share one directory, so every file name must be unique. Filtering
/// can map different titles to the same name ("A/B" and "A_B"); later
/// duplicates get their position appended. Compared case-insensitively.
fn distinct_titles(album: &str, mut tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    for track in &mut tracks {
        if seen.insert(track.title.to_lowercase()) {
            continue;
        }
        let mut suffix = track.index;
        let mut renamed = format!("{} ({})", track.title, suffix);
        while !seen.insert(renamed.to_lowercase()) {
            suffix += 1;
            renamed = format!("{} ({})", track.title, suffix);
        }
        warn!(
            "Album {}: track {} '{}' collides with an earlier track, saving as '{}'",
            album, track.index, track.title, renamed
        );
        track.title = renamed;
    }
    tracks
}

/// Process-unique identifier of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a job. Variants are declared in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Pending,
    Resolving,
    Preparing,
    Downloading,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// A track whose fetch or tagging failed without failing the album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFailure {
    pub index: u32,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        tracks: usize,
        failed_tracks: Vec<TrackFailure>,
        elapsed: Duration,
    },
    Failed {
        reason: String,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Everything a job reports to whoever submitted it
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Free-form status line
    Status(String),
    /// Identifying information, available once the album is resolved
    Info { title: String, subtitle: String },
    Progress { completed: usize, total: usize },
    /// The job was aborted; `reason` is human readable
    Error { url: String, reason: String },
    /// Always the last event of a job, delivered exactly once
    Finished(JobOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn track_title_is_filtered() {
        let track = Track::new("Intro: Part 1/2", "https://music.youtube.com/watch?v=1", 1);
        assert_eq!(track.title(), "Intro_ Part 1_2");
        assert_eq!(track.index(), 1);
    }

    #[test]
    fn empty_track_title_falls_back_to_position() {
        let track = Track::new("", "https://music.youtube.com/watch?v=7", 7);
        assert_eq!(track.title(), "Track 7");
    }

    #[test]
    fn album_directory_uses_filtered_names() {
        let album = Album::new("Live: 1979", "AC/DC", 0, Vec::new(), "");
        assert_eq!(
            album.directory(Path::new("/music")),
            Path::new("/music/AC_DC/Live_ 1979")
        );
    }

    #[test]
    fn colliding_track_titles_are_made_distinct() {
        let tracks = vec![
            Track::new("A/B", "https://music.youtube.com/watch?v=1", 1),
            Track::new("A_B", "https://music.youtube.com/watch?v=2", 2),
            Track::new("a_b", "https://music.youtube.com/watch?v=3", 3),
            Track::new("Outro", "https://music.youtube.com/watch?v=4", 4),
        ];
        let album = Album::new("Album", "Artist", 0, tracks, "");
        let titles: Vec<_> = album.tracks().iter().map(Track::title).collect();
        assert_eq!(titles, vec!["A_B", "A_B (2)", "a_b (3)", "Outro"]);
    }

    #[test]
    fn states_are_ordered() {
        assert!(JobState::Pending < JobState::Resolving);
        assert!(JobState::Resolving < JobState::Preparing);
        assert!(JobState::Preparing < JobState::Downloading);
        assert!(JobState::Downloading < JobState::Completed);
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Downloading.is_terminal());
    }
}
