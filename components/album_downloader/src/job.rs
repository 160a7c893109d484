//! One album download, from URL to tagged files on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::DownloaderConfig;
use crate::cover::COVER_FILE_NAME;
use crate::error::{DownloadError, Result};
use crate::services::Services;
use crate::types::{Album, JobEvent, JobId, JobOutcome, JobState, Track, TrackFailure};
use crate::utils::validate_domain;

/// Point-in-time view of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub state: JobState,
    pub completed: usize,
    pub total: usize,
}

/// Serializes every state change and event of one job
pub(crate) struct Reporter {
    id: JobId,
    events: mpsc::UnboundedSender<JobEvent>,
    progress: Arc<Mutex<JobProgress>>,
}

impl Reporter {
    fn emit(&self, event: JobEvent) {
        // The caller may have stopped listening; the job still runs to the end
        let _ = self.events.send(event);
    }

    pub(crate) fn status(&self, text: impl Into<String>) {
        let _progress = self.progress.lock();
        self.emit(JobEvent::Status(text.into()));
    }

    fn info(&self, title: &str, subtitle: &str) {
        let _progress = self.progress.lock();
        self.emit(JobEvent::Info {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
        });
    }

    fn error(&self, url: &str, reason: String) {
        let _progress = self.progress.lock();
        self.emit(JobEvent::Error {
            url: url.to_string(),
            reason,
        });
    }

    /// Move forward to `next`. Going back or leaving a terminal state is ignored.
    fn advance(&self, next: JobState) {
        let mut progress = self.progress.lock();
        if progress.state.is_terminal() || next <= progress.state {
            warn!("Job {} ignored transition {:?} -> {:?}", self.id, progress.state, next);
            return;
        }
        progress.state = next;
    }

    fn set_total(&self, total: usize) {
        self.progress.lock().total = total;
    }

    fn track_finished(&self) {
        let mut progress = self.progress.lock();
        progress.completed = (progress.completed + 1).min(progress.total);
        self.emit(JobEvent::Progress {
            completed: progress.completed,
            total: progress.total,
        });
    }

    /// Consumes the reporter, so a job can only ever finish once
    pub(crate) fn finish(self, outcome: JobOutcome) {
        let _progress = self.progress.lock();
        self.emit(JobEvent::Finished(outcome));
    }
}

/// The caller's side of a submitted job
pub struct JobHandle {
    id: JobId,
    url: String,
    events: mpsc::UnboundedReceiver<JobEvent>,
    progress: Arc<Mutex<JobProgress>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn progress(&self) -> JobProgress {
        *self.progress.lock()
    }

    /// Next event, or `None` once the job finished and every event was read
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Drain events until the job finishes
    pub async fn wait(mut self) -> JobOutcome {
        while let Some(event) = self.events.recv().await {
            if let JobEvent::Finished(outcome) = event {
                return outcome;
            }
        }
        JobOutcome::Failed {
            reason: "job ended without reporting an outcome".to_string(),
        }
    }
}

pub struct AlbumDownloadJob {
    id: JobId,
    url: String,
    destination: PathBuf,
    services: Services,
    track_parallelism: usize,
    expected_domain: String,
    reporter: Reporter,
}

impl AlbumDownloadJob {
    pub fn new(
        id: JobId,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        services: Services,
        config: &DownloaderConfig,
    ) -> (Self, JobHandle) {
        let url = url.into();
        let (events, receiver) = mpsc::unbounded_channel();
        let progress = Arc::new(Mutex::new(JobProgress {
            state: JobState::Pending,
            completed: 0,
            total: 0,
        }));

        let job = Self {
            id,
            url: url.clone(),
            destination: destination.into(),
            services,
            track_parallelism: config.track_parallelism.max(1),
            expected_domain: config.expected_domain.clone(),
            reporter: Reporter {
                id,
                events,
                progress: progress.clone(),
            },
        };
        let handle = JobHandle {
            id,
            url,
            events: receiver,
            progress,
        };
        (job, handle)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run the job to its terminal state and deliver the finish event
    pub async fn run(self) -> JobOutcome {
        let outcome = self.execute().await;
        self.finish(outcome.clone());
        outcome
    }

    /// Run to a terminal state without sending the finish event, so the
    /// scheduler can release the slot before the caller hears about it
    pub(crate) async fn execute(&self) -> JobOutcome {
        let started = Instant::now();
        info!("Job {} started for {}", self.id, self.url);

        match self.download(started).await {
            Ok(outcome) => {
                self.reporter.advance(JobState::Completed);
                outcome
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Move to `Failed` and report `reason` to the caller
    pub(crate) fn fail(&self, reason: String) -> JobOutcome {
        error!("Job {} failed for {}: {}", self.id, self.url, reason);
        self.reporter.advance(JobState::Failed);
        self.reporter.error(&self.url, reason.clone());
        JobOutcome::Failed { reason }
    }

    /// Deliver the finish event. Consumes the job, so it happens once.
    pub(crate) fn finish(self, outcome: JobOutcome) {
        self.reporter.finish(outcome);
    }

    async fn download(&self, started: Instant) -> Result<JobOutcome> {
        self.reporter.advance(JobState::Resolving);
        self.reporter.status("Resolving");
        validate_domain(&self.url, &self.expected_domain)?;
        let album = self.services.extractor.resolve(&self.url).await?;

        let total = album.tracks().len();
        self.reporter.set_total(total);
        self.reporter.advance(JobState::Preparing);
        self.reporter.info(album.title(), album.artist());

        let failed_tracks: Vec<TrackFailure> = if total == 0 {
            info!("Job {}: '{}' has no tracks", self.id, album.title());
            Vec::new()
        } else {
            self.reporter.status("Preparing");
            let album_dir = prepare_directory(&self.destination, &album).await?;
            let cover = self.fetch_cover(&album, &album_dir).await?;

            self.reporter.advance(JobState::Downloading);
            self.reporter.status(format!("Downloading {} tracks", total));

            let album = &album;
            let album_dir = album_dir.as_path();
            let cover = cover.as_deref();
            // Collected eagerly: a spawned future cannot hold a closure over `&Track`
            let units: Vec<_> = album
                .tracks()
                .iter()
                .map(|track| self.download_track(album, track, album_dir, cover))
                .collect();
            futures::stream::iter(units)
                .buffer_unordered(self.track_parallelism)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .filter_map(|result| result.err())
                .collect()
        };

        let elapsed = started.elapsed();
        self.reporter.status(format!(
            "Download took {:.2} seconds",
            elapsed.as_secs_f64()
        ));
        if !failed_tracks.is_empty() {
            warn!(
                "Job {}: {} of {} tracks failed",
                self.id,
                failed_tracks.len(),
                total
            );
        }

        Ok(JobOutcome::Completed {
            tracks: total,
            failed_tracks,
            elapsed,
        })
    }

    async fn fetch_cover(&self, album: &Album, album_dir: &Path) -> Result<Option<PathBuf>> {
        if album.cover_art_url().is_empty() {
            warn!("Job {}: '{}' has no cover art", self.id, album.title());
            return Ok(None);
        }

        let target = album_dir.join(COVER_FILE_NAME);
        self.services
            .cover_art
            .download(album.cover_art_url(), &target)
            .await?;
        Ok(Some(target))
    }

    async fn download_track(
        &self,
        album: &Album,
        track: &Track,
        album_dir: &Path,
        cover: Option<&Path>,
    ) -> std::result::Result<(), TrackFailure> {
        info!(
            "Job {}: track {} '{}' from {}",
            self.id,
            track.index(),
            track.title(),
            track.source_url()
        );

        let result = self.fetch_and_tag(album, track, album_dir, cover).await;
        self.reporter.track_finished();

        result.map_err(|e| {
            warn!("Job {}: track {} '{}' failed: {}", self.id, track.index(), track.title(), e);
            TrackFailure {
                index: track.index(),
                title: track.title().to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn fetch_and_tag(
        &self,
        album: &Album,
        track: &Track,
        album_dir: &Path,
        cover: Option<&Path>,
    ) -> Result<()> {
        let audio = self
            .services
            .fetcher
            .fetch(track.source_url(), album_dir, track.title())
            .await?;

        // Both writes always run; the first error wins
        let text = self.services.tags.write_text_tags(album, track, &audio).await;
        let art = match cover {
            Some(cover) => self.services.tags.write_cover_art(cover, &audio).await,
            None => Ok(()),
        };
        text.and(art)
    }
}

/// Create `<root>/<artist>` if needed and replace `<root>/<artist>/<album>`
/// with an empty directory
async fn prepare_directory(root: &Path, album: &Album) -> Result<PathBuf> {
    let artist_dir = root.join(album.artist());
    tokio::fs::create_dir_all(&artist_dir)
        .await
        .map_err(|e| DownloadError::preparation(format!("create {}", artist_dir.display()), e))?;

    let album_dir = album.directory(root);
    match tokio::fs::remove_dir_all(&album_dir).await {
        Ok(()) => info!("Removed previous contents of {}", album_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(DownloadError::preparation(
                format!("remove {}", album_dir.display()),
                e,
            ))
        }
    }

    tokio::fs::create_dir(&album_dir)
        .await
        .map_err(|e| DownloadError::preparation(format!("create {}", album_dir.display()), e))?;
    Ok(album_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stub::{album, CoverArtStub, ExtractorStub, FetcherStub, StubServices, COVER_BYTES};
    use assert_matches::assert_matches;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://music.youtube.com/playlist?list=OLAK5uy_test";

    fn job(stubs: &StubServices, root: &Path, config: DownloaderConfig) -> (AlbumDownloadJob, JobHandle) {
        AlbumDownloadJob::new(JobId(1), URL, root, stubs.services(), &config)
    }

    async fn events(mut handle: JobHandle) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        events
    }

    fn finished_count(events: &[JobEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, JobEvent::Finished(_)))
            .count()
    }

    fn progress(events: &[JobEvent]) -> Vec<(usize, usize)> {
        events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .collect()
    }

    fn two_song_stubs() -> StubServices {
        StubServices::new(
            ExtractorStub::default().with_album(URL, album("Album", "Artist", &["Song A", "Song B"])),
            FetcherStub::default(),
        )
    }

    #[tokio::test]
    async fn downloads_and_tags_every_track() {
        let root = TempDir::new().unwrap();
        let stubs = two_song_stubs();
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        let outcome = job.run().await;
        assert_matches!(&outcome, JobOutcome::Completed { tracks: 2, failed_tracks, .. } if failed_tracks.is_empty());
        assert_eq!(
            handle.progress(),
            JobProgress { state: JobState::Completed, completed: 2, total: 2 }
        );

        let events = events(handle).await;
        assert_eq!(events[0], JobEvent::Status("Resolving".to_string()));
        assert!(events.contains(&JobEvent::Info {
            title: "Album".to_string(),
            subtitle: "Artist".to_string(),
        }));
        assert_eq!(progress(&events), vec![(1, 2), (2, 2)]);
        assert_eq!(finished_count(&events), 1);
        assert_eq!(events.last(), Some(&JobEvent::Finished(outcome)));

        let album_dir = root.path().join("Artist").join("Album");
        assert!(album_dir.join("Song A.mp3").is_file());
        assert!(album_dir.join("Song B.mp3").is_file());
        assert_eq!(fs::read(album_dir.join("cover.jpg")).unwrap(), COVER_BYTES);

        let mut written = stubs.tags.text.lock().clone();
        written.sort();
        assert_eq!(
            written,
            vec![
                (1, "Song A".to_string(), "Album".to_string(), "Artist".to_string()),
                (2, "Song B".to_string(), "Album".to_string(), "Artist".to_string()),
            ]
        );
        assert_eq!(stubs.tags.covers.lock().len(), 2);
    }

    #[tokio::test]
    async fn foreign_domain_fails_without_touching_anything() {
        let root = TempDir::new().unwrap();
        let stubs = two_song_stubs();
        let config = DownloaderConfig::default();
        let (job, handle) = AlbumDownloadJob::new(
            JobId(1),
            "https://example.com/playlist?list=1",
            root.path(),
            stubs.services(),
            &config,
        );

        let outcome = job.run().await;
        assert_eq!(
            outcome,
            JobOutcome::Failed { reason: "URL not from music.youtube.com".to_string() }
        );
        assert_eq!(handle.progress().state, JobState::Failed);

        let events = events(handle).await;
        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, JobEvent::Error { .. }))
            .collect();
        assert_eq!(
            errors,
            vec![&JobEvent::Error {
                url: "https://example.com/playlist?list=1".to_string(),
                reason: "URL not from music.youtube.com".to_string(),
            }]
        );
        assert_eq!(finished_count(&events), 1);

        assert!(stubs.extractor.resolved().is_empty());
        assert!(stubs.fetcher.calls().is_empty());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn listing_without_entries_downloads_nothing() {
        let root = TempDir::new().unwrap();
        let stubs = StubServices::new(ExtractorStub::default(), FetcherStub::default());
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        let outcome = job.run().await;
        assert_matches!(outcome, JobOutcome::Failed { reason } if reason.contains("is not an album"));

        let events = events(handle).await;
        assert_eq!(finished_count(&events), 1);
        assert!(progress(&events).is_empty());
        assert!(stubs.fetcher.calls().is_empty());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejected_extraction_reports_reason() {
        let root = TempDir::new().unwrap();
        let stubs = StubServices::new(ExtractorStub::default().with_rejected(URL), FetcherStub::default());
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        job.run().await;

        let events = events(handle).await;
        assert!(events.iter().any(|e| matches!(
            e,
            JobEvent::Error { url, reason } if url == URL && reason.contains("private")
        )));
        assert_eq!(finished_count(&events), 1);
    }

    #[tokio::test]
    async fn stale_album_directory_is_replaced() {
        let root = TempDir::new().unwrap();
        let album_dir = root.path().join("Artist").join("Album");
        fs::create_dir_all(album_dir.join("nested")).unwrap();
        fs::write(album_dir.join("stale.mp3"), b"old").unwrap();
        fs::write(album_dir.join("nested").join("old.txt"), b"old").unwrap();
        let neighbour = root.path().join("Artist").join("Other Album");
        fs::create_dir_all(&neighbour).unwrap();

        let stubs = two_song_stubs();
        let (job, _handle) = job(&stubs, root.path(), DownloaderConfig::default());
        job.run().await;

        let mut names: Vec<_> = fs::read_dir(&album_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Song A.mp3", "Song B.mp3", "cover.jpg"]);
        assert!(neighbour.is_dir());
    }

    #[tokio::test]
    async fn failed_track_does_not_stop_siblings() {
        let root = TempDir::new().unwrap();
        let stubs = StubServices::new(
            ExtractorStub::default().with_album(URL, album("Album", "Artist", &["Song A", "Song B", "Song C"])),
            FetcherStub::default().failing_on("Song B"),
        );
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        let outcome = job.run().await;
        assert_matches!(
            outcome,
            JobOutcome::Completed { tracks: 3, failed_tracks, .. }
                if failed_tracks.len() == 1 && failed_tracks[0].index == 2 && failed_tracks[0].title == "Song B"
        );

        let events = events(handle).await;
        assert_eq!(progress(&events), vec![(1, 3), (2, 3), (3, 3)]);
        assert!(!events.iter().any(|e| matches!(e, JobEvent::Error { .. })));
        assert_eq!(stubs.tags.text.lock().len(), 2);
    }

    #[tokio::test]
    async fn cover_art_failure_aborts_before_tracks() {
        let root = TempDir::new().unwrap();
        let stubs = StubServices::with_cover_art(
            ExtractorStub::default().with_album(URL, album("Album", "Artist", &["Song A"])),
            FetcherStub::default(),
            CoverArtStub { fail: true, ..Default::default() },
        );
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        let outcome = job.run().await;
        assert_matches!(outcome, JobOutcome::Failed { reason } if reason.contains("download cover art"));
        assert!(stubs.fetcher.calls().is_empty());
        assert_eq!(finished_count(&events(handle).await), 1);
    }

    #[tokio::test]
    async fn album_without_cover_still_tags_text() {
        let root = TempDir::new().unwrap();
        let bare = Album::new(
            "Album",
            "Artist",
            0,
            vec![Track::new("Song A", "https://music.youtube.com/watch?v=a", 1)],
            "",
        );
        let stubs = StubServices::new(ExtractorStub::default().with_album(URL, bare), FetcherStub::default());
        let (job, _handle) = job(&stubs, root.path(), DownloaderConfig::default());

        assert!(job.run().await.is_completed());
        assert!(stubs.cover_art.requested.lock().is_empty());
        assert_eq!(stubs.tags.text.lock().len(), 1);
        assert!(stubs.tags.covers.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_album_completes_immediately() {
        let root = TempDir::new().unwrap();
        let stubs = StubServices::new(
            ExtractorStub::default().with_album(URL, album("Album", "Artist", &[])),
            FetcherStub::default(),
        );
        let (job, handle) = job(&stubs, root.path(), DownloaderConfig::default());

        let outcome = job.run().await;
        assert_matches!(outcome, JobOutcome::Completed { tracks: 0, .. });
        assert_eq!(
            handle.progress(),
            JobProgress { state: JobState::Completed, completed: 0, total: 0 }
        );
        assert_eq!(finished_count(&events(handle).await), 1);
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn track_fan_out_is_bounded() {
        let root = TempDir::new().unwrap();
        let titles = ["1", "2", "3", "4", "5", "6", "7"];
        let stubs = StubServices::new(
            ExtractorStub::default().with_album(URL, album("Album", "Artist", &titles)),
            FetcherStub::default().with_delay(Duration::from_millis(20)),
        );
        let config = DownloaderConfig::default().with_track_parallelism(2);
        let (job, handle) = job(&stubs, root.path(), config);

        let outcome = job.run().await;
        assert_matches!(outcome, JobOutcome::Completed { tracks: 7, .. });
        assert_eq!(stubs.fetcher.concurrency.max(), 2);

        let progress = progress(&events(handle).await);
        let completed: Vec<_> = progress.iter().map(|(c, _)| *c).collect();
        assert_eq!(completed, (1..=7).collect::<Vec<_>>());
        assert!(progress.iter().all(|(c, t)| c <= t && *t == 7));
    }
}
