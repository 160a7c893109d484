//! Album download orchestration.
//!
//! An album URL is resolved into its ordered track list, every track is
//! fetched and tagged with bounded parallelism, and whole albums are admitted
//! through an [`AdmissionScheduler`] so only a fixed number download at once.
//! Callers follow a job through the [`JobEvent`]s on its [`JobHandle`].

mod config;
mod cover;
mod error;
mod job;
mod scheduler;
mod services;
mod tagging;
mod types;
mod utils;
mod ytdlp;

pub use config::{DownloaderConfig, DEFAULT_BANDWIDTH, DEFAULT_DOMAIN};
pub use cover::{HttpCoverArt, COVER_FILE_NAME};
pub use error::{DownloadError, Result};
pub use job::{AlbumDownloadJob, JobHandle, JobProgress};
pub use scheduler::{AdmissionScheduler, SchedulerSnapshot};
pub use services::{CoverArtSource, MetadataExtractor, Services, TagWriter, TrackFetcher};
pub use tagging::LoftyTagWriter;
pub use types::{Album, JobEvent, JobId, JobOutcome, JobState, Track, TrackFailure};
pub use utils::{filter_chars, validate_domain};
pub use ytdlp::{YtDlp, AUDIO_EXTENSION};
