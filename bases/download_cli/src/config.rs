use crate::args::Args;
use album_downloader::DownloaderConfig;
use std::path::{Path, PathBuf};

/// Resolved command line configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub urls: Vec<String>,

    /// Root every album directory is created under
    pub output_dir: PathBuf,

    pub downloader: DownloaderConfig,

    pub verbose: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: Args) -> Self {
        let home = dirs::home_dir();
        let output_dir = match args.output_dir {
            Some(dir) => expand_home(&dir, home.as_deref()),
            None => default_output_dir(home.as_deref()),
        };

        let mut downloader = DownloaderConfig::default();
        if let Some(bandwidth) = args.bandwidth {
            downloader = downloader.with_bandwidth(bandwidth);
        }
        if let Some(jobs) = args.track_jobs {
            downloader = downloader.with_track_parallelism(jobs);
        }

        Self {
            urls: args.urls,
            output_dir,
            downloader,
            verbose: args.verbose,
        }
    }
}

fn default_output_dir(home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) => home.join("Music"),
        None => PathBuf::from("Music"),
    }
}

/// Expand a leading `~` the way a shell would
fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
