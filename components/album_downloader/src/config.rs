/// Host the extractor accepts album URLs from
pub const DEFAULT_DOMAIN: &str = "music.youtube.com";

/// Albums allowed to download at the same time
pub const DEFAULT_BANDWIDTH: usize = 3;

/// Runtime configuration for the scheduler and its jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Maximum number of albums downloading concurrently
    pub bandwidth: usize,

    /// Maximum number of tracks of one album in flight at once
    pub track_parallelism: usize,

    /// Host every submitted URL must belong to
    pub expected_domain: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            bandwidth: DEFAULT_BANDWIDTH,
            track_parallelism: host_parallelism(),
            expected_domain: DEFAULT_DOMAIN.to_string(),
        }
    }
}

impl DownloaderConfig {
    pub fn with_bandwidth(mut self, bandwidth: usize) -> Self {
        self.bandwidth = bandwidth.max(1);
        self
    }

    pub fn with_track_parallelism(mut self, parallelism: usize) -> Self {
        self.track_parallelism = parallelism.max(1);
        self
    }

    pub fn with_expected_domain(mut self, domain: impl Into<String>) -> Self {
        self.expected_domain = domain.into();
        self
    }
}

fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
