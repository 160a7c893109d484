use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DownloadError, Result};
use crate::services::CoverArtSource;

/// Name of the cover image inside every album directory
pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Fetches cover images over HTTP
pub struct HttpCoverArt {
    client: reqwest::Client,
}

impl HttpCoverArt {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCoverArt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoverArtSource for HttpCoverArt {
    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        debug!("Downloading cover art {} to {}", url, target.display());

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| DownloadError::preparation("download cover art", e))?
            .bytes()
            .await
            .map_err(|e| DownloadError::preparation("download cover art", e))?;

        tokio::fs::write(target, &bytes)
            .await
            .map_err(|e| DownloadError::preparation("write cover art", e))
    }
}
