use album_downloader::{AdmissionScheduler, JobEvent, JobHandle, JobOutcome};
use color_eyre::Result;
use futures::future::join_all;

use crate::config::Config;
use crate::output::OutputHandler;

pub struct App {
    config: Config,
    output: OutputHandler,
}

impl App {
    pub fn new(config: Config) -> Self {
        let output = OutputHandler::new(config.verbose);
        Self { config, output }
    }

    /// Submit every URL and wait for all albums. Returns the number of failed albums.
    pub async fn run(&self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        tracing::info!(
            "Downloading {} albums into {} ({} at a time)",
            self.config.urls.len(),
            self.config.output_dir.display(),
            self.config.downloader.bandwidth
        );

        let scheduler = AdmissionScheduler::start(self.config.downloader.clone()).await?;

        let watchers = self.config.urls.iter().map(|url| {
            let handle = scheduler.submit(url.clone(), self.config.output_dir.clone());
            self.output.print_submitted(handle.id(), url);
            tokio::spawn(follow(handle, self.output))
        });
        let outcomes = join_all(watchers.collect::<Vec<_>>()).await;

        let mut failed = 0;
        for outcome in outcomes {
            if !outcome?.is_completed() {
                failed += 1;
            }
        }
        self.output.print_summary(self.config.urls.len() - failed, failed);
        Ok(failed)
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        self.output.print_error(error);
    }
}

/// Print a job's events until it finishes
async fn follow(mut handle: JobHandle, output: OutputHandler) -> JobOutcome {
    let id = handle.id();
    while let Some(event) = handle.next_event().await {
        output.print_event(id, &event);
        if let JobEvent::Finished(outcome) = event {
            return outcome;
        }
    }
    JobOutcome::Failed {
        reason: "job ended without reporting an outcome".to_string(),
    }
}
