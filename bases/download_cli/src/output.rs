use album_downloader::{JobEvent, JobId, JobOutcome};

#[derive(Debug, Clone, Copy)]
pub struct OutputHandler {
    verbose: bool,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn print_submitted(&self, id: JobId, url: &str) {
        println!("[{}] Submitted {}", id, url);
    }

    pub fn print_event(&self, id: JobId, event: &JobEvent) {
        match event {
            JobEvent::Status(text) => println!("[{}] {}", id, text),
            JobEvent::Info { title, subtitle } => println!("[{}] {} - {}", id, subtitle, title),
            JobEvent::Progress { completed, total } => {
                println!("[{}] Completed {} of {}", id, completed, total)
            }
            JobEvent::Error { url, reason } => eprintln!("[{}] Error: {}: {}", id, url, reason),
            JobEvent::Finished(outcome) => self.print_outcome(id, outcome),
        }
    }

    fn print_outcome(&self, id: JobId, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed {
                tracks,
                failed_tracks,
                elapsed,
            } => {
                println!(
                    "[{}] Finished: {} of {} tracks in {:.1} seconds",
                    id,
                    tracks - failed_tracks.len(),
                    tracks,
                    elapsed.as_secs_f64()
                );
                for failure in failed_tracks {
                    eprintln!(
                        "[{}]   track {} '{}' failed",
                        id, failure.index, failure.title
                    );
                    if self.verbose {
                        eprintln!("[{}]     caused by: {}", id, failure.reason);
                    }
                }
            }
            JobOutcome::Failed { reason } => eprintln!("[{}] Failed: {}", id, reason),
        }
    }

    pub fn print_summary(&self, completed: usize, failed: usize) {
        println!("{} albums downloaded, {} failed", completed, failed);
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        eprintln!("Error: {}", error);

        if self.verbose {
            eprintln!("\nError details:");
            error.chain().skip(1).for_each(|cause| {
                eprintln!("  caused by: {}", cause);
            });
        }
    }
}
