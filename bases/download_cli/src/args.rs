use clap::Parser;
use std::path::PathBuf;

/// Rip whole albums into tagged audio files
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Album URLs to download
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Directory albums are stored under as <artist>/<album> (default: ~/Music)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of albums downloading at once
    #[arg(short, long, env = "ALBUM_DOWNLOADER_BANDWIDTH")]
    pub bandwidth: Option<usize>,

    /// Maximum number of tracks of one album downloading at once (default: CPU count)
    #[arg(short = 'j', long)]
    pub track_jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
