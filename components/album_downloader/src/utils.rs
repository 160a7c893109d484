use crate::error::{DownloadError, Result};
use url::Url;

/// Characters that are rejected by at least one common filesystem
const UNSAFE_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace every filesystem-unsafe character with an underscore
pub fn filter_chars(text: &str) -> String {
    text.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Filter `raw` and make sure the result can be used as a single path component.
///
/// Empty names and the relative components `.` and `..` are replaced by `fallback`
/// so a job can never escape or wipe its parent directory.
pub fn path_component(raw: &str, fallback: &str) -> String {
    let filtered = filter_chars(raw.trim());
    match filtered.as_str() {
        "" | "." | ".." => fallback.to_string(),
        _ => filtered,
    }
}

/// Check that `url` points at `expected_host` without touching the network
pub fn validate_domain(url: &str, expected_host: &str) -> Result<Url> {
    let invalid = || DownloadError::InvalidDomain {
        url: url.to_string(),
        expected: expected_host.to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    match parsed.host_str() {
        Some(host) if host.eq_ignore_ascii_case(expected_host) => Ok(parsed),
        _ => Err(invalid()),
    }
}
