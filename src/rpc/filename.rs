//! Display-name derivation and collision-free naming for new transfers.

use std::path::{Component, Path};

use tracing::warn;
use url::Url;

/// Name used when the URL has no usable last path segment.
pub const FALLBACK_FILENAME: &str = "download";

/// Highest `(N)` suffix probed before giving up on a unique name.
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Derives a display name from the last path segment of `url`.
///
/// The segment is percent-decoded and sanitized. Falls back to
/// [`FALLBACK_FILENAME`] for unparsable URLs and empty paths.
#[must_use]
pub fn guess_filename(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK_FILENAME.to_string();
    };
    let Some(last) = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return FALLBACK_FILENAME.to_string();
    };

    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Returns a name that does not collide with an existing file in `dir`.
///
/// `file.zip` is tried first, then `file(1).zip`, `file(2).zip`, ... up to
/// [`MAX_NAME_ATTEMPTS`]. When every candidate exists the original name is
/// returned and a warning is logged; the daemon then decides what to do.
#[must_use]
pub fn resolve_unique_filename(dir: &Path, filename: &str) -> String {
    if !dir.join(filename).exists() {
        return filename.to_string();
    }

    // A leading dot marks a hidden file, not an extension.
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    };

    for counter in 1..=MAX_NAME_ATTEMPTS {
        let candidate = format!("{stem}({counter}){ext}");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
    }

    warn!(
        filename,
        attempts = MAX_NAME_ATTEMPTS,
        "Could not find a unique filename; keeping the original name"
    );
    filename.to_string()
}
