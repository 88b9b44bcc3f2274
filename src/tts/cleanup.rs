use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

/// Default age after which generated audio is considered stale.
pub const DEFAULT_MAX_AUDIO_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Delete regular files in `dir` last modified more than `max_age` ago.
///
/// Returns how many files were removed. A missing directory removes nothing;
/// files that cannot be inspected or deleted are logged and left in place.
pub fn cleanup_old_audio(dir: &Path, max_age: Duration) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Skipping cleanup of {}: {err}", dir.display());
            return 0;
        }
    };
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!("Failed to remove {}: {err}", path.display()),
        }
    }
    if removed > 0 {
        info!("Removed {removed} stale audio file(s) from {}", dir.display());
    }
    removed
}

/// Escaped text block shown in place of audio when synthesis is unavailable.
pub fn fallback_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    format!("<div class='tts-fallback'><p>{escaped}</p></div>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn only_stale_files_are_removed() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.wav");
        let fresh = dir.path().join("fresh.wav");
        fs::write(&old, b"x").unwrap();
        fs::write(&fresh, b"x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let file = fs::OpenOptions::new().write(true).open(&old).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(48 * 3600))
            .unwrap();
        drop(file);

        assert_eq!(cleanup_old_audio(dir.path(), DEFAULT_MAX_AUDIO_AGE), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn missing_directory_removes_nothing() {
        let dir = tempdir().unwrap();
        assert_eq!(cleanup_old_audio(&dir.path().join("absent"), Duration::ZERO), 0);
    }

    #[test]
    fn html_fallback_escapes_markup() {
        assert_eq!(
            fallback_html("<b>breathe</b> & rest"),
            "<div class='tts-fallback'><p>&lt;b&gt;breathe&lt;/b&gt; &amp; rest</p></div>"
        );
    }
}
