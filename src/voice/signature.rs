use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::preprocess::DurationWindow;

/// De-duplicated, sorted absolute paths of one speaker's reference recordings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceAudioSet {
    paths: Vec<PathBuf>,
}

impl ReferenceAudioSet {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let unique: BTreeSet<PathBuf> = paths
            .into_iter()
            .filter(|path| !path.as_ref().as_os_str().is_empty())
            .map(|path| absolute(path.as_ref()))
            .collect();
        Self {
            paths: unique.into_iter().collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// blake3 over the JSON list of `[path, size, mtime_nanos]`.
    ///
    /// Files that cannot be stat'ed contribute zero size and mtime.
    pub fn signature(&self) -> String {
        let entries: Vec<(String, u64, u64)> = self
            .paths
            .iter()
            .map(|path| {
                let (size, mtime) = file_stamp(path);
                (path.to_string_lossy().into_owned(), size, mtime)
            })
            .collect();
        let json = serde_json::to_string(&entries).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Cache key binding encoder, duration window and file identity.
pub fn cache_key(encoder_identity: &str, window: DurationWindow, files_signature: &str) -> String {
    let raw = format!(
        "{encoder_identity}|{:.2}|{:.2}|{files_signature}",
        window.min_seconds, window.max_seconds
    );
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn file_stamp(path: &Path) -> (u64, u64) {
    let Ok(meta) = std::fs::metadata(path) else {
        return (0, 0);
    };
    let mtime = meta
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    (meta.len(), mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn order_and_duplicates_do_not_change_identity() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        std::fs::write(&a, b"aaaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();
        let first = ReferenceAudioSet::new([&a, &b]);
        let second = ReferenceAudioSet::new([&b, &a, &b]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.signature(), second.signature());
    }

    #[test]
    fn size_and_mtime_changes_alter_signature() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ref.wav");
        std::fs::write(&path, b"1234").unwrap();
        let set = ReferenceAudioSet::new([&path]);
        let before = set.signature();

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        drop(file);
        let touched = set.signature();
        assert_ne!(before, touched);

        std::fs::write(&path, b"123456").unwrap();
        assert_ne!(touched, set.signature());
    }

    #[test]
    fn missing_files_still_hash() {
        let set = ReferenceAudioSet::new(["/definitely/not/here.wav"]);
        assert_eq!(set.signature().len(), 64);
    }

    #[test]
    fn key_depends_on_encoder_and_window() {
        let window = DurationWindow::new(5.0, 20.0);
        let base = cache_key("logmel-stats", window, "sig");
        assert_eq!(base, cache_key("logmel-stats", window, "sig"));
        assert_ne!(base, cache_key("projection", window, "sig"));
        assert_ne!(base, cache_key("logmel-stats", DurationWindow::new(4.0, 20.0), "sig"));
        assert_ne!(base, cache_key("logmel-stats", window, "other"));
    }
}
