use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Which voice a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VoiceSelection {
    /// Use the configured default voice.
    #[default]
    Default,
    /// A named folder under the reference root.
    Named(String),
    /// Explicit reference files.
    Files(Vec<PathBuf>),
}

impl VoiceSelection {
    /// Interpret a CLI or API value: comma-separated `.wav` paths, or a voice name.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::Default;
        }
        let entries: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();
        if entries.iter().all(|entry| has_wav_extension(Path::new(entry))) {
            Self::Files(entries.into_iter().map(PathBuf::from).collect())
        } else {
            Self::Named(value.to_string())
        }
    }
}

/// Turns a voice selection into reference files.
///
/// Order: explicit files, configured file list, configured directory, the named
/// voice folder under the root, then any WAV directly under the root.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    pub ref_wavs: Vec<PathBuf>,
    pub ref_dir: Option<PathBuf>,
    pub refs_root: Option<PathBuf>,
    pub default_voice: Option<String>,
}

impl ReferenceResolver {
    pub fn resolve(&self, selection: &VoiceSelection) -> Vec<PathBuf> {
        if let VoiceSelection::Files(files) = selection {
            return files.clone();
        }
        if !self.ref_wavs.is_empty() {
            debug!("Using {} configured reference file(s)", self.ref_wavs.len());
            return self.ref_wavs.clone();
        }
        if let Some(dir) = self.ref_dir.as_deref().filter(|dir| dir.is_dir()) {
            return list_wavs(dir);
        }
        let Some(root) = self.refs_root.as_deref() else {
            return Vec::new();
        };
        let name = match selection {
            VoiceSelection::Named(name) => Some(name.as_str()),
            _ => self.default_voice.as_deref(),
        };
        if let Some(name) = name {
            let voice_dir = root.join(name);
            if voice_dir.is_dir() {
                return list_wavs(&voice_dir);
            }
            debug!("No voice folder {}", voice_dir.display());
        }
        if root.is_dir() {
            return list_wavs(root);
        }
        Vec::new()
    }
}

fn list_wavs(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Cannot list reference directory {}: {err}", dir.display());
            return Vec::new();
        }
    };
    let mut wavs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_wav_extension(path))
        .collect();
    wavs.sort();
    wavs
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn explicit_files_win() {
        let resolver = ReferenceResolver {
            ref_wavs: vec![PathBuf::from("env.wav")],
            ..Default::default()
        };
        let files = vec![PathBuf::from("mine.wav")];
        assert_eq!(resolver.resolve(&VoiceSelection::Files(files.clone())), files);
        assert_eq!(
            resolver.resolve(&VoiceSelection::Default),
            vec![PathBuf::from("env.wav")]
        );
    }

    #[test]
    fn directory_then_named_folder_then_root() {
        let root = tempdir().unwrap();
        touch(&root.path().join("calm").join("b.wav"));
        touch(&root.path().join("calm").join("a.WAV"));
        touch(&root.path().join("calm").join("notes.txt"));
        touch(&root.path().join("loose.wav"));

        let mut resolver = ReferenceResolver {
            refs_root: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let named = resolver.resolve(&VoiceSelection::Named("calm".into()));
        assert_eq!(
            named,
            vec![root.path().join("calm").join("a.WAV"), root.path().join("calm").join("b.wav")]
        );
        assert_eq!(
            resolver.resolve(&VoiceSelection::Named("missing".into())),
            vec![root.path().join("loose.wav")]
        );

        resolver.ref_dir = Some(root.path().join("calm"));
        assert_eq!(resolver.resolve(&VoiceSelection::Named("other".into())).len(), 2);
    }

    #[test]
    fn nothing_configured_is_empty() {
        assert!(ReferenceResolver::default()
            .resolve(&VoiceSelection::Default)
            .is_empty());
    }

    #[test]
    fn parse_distinguishes_files_from_names() {
        assert_eq!(
            VoiceSelection::parse("a.wav, b.wav"),
            VoiceSelection::Files(vec![PathBuf::from("a.wav"), PathBuf::from("b.wav")])
        );
        assert_eq!(VoiceSelection::parse("therapist"), VoiceSelection::Named("therapist".into()));
        assert_eq!(VoiceSelection::parse("  "), VoiceSelection::Default);
    }
}
