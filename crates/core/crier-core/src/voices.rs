//! The reference voice sample library
//!
//! A flat directory of wav samples users can pick from with `!voice`.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Directory of reference samples plus the fallback sample for users who
/// never registered one.
#[derive(Debug, Clone)]
pub struct VoiceLibrary {
    dir: PathBuf,
    default_sample: String,
}

impl VoiceLibrary {
    /// Create a library rooted at `dir` with `default_sample` as fallback.
    pub fn new(dir: impl Into<PathBuf>, default_sample: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            default_sample: default_sample.into(),
        }
    }

    /// The fallback sample name
    pub fn default_sample(&self) -> &str {
        &self.default_sample
    }

    /// Whether `name` is a registrable sample in the library. Names with
    /// path separators are rejected outright.
    pub fn contains(&self, name: &str) -> bool {
        Self::valid_name(name) && self.dir.join(name).is_file()
    }

    /// List the registrable samples, sorted. Documentation files in the
    /// directory are skipped.
    pub fn available(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "could not read voice library");
                return Vec::new();
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.to_lowercase().ends_with(".md"))
            .collect();
        names.sort();
        names
    }

    /// Path of `sample`, or of the default when the user has none.
    pub fn sample_path(&self, sample: Option<&str>) -> PathBuf {
        self.dir.join(sample.unwrap_or(&self.default_sample))
    }

    fn valid_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(['/', '\\'])
    }
}

/// Convenience for display: the library directory
impl AsRef<Path> for VoiceLibrary {
    fn as_ref(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> (tempfile::TempDir, VoiceLibrary) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kain.wav"), b"riff").unwrap();
        fs::write(dir.path().join("ganf.wav"), b"riff").unwrap();
        fs::write(dir.path().join("README.md"), b"docs").unwrap();
        let lib = VoiceLibrary::new(dir.path(), "narrator.wav");
        (dir, lib)
    }

    #[test]
    fn lists_samples_without_docs() {
        let (_dir, lib) = library();
        assert_eq!(lib.available(), vec!["ganf.wav", "kain.wav"]);
    }

    #[test]
    fn validates_registrations() {
        let (_dir, lib) = library();
        assert!(lib.contains("kain.wav"));
        assert!(!lib.contains("missing.wav"));
        assert!(!lib.contains("../kain.wav"));
        assert!(!lib.contains(""));
    }

    #[test]
    fn resolves_sample_paths() {
        let (dir, lib) = library();
        assert_eq!(lib.sample_path(Some("kain.wav")), dir.path().join("kain.wav"));
        assert_eq!(lib.sample_path(None), dir.path().join("narrator.wav"));
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let lib = VoiceLibrary::new("/nonexistent/voices", "narrator.wav");
        assert!(lib.available().is_empty());
    }
}
