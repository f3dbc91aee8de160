//! Reference recordings addressed by verse.

use std::path::{Path, PathBuf};

use recite_core::{AudioRecording, RecitationConfig, RecitationError, RecitationResult, VerseId};
use tracing::info;

/// Directory of reference recordings named `<chapter>_<verse>.<ext>`.
#[derive(Debug, Clone)]
pub struct VerseLibrary {
    root: PathBuf,
    extensions: Vec<String>,
}

impl VerseLibrary {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    pub fn from_config(config: &RecitationConfig) -> RecitationResult<Self> {
        let root = config
            .library_root
            .clone()
            .ok_or_else(|| RecitationError::Config("library_root is not set".into()))?;
        Ok(Self::new(root, config.audio_extensions.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First existing `<root>/<chapter>_<verse>.<ext>` in extension order.
    pub fn resolve(&self, verse: &VerseId) -> RecitationResult<AudioRecording> {
        let stem = verse.file_stem();
        self.extensions
            .iter()
            .map(|ext| self.root.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
            .map(AudioRecording::new)
            .ok_or_else(|| {
                RecitationError::InputMissing(format!(
                    "no reference recording for {verse} in {} (tried {})",
                    self.root.display(),
                    self.extensions.join(", ")
                ))
            })
    }

    /// Verses with a recording in a configured format, sorted.
    pub fn verses(&self) -> RecitationResult<Vec<VerseId>> {
        let mut verses = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)));
            if !known {
                continue;
            }
            if let Some(verse) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<VerseId>().ok())
            {
                verses.push(verse);
            }
        }
        verses.sort_by_key(|v| (v.chapter, v.verse));
        verses.dedup();
        Ok(verses)
    }

    /// Decode the recordings of `verses` in order and write them as one WAV.
    /// Returns the duration in seconds.
    pub fn render_group(
        &self,
        verses: &[VerseId],
        destination: impl AsRef<Path>,
        sample_rate: usize,
    ) -> RecitationResult<f32> {
        if verses.is_empty() {
            return Err(RecitationError::InputMissing("no verses selected".into()));
        }
        let recordings = verses
            .iter()
            .map(|v| self.resolve(v).map(|r| r.path().to_path_buf()))
            .collect::<RecitationResult<Vec<_>>>()?;
        let duration = audio::concat_to_wav(&recordings, &destination, sample_rate)?;
        info!(
            "group of {} verses written to {}",
            verses.len(),
            destination.as_ref().display()
        );
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use recite_core::AudioBuffer;

    use super::*;

    fn library(root: &Path) -> VerseLibrary {
        VerseLibrary::new(root, vec!["m4a".into(), "mp3".into(), "wav".into()])
    }

    fn write(root: &Path, name: &str, secs: f32) {
        let samples = vec![0.1; (secs * 16000.0) as usize];
        audio::write_wav(root.join(name), &AudioBuffer::new(samples, 16000, 1)).unwrap();
    }

    #[test]
    fn test_resolve_tries_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "1_2.wav", 0.1);
        let recording = library(tmp.path()).resolve(&VerseId::new(1, 2)).unwrap();
        assert_eq!(recording.path(), tmp.path().join("1_2.wav"));
    }

    #[test]
    fn test_missing_verse() {
        let tmp = tempfile::tempdir().unwrap();
        let err = library(tmp.path()).resolve(&VerseId::new(3, 4)).unwrap_err();
        assert!(matches!(err, RecitationError::InputMissing(_)));
    }

    #[test]
    fn test_lists_verses() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "2_1.wav", 0.1);
        write(tmp.path(), "1_10.wav", 0.1);
        write(tmp.path(), "1_2.wav", 0.1);
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        std::fs::write(tmp.path().join("group.wav"), "x").unwrap();

        let verses = library(tmp.path()).verses().unwrap();
        assert_eq!(
            verses,
            vec![VerseId::new(1, 2), VerseId::new(1, 10), VerseId::new(2, 1)]
        );
    }

    #[test]
    fn test_render_group() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "1_1.wav", 0.5);
        write(tmp.path(), "1_2.wav", 0.25);
        let out = tmp.path().join("out").join("group.wav");

        let lib = library(tmp.path());
        let duration = lib
            .render_group(&[VerseId::new(1, 1), VerseId::new(1, 2)], &out, 16000)
            .unwrap();
        assert!((duration - 0.75).abs() < 0.01);
        assert!(out.exists());

        let err = lib
            .render_group(&[VerseId::new(1, 1), VerseId::new(9, 9)], &out, 16000)
            .unwrap_err();
        assert!(matches!(err, RecitationError::InputMissing(_)));
    }
}
