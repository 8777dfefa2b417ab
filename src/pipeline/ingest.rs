//! Request-scoped storage for the uploaded clip

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::Result;

/// File name given to the uploaded audio; the extension lets engines sniff it
pub const INPUT_FILE: &str = "input_audio.wav";

/// File name the synthesizer writes its reply to
pub const RESPONSE_FILE: &str = "response.wav";

/// Private temporary directory holding one request's audio files
///
/// Dropping the scope removes the directory and everything in it, so every
/// exit path of a request (success, stage failure, panic) cleans up.
#[derive(Debug)]
pub struct AudioScope {
    dir: TempDir,
    input: PathBuf,
}

impl AudioScope {
    /// Create a fresh directory and write `audio` into it verbatim
    ///
    /// # Errors
    ///
    /// Returns error if the directory or the file cannot be written
    pub async fn ingest(audio: &[u8]) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("vox-").tempdir()?;
        let input = dir.path().join(INPUT_FILE);
        tokio::fs::write(&input, audio).await?;

        tracing::debug!(path = %input.display(), bytes = audio.len(), "audio saved");

        Ok(Self { dir, input })
    }

    /// Scope directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Stored upload
    #[must_use]
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Where the synthesizer should write
    #[must_use]
    pub fn response_path(&self) -> PathBuf {
        self.dir.path().join(RESPONSE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_bytes_verbatim_and_cleans_up() {
        let scope = AudioScope::ingest(b"RIFF....WAVE").await.unwrap();
        let dir = scope.dir().to_path_buf();

        assert_eq!(std::fs::read(scope.input_path()).unwrap(), b"RIFF....WAVE");
        assert!(scope.input_path().ends_with(INPUT_FILE));
        assert_eq!(scope.response_path(), dir.join(RESPONSE_FILE));

        drop(scope);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn scopes_never_share_a_directory() {
        let a = AudioScope::ingest(b"same").await.unwrap();
        let b = AudioScope::ingest(b"same").await.unwrap();
        assert_ne!(a.dir(), b.dir());
        assert_ne!(a.input_path(), b.input_path());
    }
}
