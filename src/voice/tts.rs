//! Text-to-speech (TTS) via the piper command line

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

use crate::config::TtsConfig;
use crate::{Error, Result};

/// Ways a synthesis run can fail
///
/// Each variant maps to its own diagnostic suffix on the reply text.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The process ran and exited non-zero
    #[error("synthesizer exited with code {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    /// The process exited cleanly but wrote no audio
    #[error("synthesizer produced no audio at {0}")]
    EmptyOutput(PathBuf),

    /// The process was killed after the wall-clock limit
    #[error("synthesizer timed out after {0:?}")]
    Timeout(Duration),

    /// Spawning, piping or reading failed
    #[error("synthesizer fault: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders reply text to WAV audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, using `output` as the scratch WAV path
    ///
    /// # Errors
    ///
    /// Returns the failure mode of the run
    async fn synthesize(
        &self,
        text: &str,
        output: &Path,
    ) -> std::result::Result<Vec<u8>, SynthesisError>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Runs `piper --model <voice> --output_file <out>` with the text on stdin
///
/// No shell is involved: the utterance never becomes part of a command line.
pub struct PiperSynthesizer {
    executable: PathBuf,
    voice_model: PathBuf,
    timeout: Duration,
}

impl PiperSynthesizer {
    /// Check the voice model and resolve the executable
    ///
    /// A missing executable is only logged: the run itself will then fail
    /// and degrade the reply instead of disabling the endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the voice model is unset or does not exist
    pub fn load(config: &TtsConfig) -> Result<Self> {
        let voice_model = config.voice_model.as_deref().ok_or_else(|| {
            Error::Config(
                "piper voice model not specified (PIPER_VOICE_MODEL_PATH_DEFAULT)".to_string(),
            )
        })?;
        if !voice_model.exists() {
            return Err(Error::Config(format!(
                "piper voice model not found: {}",
                voice_model.display()
            )));
        }

        let executable = super::resolve_executable(&config.executable).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "piper executable not resolvable, synthesis will fail");
            config.executable.clone()
        });

        tracing::info!(
            executable = %executable.display(),
            voice_model = %voice_model.display(),
            timeout = ?config.timeout,
            "piper synthesizer loaded"
        );

        Ok(Self {
            executable,
            voice_model: voice_model.to_path_buf(),
            timeout: config.timeout,
        })
    }

    /// Override the wall-clock limit
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured voice model
    #[must_use]
    pub fn voice_model(&self) -> &Path {
        &self.voice_model
    }

    /// Spawn piper, feed it the text and wait for it to exit
    async fn run(&self, text: &str, output: &Path) -> std::result::Result<(), SynthesisError> {
        let child = Command::new(&self.executable)
            .arg("--model")
            .arg(&self.voice_model)
            .arg("--output_file")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut utterance = text.replace(['\r', '\n'], " ");
        utterance.push('\n');

        let finished = tokio::time::timeout(self.timeout, feed_and_wait(child, utterance))
            .await
            .map_err(|_| SynthesisError::Timeout(self.timeout))??;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr).trim().to_string();
            return Err(SynthesisError::Exit {
                code: finished.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

/// Write the utterance to stdin, close it, then collect the exit status
async fn feed_and_wait(mut child: Child, utterance: String) -> std::io::Result<Output> {
    if let Some(mut stdin) = child.stdin.take() {
        // An early exit closes the pipe; the exit status reports why
        match stdin.write_all(utterance.as_bytes()).await {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("piper closed stdin early");
            }
            other => other?,
        }
    }
    child.wait_with_output().await
}

#[async_trait]
impl SpeechSynthesizer for PiperSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        output: &Path,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        tracing::debug!(chars = text.chars().count(), "starting piper synthesis");

        self.run(text, output).await?;

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => return Err(SynthesisError::EmptyOutput(output.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SynthesisError::EmptyOutput(output.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        let audio = tokio::fs::read(output).await?;

        match super::describe_wav(&audio) {
            Ok(summary) => tracing::info!(
                bytes = audio.len(),
                sample_rate = summary.sample_rate,
                duration_ms = u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
                "synthesis complete"
            ),
            Err(e) => tracing::warn!(
                bytes = audio.len(),
                error = %e,
                "synthesized audio has no readable WAV header"
            ),
        }

        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "piper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tts_config(voice_model: Option<PathBuf>) -> TtsConfig {
        TtsConfig {
            executable: PathBuf::from("/usr/local/bin/piper"),
            voice_model,
            timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn load_requires_voice_model() {
        let err = PiperSynthesizer::load(&tts_config(None)).err().unwrap();
        assert!(err.to_string().contains("not specified"));

        let err = PiperSynthesizer::load(&tts_config(Some(PathBuf::from("/nope/voice.onnx"))))
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nope/voice.onnx"));
    }

    #[test]
    fn load_tolerates_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let voice = dir.path().join("it_IT-paola-medium.onnx");
        std::fs::write(&voice, b"onnx").unwrap();

        let synth = PiperSynthesizer::load(&TtsConfig {
            executable: dir.path().join("missing-piper"),
            voice_model: Some(voice.clone()),
            timeout: Duration::from_secs(15),
        })
        .unwrap();
        assert_eq!(synth.voice_model(), voice.as_path());
    }

    #[tokio::test]
    async fn spawn_failure_is_an_io_fault() {
        let dir = tempfile::tempdir().unwrap();
        let voice = dir.path().join("voice.onnx");
        std::fs::write(&voice, b"onnx").unwrap();

        let synth = PiperSynthesizer::load(&TtsConfig {
            executable: dir.path().join("missing-piper"),
            voice_model: Some(voice),
            timeout: Duration::from_secs(15),
        })
        .unwrap();

        let err = synth
            .synthesize("ciao", &dir.path().join("response.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Io(_)));
    }
}
