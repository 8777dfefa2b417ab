//! Speech-to-text (STT) engines

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use url::Url;

use crate::config::{SttBackend, SttConfig};
use crate::{Error, Language, Result};

/// Turns a stored audio file into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio`
    ///
    /// An empty string means no speech was found; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails on this input
    async fn transcribe(&self, audio: &Path, language: Language) -> Result<String>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Load the engine selected by configuration
///
/// # Errors
///
/// Returns error if the engine's configuration is unusable
pub fn load_transcriber(config: SttConfig) -> Result<Arc<dyn Transcriber>> {
    match config.backend {
        SttBackend::Api => Ok(Arc::new(WhisperApi::new(
            &config.url,
            config.model,
            config.api_key,
            config.timeout,
        )?)),
        SttBackend::WhisperCpp => Ok(Arc::new(WhisperCpp::load(
            &config.whisper_cpp_executable,
            config.whisper_model_path.as_deref(),
            config.timeout,
        )?)),
    }
}

/// Response from an OpenAI-compatible transcription endpoint
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes through an OpenAI-compatible `/v1/audio/transcriptions` server
pub struct WhisperApi {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<SecretString>,
}

impl WhisperApi {
    /// Create a client for the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(
        base_url: &str,
        model: String,
        api_key: Option<SecretString>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "transcription server must be http(s): {base_url}"
            )));
        }
        let endpoint = transcription_endpoint(&base)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(endpoint = %endpoint, model = %model, "whisper api client ready");

        Ok(Self {
            client: builder.build()?,
            endpoint,
            model,
            api_key,
        })
    }
}

/// Append `v1/audio/transcriptions` unless the base already points there
fn transcription_endpoint(base: &Url) -> Result<Url> {
    let path = base.path().trim_end_matches('/').to_string();
    if path.ends_with("/audio/transcriptions") {
        return Ok(base.clone());
    }

    let suffix = if path.ends_with("/v1") {
        "audio/transcriptions"
    } else {
        "v1/audio/transcriptions"
    };

    let mut base = base.clone();
    base.set_path(&format!("{path}/"));
    Ok(base.join(suffix)?)
}

#[async_trait]
impl Transcriber for WhisperApi {
    async fn transcribe(&self, audio: &Path, language: Language) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        tracing::debug!(audio_bytes = bytes.len(), "starting Whisper transcription");

        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let form = Form::new()
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", language.code())
            .text("response_format", "json");

        let mut request = self.client.post(self.endpoint.clone()).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Whisper request failed");
            Error::Stt(format!("request to {} failed: {e}", self.endpoint))
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Stt(format!("invalid transcription response: {e}"))
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "whisper-api"
    }
}

/// Transcribes with a local whisper.cpp `whisper-cli` binary
pub struct WhisperCpp {
    executable: PathBuf,
    model: PathBuf,
    timeout: Option<Duration>,
}

impl WhisperCpp {
    /// Validate the executable and model file
    ///
    /// # Errors
    ///
    /// Returns error if the model is unset or missing, or the executable
    /// cannot be found
    pub fn load(
        executable: &Path,
        model: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let model = model
            .ok_or_else(|| Error::Config("WHISPER_MODEL_PATH is not set".to_string()))?;
        if !model.is_file() {
            return Err(Error::Config(format!(
                "whisper model not found: {}",
                model.display()
            )));
        }

        let executable = super::resolve_executable(executable)?;

        tracing::info!(
            executable = %executable.display(),
            model = %model.display(),
            "whisper.cpp engine loaded"
        );

        Ok(Self {
            executable,
            model: model.to_path_buf(),
            timeout,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperCpp {
    async fn transcribe(&self, audio: &Path, language: Language) -> Result<String> {
        let child = Command::new(&self.executable)
            .arg("-m")
            .arg(&self.model)
            .arg("-l")
            .arg(language.code())
            .arg("-f")
            .arg(audio)
            .arg("-nt")
            .arg("-np")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Stt(format!("failed to spawn whisper.cpp: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::Stt(format!("whisper.cpp timed out after {limit:?}")))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::Stt(format!("whisper.cpp execution failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, stderr = %stderr.trim(), "whisper.cpp failed");
            return Err(Error::Stt(format!(
                "whisper.cpp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "whisper-cpp"
    }
}
