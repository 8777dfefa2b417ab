//! Configuration management for Vox gateway
//!
//! Values resolve as env > toml > default. The binary layers CLI flags on top.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use self::file::VoxConfigFile;
use crate::{Error, Language, Result};

/// Default Ollama host inside the compose network
pub const DEFAULT_OLLAMA_URL: &str = "http://ollama_service:11434";

/// Default Ollama model tag
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct-q4_K_M";

/// Default location of the piper executable
pub const DEFAULT_PIPER_EXECUTABLE: &str = "/usr/local/bin/piper";

/// Hard wall-clock bound on one synthesis run
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(15);

/// Default upload limit for `POST /process-audio/`
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Vox gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Language for transcription, prompt and placeholders
    pub language: Language,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Speech-to-text engine configuration
    pub stt: SttConfig,

    /// Chat model configuration
    pub llm: LlmConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Directory holding `templates/index.html` and `static/`
    pub web_dir: PathBuf,

    /// Maximum accepted request body size
    pub max_upload_bytes: usize,

    /// PEM certificate for HTTPS (feature `tls`)
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for HTTPS (feature `tls`)
    pub tls_key: Option<PathBuf>,
}

/// Which speech-to-text engine to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttBackend {
    /// OpenAI-compatible `/v1/audio/transcriptions` server
    #[default]
    Api,
    /// Local whisper.cpp command line
    WhisperCpp,
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" | "http" | "openai" => Ok(Self::Api),
            "whisper-cpp" | "whisper_cpp" | "whispercpp" | "local" => Ok(Self::WhisperCpp),
            other => Err(Error::Config(format!("unknown STT backend: {other}"))),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    pub backend: SttBackend,

    /// Base URL of the transcription server (backend `api`)
    pub url: String,

    /// Model name sent to the server (backend `api`)
    pub model: String,

    /// Optional bearer token for the transcription server
    pub api_key: Option<SecretString>,

    /// whisper.cpp executable (backend `whisper-cpp`)
    pub whisper_cpp_executable: PathBuf,

    /// ggml model file (backend `whisper-cpp`)
    pub whisper_model_path: Option<PathBuf>,

    /// Optional bound on one transcription
    pub timeout: Option<Duration>,
}

/// Chat model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Ollama host
    pub base_url: String,

    /// Model tag
    pub model: String,

    /// Optional bound on one completion
    pub timeout: Option<Duration>,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Piper executable (absolute path or name resolved on `PATH`)
    pub executable: PathBuf,

    /// Voice model; `None` disables the whole endpoint
    pub voice_model: Option<PathBuf>,

    /// Wall-clock bound on one synthesis
    pub timeout: Duration,
}

/// Export the variables of a `.env` file into the process environment
///
/// Variables already set in the environment keep their value. Returns
/// `false` when the file does not exist.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(Error::Config(format!(
            "invalid env file {}: {e}",
            path.display()
        ))),
    }
}

impl Config {
    /// Load configuration from the process environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn from_sources<F>(fc: VoxConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let language = env("VOX_LANGUAGE")
            .or(fc.language)
            .map(|s| s.parse::<Language>())
            .transpose()?
            .unwrap_or_default();

        let server = ServerConfig {
            host: env("VOX_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env(&env, "VOX_PORT")?
                .or(fc.server.port)
                .unwrap_or(8000),
            web_dir: env("VOX_WEB_DIR")
                .or(fc.server.web_dir)
                .map_or_else(|| PathBuf::from("web"), PathBuf::from),
            max_upload_bytes: parse_env(&env, "VOX_MAX_UPLOAD_BYTES")?
                .or(fc.server.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            tls_cert: env("VOX_TLS_CERT").or(fc.server.tls_cert).map(PathBuf::from),
            tls_key: env("VOX_TLS_KEY").or(fc.server.tls_key).map(PathBuf::from),
        };

        let stt = SttConfig {
            backend: env("VOX_STT_BACKEND")
                .or(fc.stt.backend)
                .map(|s| s.parse::<SttBackend>())
                .transpose()?
                .unwrap_or_default(),
            url: env("VOX_STT_URL")
                .or(fc.stt.url)
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            model: env("VOX_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| "medium".to_string()),
            api_key: env("VOX_STT_API_KEY")
                .or(fc.stt.api_key)
                .map(|key| SecretString::new(key.into())),
            whisper_cpp_executable: env("WHISPER_CPP_EXECUTABLE")
                .or(fc.stt.whisper_cpp_executable)
                .map_or_else(|| PathBuf::from("whisper-cli"), PathBuf::from),
            whisper_model_path: env("WHISPER_MODEL_PATH")
                .or(fc.stt.whisper_model_path)
                .map(PathBuf::from),
            timeout: parse_env(&env, "VOX_STT_TIMEOUT_SECS")?
                .or(fc.stt.timeout_secs)
                .map(Duration::from_secs),
        };

        let llm = LlmConfig {
            base_url: env("OLLAMA_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: env("OLLAMA_MODEL_NAME")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            timeout: parse_env(&env, "VOX_CHAT_TIMEOUT_SECS")?
                .or(fc.llm.timeout_secs)
                .map(Duration::from_secs),
        };

        let tts = TtsConfig {
            executable: env("PIPER_EXECUTABLE")
                .or(fc.tts.executable)
                .map_or_else(|| PathBuf::from(DEFAULT_PIPER_EXECUTABLE), PathBuf::from),
            voice_model: env("PIPER_VOICE_MODEL_PATH_DEFAULT")
                .or(fc.tts.voice_model)
                .map(PathBuf::from),
            timeout: DEFAULT_SYNTHESIS_TIMEOUT,
        };

        Ok(Self {
            language,
            server,
            stt,
            llm,
            tts,
        })
    }
}

/// Parse an optional numeric environment value
fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_source() {
        let config = Config::from_sources(VoxConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.language, Language::Italian);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.llm.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.tts.executable, PathBuf::from(DEFAULT_PIPER_EXECUTABLE));
        assert!(config.tts.voice_model.is_none());
        assert_eq!(config.tts.timeout, Duration::from_secs(15));
        assert_eq!(config.stt.backend, SttBackend::Api);
        assert!(config.stt.timeout.is_none());
        assert!(config.llm.timeout.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let fc = file::parse_config(
            r#"
            [llm]
            base_url = "http://from-file:11434"
            model = "file-model"

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("OLLAMA_BASE_URL", "http://from-env:11434"),
                ("PIPER_VOICE_MODEL_PATH_DEFAULT", "/voices/it_IT-paola-medium.onnx"),
                ("VOX_STT_API_KEY", "sk-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.base_url, "http://from-env:11434");
        assert_eq!(config.llm.model, "file-model");
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.tts.voice_model,
            Some(PathBuf::from("/voices/it_IT-paola-medium.onnx"))
        );
        assert_eq!(
            config.stt.api_key.as_ref().map(|k| k.expose_secret()),
            Some("sk-test")
        );
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = Config::from_sources(
            VoxConfigFile::default(),
            env_from(&[("PIPER_VOICE_MODEL_PATH_DEFAULT", "  ")]),
        )
        .unwrap();
        assert!(config.tts.voice_model.is_none());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let err = Config::from_sources(
            VoxConfigFile::default(),
            env_from(&[("VOX_CHAT_TIMEOUT_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("VOX_CHAT_TIMEOUT_SECS"));
    }

    #[test]
    fn parses_backend_and_language() {
        let config = Config::from_sources(
            VoxConfigFile::default(),
            env_from(&[
                ("VOX_STT_BACKEND", "whisper-cpp"),
                ("VOX_LANGUAGE", "en"),
                ("VOX_STT_TIMEOUT_SECS", "30"),
            ]),
        )
        .unwrap();
        assert_eq!(config.stt.backend, SttBackend::WhisperCpp);
        assert_eq!(config.language, Language::English);
        assert_eq!(config.stt.timeout, Some(Duration::from_secs(30)));

        assert!("carrier-pigeon".parse::<SttBackend>().is_err());
    }

    #[test]
    fn env_file_exports_missing_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# piper voice\nVOX_ENV_FILE_TEST_VOICE=/models/it_IT-paola-medium.onnx\n",
        )
        .unwrap();

        assert!(load_env_file(&path).unwrap());
        assert_eq!(
            std::env::var("VOX_ENV_FILE_TEST_VOICE").unwrap(),
            "/models/it_IT-paola-medium.onnx"
        );
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!load_env_file(&dir.path().join(".env")).unwrap());
    }

    #[test]
    fn malformed_env_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "this line has no equals sign\n").unwrap();

        let err = load_env_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
