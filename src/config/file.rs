//! TOML configuration file loading
//!
//! Supports `~/.config/vox/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxConfigFile {
    /// Conversation language ("it" or "en")
    #[serde(default)]
    pub language: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Speech-to-text engine configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Directory holding `templates/` and `static/`
    pub web_dir: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "api" or "whisper-cpp"
    pub backend: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub whisper_cpp_executable: Option<String>,
    pub whisper_model_path: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Chat model configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Ollama host (e.g. `http://localhost:11434`)
    pub base_url: Option<String>,
    /// Model tag (e.g. "mistral:7b-instruct-q4_K_M")
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Path or bare name of the piper executable
    pub executable: Option<String>,
    /// Path to the `.onnx` voice model
    pub voice_model: Option<String>,
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config(content: &str) -> Result<VoxConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoxConfigFile {
    let Some(path) = config_file_path() else {
        return VoxConfigFile::default();
    };

    load_config_from(&path)
}

/// Load a TOML config file from an explicit path, falling back to defaults
pub fn load_config_from(path: &Path) -> VoxConfigFile {
    if !path.exists() {
        return VoxConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/vox/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vox").join("config.toml"))
}
