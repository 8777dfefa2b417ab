//! Voice processing module
//!
//! Speech-to-text engines, the piper synthesizer and WAV helpers.

mod stt;
mod tts;
mod wav;

use std::path::{Path, PathBuf};

pub use stt::{Transcriber, WhisperApi, WhisperCpp, load_transcriber};
pub use tts::{PiperSynthesizer, SpeechSynthesizer, SynthesisError};
pub use wav::{
    WAV_DATA_URL_PREFIX, WavSummary, decode_wav_data_url, describe_wav, samples_to_wav,
    wav_data_url,
};

use crate::{Error, Result};

/// Resolve an executable given either as a path or as a bare name on `PATH`
///
/// # Errors
///
/// Returns error if the path does not exist or the name is not on `PATH`
pub fn resolve_executable(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        return Err(Error::Config(format!(
            "executable not found: {}",
            program.display()
        )));
    }

    which::which(program)
        .map_err(|e| Error::Config(format!("{} not found on PATH: {e}", program.display())))
}
