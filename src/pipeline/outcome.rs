//! Tagged stage outcomes
//!
//! Every stage reports `Ok`, `Degraded` (a substitute value plus the reason)
//! or `Fatal`. Only ingest and transcription ever produce `Fatal`.

use thiserror::Error;

use crate::language::Phrases;
use crate::voice::SynthesisError;

/// Result of one pipeline stage
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage produced its value
    Ok(T),
    /// The stage failed in an expected way and substituted `T`
    Degraded(T, Degradation),
    /// The request cannot continue
    Fatal(Fatal),
}

impl<T> StageOutcome<T> {
    /// Split into the value and the degradation, or surface the fatal error
    ///
    /// # Errors
    ///
    /// Returns the fatal reason when the stage aborted the request
    pub fn proceed(self) -> Result<(T, Option<Degradation>), Fatal> {
        match self {
            Self::Ok(value) => Ok((value, None)),
            Self::Degraded(value, reason) => Ok((value, Some(reason))),
            Self::Fatal(fatal) => Err(fatal),
        }
    }

    /// Degradation reason, if any
    #[must_use]
    pub const fn degradation(&self) -> Option<&Degradation> {
        match self {
            Self::Degraded(_, reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a stage substituted a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The transcriber returned blank text
    NoSpeech,
    /// The responder skipped the model because nothing was heard
    NothingToAnswer,
    /// The chat service failed or is not configured
    ChatFailed(String),
    /// The synthesizer failed; the reply gets a suffix
    Synthesis(SynthesisFailure),
}

/// Synthesis failure modes, each with its own reply suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisFailure {
    Exit(String),
    EmptyOutput,
    Timeout,
    Fault(String),
}

impl From<&SynthesisError> for SynthesisFailure {
    fn from(err: &SynthesisError) -> Self {
        match err {
            SynthesisError::Exit { .. } => Self::Exit(err.to_string()),
            SynthesisError::EmptyOutput(_) => Self::EmptyOutput,
            SynthesisError::Timeout(_) => Self::Timeout,
            SynthesisError::Io(e) => Self::Fault(e.to_string()),
        }
    }
}

impl SynthesisFailure {
    /// Suffix appended to the reply text
    #[must_use]
    pub const fn reply_suffix(&self, phrases: &Phrases) -> &'static str {
        match self {
            Self::Exit(_) => phrases.synthesis_failed,
            Self::EmptyOutput => phrases.audio_missing,
            Self::Timeout => phrases.synthesis_timeout,
            Self::Fault(_) => phrases.synthesis_fault,
        }
    }
}

/// Failures that abort the whole request with HTTP 500
#[derive(Debug, Error)]
pub enum Fatal {
    #[error("speech-to-text engine not loaded on the server: {0}")]
    TranscriberUnavailable(String),

    #[error("voice model not available: {0}")]
    VoiceModelUnavailable(String),

    #[error("error saving the audio file: {0}")]
    AudioSave(String),

    #[error("error during transcription: {0}")]
    Transcription(String),
}
