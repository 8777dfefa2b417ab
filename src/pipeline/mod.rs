//! The per-request voice pipeline
//!
//! ```text
//! upload ─▶ ingest ─▶ transcribe ─▶ respond ─▶ synthesize ─▶ package
//!            fatal      fatal        degrade     degrade
//! ```
//!
//! Stages run strictly in order. Ingest and transcription failures abort the
//! request; chat and synthesis failures substitute a placeholder and the
//! request still completes.

mod ingest;
mod outcome;

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

pub use ingest::{AudioScope, INPUT_FILE, RESPONSE_FILE};
pub use outcome::{Degradation, Fatal, StageOutcome, SynthesisFailure};

use crate::config::Config;
use crate::language::Phrases;
use crate::llm::{ChatMessage, ChatModel, OllamaChat};
use crate::voice::{self, PiperSynthesizer, SpeechSynthesizer, Transcriber};
use crate::{Language, Result};

/// JSON body returned by `POST /process-audio/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Transcript, or the "no voice input" sentinel
    pub user_text: String,
    /// Model reply, possibly with a synthesis diagnostic appended
    pub llm_response_text: String,
    /// `data:audio/wav;base64,...`, or null when synthesis failed
    pub audio_response_data_url: Option<String>,
}

/// An engine established at startup, or the reason it could not be
pub enum Engine<T: ?Sized> {
    Ready(Arc<T>),
    Unavailable(String),
}

impl<T: ?Sized> Engine<T> {
    /// Engine handle or the recorded load failure
    ///
    /// # Errors
    ///
    /// Returns the load failure message when the engine is unavailable
    pub fn get(&self) -> std::result::Result<&Arc<T>, &str> {
        match self {
            Self::Ready(engine) => Ok(engine),
            Self::Unavailable(reason) => Err(reason),
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<T: ?Sized> From<Result<Arc<T>>> for Engine<T> {
    fn from(result: Result<Arc<T>>) -> Self {
        match result {
            Ok(engine) => Self::Ready(engine),
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }
}

/// Engines guaranteed present for one run
struct ReadyEngines<'a> {
    transcriber: &'a dyn Transcriber,
    synthesizer: &'a dyn SpeechSynthesizer,
}

/// Immutable pipeline shared by all requests
pub struct Pipeline {
    language: Language,
    transcriber: Engine<dyn Transcriber>,
    chat: Engine<dyn ChatModel>,
    synthesizer: Engine<dyn SpeechSynthesizer>,
}

impl Pipeline {
    /// Assemble a pipeline from already-loaded engines
    #[must_use]
    pub const fn new(
        language: Language,
        transcriber: Engine<dyn Transcriber>,
        chat: Engine<dyn ChatModel>,
        synthesizer: Engine<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            language,
            transcriber,
            chat,
            synthesizer,
        }
    }

    /// Load every engine named by the configuration
    ///
    /// Load failures are logged and recorded; they surface later as HTTP 500
    /// on each request rather than stopping the process.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let transcriber: Engine<dyn Transcriber> = voice::load_transcriber(config.stt).into();
        if let Engine::Unavailable(reason) = &transcriber {
            tracing::error!(%reason, "speech-to-text engine failed to load");
        }

        let chat: Engine<dyn ChatModel> =
            OllamaChat::new(&config.llm.base_url, config.llm.model, config.llm.timeout)
                .map(|c| Arc::new(c) as Arc<dyn ChatModel>)
                .into();
        if let Engine::Unavailable(reason) = &chat {
            tracing::warn!(%reason, "chat client not configured, replies will be apologies");
        }

        let synthesizer: Engine<dyn SpeechSynthesizer> = PiperSynthesizer::load(&config.tts)
            .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>)
            .into();
        if let Engine::Unavailable(reason) = &synthesizer {
            tracing::warn!(%reason, "speech synthesis disabled, audio requests will fail");
        }

        Self::new(config.language, transcriber, chat, synthesizer)
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub const fn transcriber(&self) -> &Engine<dyn Transcriber> {
        &self.transcriber
    }

    #[must_use]
    pub const fn chat(&self) -> &Engine<dyn ChatModel> {
        &self.chat
    }

    #[must_use]
    pub const fn synthesizer(&self) -> &Engine<dyn SpeechSynthesizer> {
        &self.synthesizer
    }

    const fn phrases(&self) -> &'static Phrases {
        self.language.phrases()
    }

    /// Check the startup-fatal conditions before touching the upload
    ///
    /// # Errors
    ///
    /// Returns the fatal reason when the transcriber or the voice model is
    /// unavailable
    pub fn preflight(&self) -> std::result::Result<(), Fatal> {
        self.ready_engines().map(|_| ())
    }

    fn ready_engines(&self) -> std::result::Result<ReadyEngines<'_>, Fatal> {
        let transcriber = self
            .transcriber
            .get()
            .map_err(|reason| Fatal::TranscriberUnavailable(reason.to_string()))?;
        let synthesizer = self
            .synthesizer
            .get()
            .map_err(|reason| Fatal::VoiceModelUnavailable(reason.to_string()))?;

        Ok(ReadyEngines {
            transcriber: transcriber.as_ref(),
            synthesizer: synthesizer.as_ref(),
        })
    }

    /// Run all stages on one uploaded clip
    ///
    /// # Errors
    ///
    /// Returns the fatal reason when an aborting stage fails
    pub async fn process(&self, audio: &[u8]) -> std::result::Result<ProcessingResult, Fatal> {
        let started = Instant::now();
        let engines = self.ready_engines()?;

        let scope = Self::ingest(audio).await.proceed()?.0;

        let transcript = self.transcribe(engines.transcriber, &scope).await;
        let heard = transcript.degradation() != Some(&Degradation::NoSpeech);
        let (user_text, _) = transcript.proceed()?;

        let (reply, chat_issue) = self.respond(&user_text, heard).await.proceed()?;
        if let Some(Degradation::ChatFailed(reason)) = &chat_issue {
            tracing::warn!(%reason, "chat completion failed, replying with apology");
        }

        let audio = Self::synthesize(engines.synthesizer, &reply, &scope).await;

        let result = package(user_text, reply, audio, self.phrases());

        tracing::info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            has_audio = result.audio_response_data_url.is_some(),
            "request processed"
        );

        Ok(result)
    }

    async fn ingest(audio: &[u8]) -> StageOutcome<AudioScope> {
        match AudioScope::ingest(audio).await {
            Ok(scope) => StageOutcome::Ok(scope),
            Err(e) => {
                tracing::error!(error = %e, "failed to save uploaded audio");
                StageOutcome::Fatal(Fatal::AudioSave(e.to_string()))
            }
        }
    }

    async fn transcribe(
        &self,
        engine: &dyn Transcriber,
        scope: &AudioScope,
    ) -> StageOutcome<String> {
        tracing::debug!(
            engine = engine.name(),
            path = %scope.input_path().display(),
            "transcribing"
        );

        match engine.transcribe(scope.input_path(), self.language).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::info!("no speech detected");
                    StageOutcome::Degraded(
                        self.phrases().no_speech.to_string(),
                        Degradation::NoSpeech,
                    )
                } else {
                    tracing::info!(user_text = %text, "user said");
                    StageOutcome::Ok(text.to_string())
                }
            }
            Err(e) => {
                tracing::error!(engine = engine.name(), error = %e, "transcription failed");
                StageOutcome::Fatal(Fatal::Transcription(e.to_string()))
            }
        }
    }

    async fn respond(&self, transcript: &str, heard: bool) -> StageOutcome<String> {
        let phrases = self.phrases();

        if !heard {
            return StageOutcome::Degraded(
                phrases.not_heard.to_string(),
                Degradation::NothingToAnswer,
            );
        }

        let chat = match self.chat.get() {
            Ok(chat) => chat,
            Err(reason) => {
                return StageOutcome::Degraded(
                    phrases.chat_unreachable.to_string(),
                    Degradation::ChatFailed(reason.to_string()),
                );
            }
        };

        tracing::debug!(model = chat.model(), "requesting chat completion");
        let messages = [
            ChatMessage::system(phrases.system_prompt),
            ChatMessage::user(transcript),
        ];

        match chat.chat(&messages).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                tracing::info!(reply = %reply, "model replied");
                StageOutcome::Ok(reply)
            }
            Ok(_) => StageOutcome::Degraded(
                phrases.chat_unreachable.to_string(),
                Degradation::ChatFailed("empty reply".to_string()),
            ),
            Err(e) => StageOutcome::Degraded(
                phrases.chat_unreachable.to_string(),
                Degradation::ChatFailed(e.to_string()),
            ),
        }
    }

    async fn synthesize(
        engine: &dyn SpeechSynthesizer,
        reply: &str,
        scope: &AudioScope,
    ) -> StageOutcome<Option<Vec<u8>>> {
        let output = scope.response_path();

        match engine.synthesize(reply, &output).await {
            Ok(audio) if audio.is_empty() => {
                tracing::error!(engine = engine.name(), "speech synthesis produced no audio");
                StageOutcome::Degraded(None, Degradation::Synthesis(SynthesisFailure::EmptyOutput))
            }
            Ok(audio) => StageOutcome::Ok(Some(audio)),
            Err(e) => {
                tracing::error!(engine = engine.name(), error = %e, "speech synthesis failed");
                StageOutcome::Degraded(None, Degradation::Synthesis(SynthesisFailure::from(&e)))
            }
        }
    }
}

/// Assemble the response from the final stage values
///
/// A synthesis degradation appends its diagnostic to the reply text.
#[must_use]
pub fn package(
    user_text: String,
    mut reply: String,
    audio: StageOutcome<Option<Vec<u8>>>,
    phrases: &Phrases,
) -> ProcessingResult {
    let audio = match audio {
        StageOutcome::Ok(audio) => audio,
        StageOutcome::Degraded(audio, reason) => {
            if let Degradation::Synthesis(failure) = &reason {
                reply.push_str(failure.reply_suffix(phrases));
            }
            audio
        }
        StageOutcome::Fatal(_) => None,
    };

    ProcessingResult {
        user_text,
        llm_response_text: reply,
        audio_response_data_url: audio.map(|bytes| voice::wav_data_url(&bytes)),
    }
}
