//! Vox Gateway - Voice round trip web service for a local assistant
//!
//! This library provides the core functionality for the vox gateway:
//! - Audio ingest into per-request scratch directories
//! - Speech-to-text (OpenAI-compatible server or local whisper.cpp)
//! - Chat replies from an Ollama model
//! - Speech synthesis through the piper executable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Browser (record / play)                 │
//! └────────────────────┬────────────────────────────────┘
//!                      │  POST /process-audio/
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Vox Gateway                         │
//! │   Ingest  │  Transcribe  │  Respond  │  Synthesize   │
//! └──────┬──────────────┬──────────────┬────────────────┘
//!        │              │              │
//!   whisper server   Ollama         piper
//!   / whisper-cli
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use language::{Language, Phrases};
pub use llm::{ChatMessage, ChatModel, OllamaChat, Role};
pub use pipeline::{Engine, Pipeline, ProcessingResult, StageOutcome};
pub use voice::{PiperSynthesizer, SpeechSynthesizer, SynthesisError, Transcriber};
