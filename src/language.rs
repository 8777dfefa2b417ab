//! Conversation language and the fixed phrases tied to it
//!
//! The transcription hint, the system preamble and every placeholder the
//! pipeline substitutes for a degraded stage come from one table per
//! language, so a deployment switches all of them at once.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Language the assistant listens and answers in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Italian,
    English,
}

/// Fixed user-visible strings for one language
#[derive(Debug)]
pub struct Phrases {
    /// Transcript substituted when the engine hears nothing
    pub no_speech: &'static str,
    /// Reply used instead of calling the model when nothing was heard
    pub not_heard: &'static str,
    /// Reply used when the chat service cannot be reached
    pub chat_unreachable: &'static str,
    /// System message sent ahead of every transcript
    pub system_prompt: &'static str,
    /// Appended when the synthesizer exits non-zero
    pub synthesis_failed: &'static str,
    /// Appended when the synthesizer exits cleanly without audio
    pub audio_missing: &'static str,
    /// Appended when the synthesizer is killed on timeout
    pub synthesis_timeout: &'static str,
    /// Appended for any other synthesizer fault
    pub synthesis_fault: &'static str,
}

const ITALIAN: Phrases = Phrases {
    no_speech: "(Nessun input vocale rilevato)",
    not_heard: "Non ho sentito nulla, potresti ripetere?",
    chat_unreachable: "Non sono riuscito a contattare il modello di linguaggio.",
    system_prompt: "Sei un assistente vocale utile e conciso. Rispondi in italiano.",
    synthesis_failed: " (Errore sintesi vocale)",
    audio_missing: " (Errore creazione file audio)",
    synthesis_timeout: " (Timeout sintesi vocale)",
    synthesis_fault: " (Errore grave sintesi vocale)",
};

const ENGLISH: Phrases = Phrases {
    no_speech: "(no voice input detected)",
    not_heard: "I didn't hear anything, could you repeat?",
    chat_unreachable: "I could not reach the language model.",
    system_prompt: "You are a helpful and concise voice assistant. Respond in English.",
    synthesis_failed: " (speech synthesis error)",
    audio_missing: " (audio file creation error)",
    synthesis_timeout: " (speech synthesis timeout)",
    synthesis_fault: " (severe speech synthesis error)",
};

impl Language {
    /// ISO 639-1 code passed to the speech-to-text engine
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Italian => "it",
            Self::English => "en",
        }
    }

    /// Phrase table for this language
    #[must_use]
    pub const fn phrases(self) -> &'static Phrases {
        match self {
            Self::Italian => &ITALIAN,
            Self::English => &ENGLISH,
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "it" | "ita" | "italian" | "italiano" => Ok(Self::Italian),
            "en" | "eng" | "english" => Ok(Self::English),
            other => Err(Error::Config(format!("unsupported language: {other}"))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_names() {
        assert_eq!("it".parse::<Language>().unwrap(), Language::Italian);
        assert_eq!(" EN ".parse::<Language>().unwrap(), Language::English);
        assert_eq!("Italiano".parse::<Language>().unwrap(), Language::Italian);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn suffixes_start_with_a_space() {
        for lang in [Language::Italian, Language::English] {
            let p = lang.phrases();
            for suffix in [
                p.synthesis_failed,
                p.audio_missing,
                p.synthesis_timeout,
                p.synthesis_fault,
            ] {
                assert!(suffix.starts_with(' '), "{suffix:?}");
            }
        }
    }

    #[test]
    fn default_is_italian() {
        assert_eq!(Language::default().code(), "it");
        assert_eq!(
            Language::default().phrases().no_speech,
            "(Nessun input vocale rilevato)"
        );
    }
}
