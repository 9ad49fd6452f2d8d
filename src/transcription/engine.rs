use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::caption::Segment;
use crate::config::EngineTuning;

/// How an engine is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Launched as a subprocess with a bounded timeout.
    ExternalProcess,
    /// Called through an in-process model binding.
    InProcessModel,
}

/// Static metadata about one registered engine. Set at construction and not
/// mutated during a run.
#[derive(Debug, Clone)]
pub struct EngineDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: EngineKind,
    pub priority: u32,
    pub trusted: bool,
    pub non_speech_markers: Vec<String>,
    pub tuning: EngineTuning,
}

/// Result of probing whether an engine is currently usable.
#[derive(Debug, Clone, Serialize)]
pub struct EngineAvailability {
    pub engine: String,
    pub available: bool,
    pub reason: Option<String>,
}

impl EngineAvailability {
    pub fn available(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// One transcription request as submitted by the caller.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Path to the recorded WAV artifact.
    pub audio: PathBuf,
    /// ISO-639-1 hint, or "auto" to let the engine detect.
    pub language: String,
    /// Optional free-text context prompt fed to the engine.
    pub prompt: Option<String>,
    /// Base name for the canonical output files.
    pub output_name: String,
    /// When set, only this engine is tried and fallback is bypassed.
    pub forced_engine: Option<String>,
    /// Advance to the next candidate after a failed or rejected attempt.
    pub fallback: bool,
    /// Optional wall-clock budget for the whole request.
    pub timeout: Option<Duration>,
}

impl TranscriptionRequest {
    pub fn new(audio: impl Into<PathBuf>, output_name: impl Into<String>) -> Self {
        Self {
            audio: audio.into(),
            language: "auto".to_string(),
            prompt: None,
            output_name: output_name.into(),
            forced_engine: None,
            fallback: true,
            timeout: None,
        }
    }
}

/// The record of one engine invocation for one request.
///
/// Invokers always return an attempt; failures are carried in `error`, never
/// raised to the orchestrator.
#[derive(Debug, Clone)]
pub struct TranscriptionAttempt {
    pub engine: String,
    pub text: String,
    pub segments: Vec<Segment>,
    /// Language the engine detected or was told; `None` when unknown.
    pub language: Option<String>,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl TranscriptionAttempt {
    pub fn failure(
        engine: impl Into<String>,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.into(),
            text: String::new(),
            segments: Vec::new(),
            language: None,
            elapsed,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A speech-to-text backend.
///
/// Implementations must be `Send + Sync` so they can be held behind
/// `Arc<dyn TranscriptionEngine>` in the registry.
#[async_trait::async_trait]
pub trait TranscriptionEngine: Send + Sync {
    fn descriptor(&self) -> &EngineDescriptor;

    /// Cheap runtime usability check. Must not fail; anything that goes
    /// wrong degrades to `available = false` with a reason.
    async fn probe(&self) -> EngineAvailability;

    /// Run one transcription. Expensive (seconds to minutes); the
    /// orchestrator only calls this after a quality-gated decision.
    async fn invoke(&self, request: &TranscriptionRequest) -> TranscriptionAttempt;
}

/// Language codes whisper builds accept, plus "auto".
pub const LANGUAGES: &[&str] = &[
    "auto", "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar",
    "sv", "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta",
    "no", "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn",
    "sr", "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq",
    "sw", "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd",
    "gu", "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo",
    "tl", "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su",
];

pub fn is_supported_language(code: &str) -> bool {
    LANGUAGES.contains(&code)
}
