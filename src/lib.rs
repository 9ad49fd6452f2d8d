//! Multi-engine speech-to-text orchestration.
//!
//! Recorded WAV artifacts go in; transcript text, SRT captions and a quality
//! verdict come out. Several whisper backends can be registered at different
//! priorities; when the preferred one is unavailable, fails, or returns a
//! result the quality gate rejects (music classification, degenerate
//! repetition), the next one is tried automatically.
//!
//! ```no_run
//! use voicescribe::{Transcriber, TranscriberConfig, TranscriptionRequest};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transcriber = Transcriber::new(&TranscriberConfig::load());
//! let mut request = TranscriptionRequest::new("recordings/note.wav", "note");
//! request.language = "es".to_string();
//! let result = transcriber.transcribe(&request).await?;
//! println!("[{}] {}", result.engine, result.text);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod caption;
pub mod config;
pub mod error;
pub mod quality;
pub mod store;
pub mod transcriber;
pub mod transcription;

pub use audio::AudioArtifact;
pub use caption::Segment;
pub use config::{EngineConfig, EngineTuning, TranscriberConfig};
pub use error::{EngineDiagnostic, TranscribeError};
pub use quality::{QualityTier, QualityVerdict};
pub use store::{EngineStatsSnapshot, ResultStore, StatsTracker, StoredPaths};
pub use transcriber::{Transcriber, TranscriptionResult};
pub use transcription::{
    EngineAvailability, EngineDescriptor, EngineKind, EngineRegistry, TranscriptionAttempt,
    TranscriptionEngine, TranscriptionRequest,
};
