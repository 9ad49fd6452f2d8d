use thiserror::Error;

/// One line of failure detail for an engine that was tried (or skipped) while
/// serving a request.
#[derive(Debug, Clone)]
pub struct EngineDiagnostic {
    pub engine: String,
    pub detail: String,
}

impl EngineDiagnostic {
    pub fn new(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for EngineDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.engine, self.detail)
    }
}

/// Errors surfaced by [`Transcriber::transcribe`](crate::Transcriber::transcribe).
///
/// Engine-level failures (process launch, timeout, malformed output) never
/// appear here directly; they are converted into attempt records inside the
/// orchestrator and only show up as diagnostics on [`TranscribeError::Exhausted`].
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// The request was rejected before any engine was tried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A forced engine id does not match any registered engine.
    #[error("engine '{engine}' unavailable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    /// Every allowed candidate was tried (or was unavailable) and none
    /// produced a usable result.
    #[error("all transcription engines exhausted: [{}]", format_diagnostics(.diagnostics))]
    Exhausted { diagnostics: Vec<EngineDiagnostic> },

    /// The transcription succeeded but the result could not be written out.
    #[error("failed to persist result: {0}")]
    Store(String),
}

fn format_diagnostics(diagnostics: &[EngineDiagnostic]) -> String {
    if diagnostics.is_empty() {
        return "no engines registered".to_string();
    }
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
