use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use crate::caption::{segments_to_srt, Segment};

/// Canonical file locations written for one result.
#[derive(Debug, Clone, Serialize)]
pub struct StoredPaths {
    pub transcript: PathBuf,
    pub captions: Option<PathBuf>,
}

/// Writes canonical transcript and caption files under one transcripts
/// directory.
pub struct ResultStore {
    transcripts_dir: PathBuf,
}

impl ResultStore {
    pub fn new(transcripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            transcripts_dir: transcripts_dir.into(),
        }
    }

    pub fn transcripts_dir(&self) -> &Path {
        &self.transcripts_dir
    }

    /// Write `<output_name>.txt` (header block + separator + raw transcript)
    /// and, when segments exist, `<output_name>.srt`.
    pub async fn persist(
        &self,
        output_name: &str,
        source_file: &str,
        engine: &str,
        language: &str,
        text: &str,
        segments: &[Segment],
    ) -> Result<StoredPaths, String> {
        tokio::fs::create_dir_all(&self.transcripts_dir)
            .await
            .map_err(|e| format!("failed to create transcripts dir: {}", e))?;

        let transcript = self.transcripts_dir.join(format!("{}.txt", output_name));
        let content = format!(
            "Audio File: {}\nEngine: {}\nDetected Language: {}\nTranscription Date: {}\n{}\n{}\n",
            source_file,
            engine,
            language,
            chrono::Local::now().to_rfc3339(),
            "-".repeat(50),
            text
        );
        tokio::fs::write(&transcript, content)
            .await
            .map_err(|e| format!("failed to write transcript: {}", e))?;

        let captions = if segments.is_empty() {
            None
        } else {
            let path = self.transcripts_dir.join(format!("{}.srt", output_name));
            tokio::fs::write(&path, segments_to_srt(segments))
                .await
                .map_err(|e| format!("failed to write caption file: {}", e))?;
            Some(path)
        };

        log::debug!("persisted transcript to {}", transcript.display());
        Ok(StoredPaths {
            transcript,
            captions,
        })
    }
}

/// Read-only copy of the process-wide counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatsSnapshot {
    pub total_requests: u64,
    pub attempts: BTreeMap<String, u64>,
    pub successes: BTreeMap<String, u64>,
    pub fallbacks: u64,
}

impl EngineStatsSnapshot {
    pub fn attempts_for(&self, engine: &str) -> u64 {
        self.attempts.get(engine).copied().unwrap_or(0)
    }

    pub fn successes_for(&self, engine: &str) -> u64 {
        self.successes.get(engine).copied().unwrap_or(0)
    }

    /// Human-readable report of per-engine success and fallback rates.
    pub fn summary(&self) -> String {
        if self.total_requests == 0 {
            return "no transcriptions performed yet".to_string();
        }
        let mut lines = vec![format!("total requests: {}", self.total_requests)];
        for (engine, attempts) in &self.attempts {
            let successes = self.successes_for(engine);
            lines.push(format!(
                "{}: {}/{} attempts succeeded",
                engine, successes, attempts
            ));
        }
        let fallback_rate = self.fallbacks as f64 / self.total_requests as f64 * 100.0;
        lines.push(format!(
            "fallbacks: {} ({:.1}%)",
            self.fallbacks, fallback_rate
        ));
        lines.join("\n")
    }
}

/// Process-wide attempt/success/fallback counters, shared across concurrent
/// requests. Increments are serialized by the lock; never reset.
#[derive(Default)]
pub struct StatsTracker {
    inner: Mutex<EngineStatsSnapshot>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.inner.lock().unwrap().total_requests += 1;
    }

    pub fn record_attempt(&self, engine: &str) {
        let mut inner = self.inner.lock().unwrap();
        *inner.attempts.entry(engine.to_string()).or_insert(0) += 1;
    }

    pub fn record_success(&self, engine: &str) {
        let mut inner = self.inner.lock().unwrap();
        *inner.successes.entry(engine.to_string()).or_insert(0) += 1;
    }

    pub fn record_fallback(&self) {
        self.inner.lock().unwrap().fallbacks += 1;
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        self.inner.lock().unwrap().clone()
    }
}
