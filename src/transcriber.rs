use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;

use crate::audio::AudioArtifact;
use crate::caption::Segment;
use crate::config::TranscriberConfig;
use crate::error::{EngineDiagnostic, TranscribeError};
use crate::quality::{self, QualityTier};
use crate::store::{ResultStore, StatsTracker, StoredPaths};
use crate::transcription::{
    is_supported_language, EngineRegistry, TranscriptionAttempt, TranscriptionEngine,
    TranscriptionRequest,
};

/// The outcome of a successful (possibly degraded) transcription request.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    /// Engine that produced the returned text.
    pub engine: String,
    pub text: String,
    /// Always computed from `text`, never estimated separately.
    pub word_count: usize,
    pub segments: Vec<Segment>,
    /// Detected language, or the caller's hint when detection is unavailable.
    pub language: String,
    pub quality: QualityTier,
    /// Set when every candidate was rejected and this is the least-bad
    /// attempt; callers decide whether to keep it.
    pub degraded: bool,
    #[serde(skip)]
    pub processing_time: Duration,
    pub paths: StoredPaths,
}

/// Drives the try/fallback sequence across registered engines.
///
/// A single request runs sequentially: one engine at a time, quality gating
/// strictly after each invocation, so a second engine is only paid for when
/// the first was rejected. Independent requests may run concurrently against
/// one `Transcriber`; the stats counters are serialized internally.
pub struct Transcriber {
    registry: EngineRegistry,
    store: ResultStore,
    stats: StatsTracker,
}

impl Transcriber {
    pub fn new(config: &TranscriberConfig) -> Self {
        Self {
            registry: EngineRegistry::from_config(config),
            store: ResultStore::new(config.transcripts_dir.clone()),
            stats: StatsTracker::new(),
        }
    }

    /// Build a transcriber over caller-supplied engines. This is the seam
    /// embedders (and tests) use to register custom backends.
    pub fn with_engines(
        engines: Vec<Arc<dyn TranscriptionEngine>>,
        transcripts_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry: EngineRegistry::new(engines),
            store: ResultStore::new(transcripts_dir),
            stats: StatsTracker::new(),
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn stats(&self) -> crate::store::EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Transcribe one recorded artifact, falling back across engines until
    /// an acceptable result is found.
    pub async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResult, TranscribeError> {
        let artifact = self.validate(request)?;
        self.stats.record_request();

        log::info!(
            "transcribing {} ({:.1}s, language hint '{}')",
            artifact.file_name(),
            artifact.duration_secs,
            request.language
        );

        let deadline = request.timeout.map(|t| Instant::now() + t);
        let mut diagnostics: Vec<EngineDiagnostic> = Vec::new();
        let candidates = self.select_candidates(request, &mut diagnostics).await?;
        if candidates.is_empty() {
            return Err(TranscribeError::Exhausted { diagnostics });
        }
        let first_choice = candidates[0].descriptor().id.clone();

        // Every rejected-but-successful attempt is kept so the least-bad one
        // can be returned (marked degraded) if nothing acceptable turns up.
        let mut rejected: Vec<TranscriptionAttempt> = Vec::new();

        for engine in &candidates {
            let id = engine.descriptor().id.clone();

            let attempt = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        diagnostics.push(EngineDiagnostic::new(
                            &id,
                            "request budget exhausted before invocation",
                        ));
                        break;
                    }
                    match timeout(remaining, engine.invoke(request)).await {
                        Ok(attempt) => attempt,
                        // Dropping the invocation aborts it best-effort
                        // (child processes are killed on drop).
                        Err(_) => TranscriptionAttempt::failure(
                            &id,
                            remaining,
                            "request budget exceeded mid-invocation",
                        ),
                    }
                }
                None => engine.invoke(request).await,
            };
            self.stats.record_attempt(&id);

            if let Some(error) = &attempt.error {
                log::warn!("[{}] attempt failed: {}", id, error);
                diagnostics.push(EngineDiagnostic::new(&id, error.clone()));
                if !request.fallback {
                    break;
                }
                continue;
            }

            let descriptor = engine.descriptor();
            let verdict = quality::assess(
                &attempt.text,
                &descriptor.non_speech_markers,
                descriptor.trusted,
            );
            if verdict.acceptable {
                return self
                    .finish(request, &artifact, attempt, verdict.tier, false, &first_choice)
                    .await;
            }

            let reason = verdict
                .reason
                .unwrap_or_else(|| "quality rejected".to_string());
            log::warn!("[{}] result rejected: {}", id, reason);
            diagnostics.push(EngineDiagnostic::new(&id, format!("quality rejected: {}", reason)));
            rejected.push(attempt);
            if !request.fallback {
                break;
            }
        }

        // Nothing acceptable. Prefer the least-bad rejected attempt over an
        // outright failure; earliest attempt wins ties.
        let mut best: Option<TranscriptionAttempt> = None;
        for attempt in rejected {
            match &best {
                Some(current) if current.word_count() >= attempt.word_count() => {}
                _ => best = Some(attempt),
            }
        }
        if let Some(best) = best {
            log::warn!("returning degraded result from {}", best.engine);
            return self
                .finish(request, &artifact, best, QualityTier::Poor, true, &first_choice)
                .await;
        }

        Err(TranscribeError::Exhausted { diagnostics })
    }

    /// Transcribe the newest `*.wav` under a recordings directory.
    pub async fn transcribe_latest(
        &self,
        recordings_dir: &Path,
        language: &str,
    ) -> Result<TranscriptionResult, TranscribeError> {
        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        let entries = std::fs::read_dir(recordings_dir).map_err(|e| {
            TranscribeError::InvalidRequest(format!(
                "no recordings directory at {}: {}",
                recordings_dir.display(),
                e
            ))
        })?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_wav = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if !is_wav {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, path));
            }
        }

        let (_, path) = newest.ok_or_else(|| {
            TranscribeError::InvalidRequest(format!(
                "no .wav recordings found in {}",
                recordings_dir.display()
            ))
        })?;
        let output_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording".to_string());

        log::info!("transcribing latest recording {}", path.display());
        let mut request = TranscriptionRequest::new(path, output_name);
        request.language = language.to_string();
        self.transcribe(&request).await
    }

    fn validate(&self, request: &TranscriptionRequest) -> Result<AudioArtifact, TranscribeError> {
        let name = request.output_name.trim();
        if name.is_empty() {
            return Err(TranscribeError::InvalidRequest(
                "output name must not be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(TranscribeError::InvalidRequest(
                "output name must not contain path separators".to_string(),
            ));
        }
        if !is_supported_language(&request.language) {
            return Err(TranscribeError::InvalidRequest(format!(
                "unrecognized language hint '{}'",
                request.language
            )));
        }
        AudioArtifact::probe(&request.audio).map_err(TranscribeError::InvalidRequest)
    }

    /// Resolve the candidate list: the forced engine alone, or every
    /// currently-available engine in priority order. Unavailable engines are
    /// never invoked.
    async fn select_candidates(
        &self,
        request: &TranscriptionRequest,
        diagnostics: &mut Vec<EngineDiagnostic>,
    ) -> Result<Vec<Arc<dyn TranscriptionEngine>>, TranscribeError> {
        if let Some(forced) = &request.forced_engine {
            let engine = self.registry.get(forced).ok_or_else(|| {
                TranscribeError::EngineUnavailable {
                    engine: forced.clone(),
                    reason: "not registered".to_string(),
                }
            })?;
            let availability = engine.probe().await;
            if !availability.available {
                // An explicit override is never silently worked around.
                return Err(TranscribeError::Exhausted {
                    diagnostics: vec![EngineDiagnostic::new(
                        forced,
                        format!(
                            "unavailable: {}",
                            availability.reason.unwrap_or_else(|| "unknown".to_string())
                        ),
                    )],
                });
            }
            return Ok(vec![engine]);
        }

        let mut available = Vec::new();
        for engine in self.registry.engines() {
            let availability = engine.probe().await;
            if availability.available {
                available.push(engine.clone());
            } else {
                let reason = availability.reason.unwrap_or_else(|| "unknown".to_string());
                log::warn!("skipping unavailable engine {}: {}", availability.engine, reason);
                diagnostics.push(EngineDiagnostic::new(
                    &availability.engine,
                    format!("unavailable: {}", reason),
                ));
            }
        }
        Ok(available)
    }

    async fn finish(
        &self,
        request: &TranscriptionRequest,
        artifact: &AudioArtifact,
        attempt: TranscriptionAttempt,
        quality: QualityTier,
        degraded: bool,
        first_choice: &str,
    ) -> Result<TranscriptionResult, TranscribeError> {
        if !degraded {
            self.stats.record_success(&attempt.engine);
        }
        if attempt.engine != first_choice {
            self.stats.record_fallback();
        }

        let language = attempt
            .language
            .clone()
            .unwrap_or_else(|| request.language.clone());
        let paths = self
            .store
            .persist(
                &request.output_name,
                &artifact.file_name(),
                &attempt.engine,
                &language,
                &attempt.text,
                &attempt.segments,
            )
            .await
            .map_err(TranscribeError::Store)?;

        log::info!(
            "[{}] request complete: {} words, tier {}{}",
            attempt.engine,
            attempt.word_count(),
            quality,
            if degraded { " (degraded)" } else { "" }
        );

        Ok(TranscriptionResult {
            word_count: attempt.word_count(),
            engine: attempt.engine,
            text: attempt.text,
            segments: attempt.segments,
            language,
            quality,
            degraded,
            processing_time: attempt.elapsed,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::{EngineAvailability, EngineDescriptor, EngineKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic engine double: fixed availability and a fixed response,
    /// with an invocation counter.
    struct StubEngine {
        descriptor: EngineDescriptor,
        available: bool,
        response: Result<(String, Vec<Segment>), String>,
        delay: Option<Duration>,
        invocations: Arc<AtomicUsize>,
    }

    struct Stub {
        engine: Arc<StubEngine>,
        invocations: Arc<AtomicUsize>,
    }

    fn descriptor(id: &str, priority: u32, trusted: bool) -> EngineDescriptor {
        EngineDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            kind: EngineKind::ExternalProcess,
            priority,
            trusted,
            non_speech_markers: crate::quality::DEFAULT_NON_SPEECH_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            tuning: crate::config::EngineTuning::default(),
        }
    }

    fn stub(
        id: &str,
        priority: u32,
        available: bool,
        response: Result<(String, Vec<Segment>), String>,
    ) -> Stub {
        let invocations = Arc::new(AtomicUsize::new(0));
        Stub {
            engine: Arc::new(StubEngine {
                descriptor: descriptor(id, priority, false),
                available,
                response,
                delay: None,
                invocations: invocations.clone(),
            }),
            invocations,
        }
    }

    fn ok_stub(id: &str, priority: u32, text: &str, segments: Vec<Segment>) -> Stub {
        stub(id, priority, true, Ok((text.to_string(), segments)))
    }

    fn failing_stub(id: &str, priority: u32, error: &str) -> Stub {
        stub(id, priority, true, Err(error.to_string()))
    }

    fn unavailable_stub(id: &str, priority: u32) -> Stub {
        stub(id, priority, false, Err("should never be invoked".to_string()))
    }

    #[async_trait::async_trait]
    impl crate::transcription::TranscriptionEngine for StubEngine {
        fn descriptor(&self) -> &EngineDescriptor {
            &self.descriptor
        }

        async fn probe(&self) -> EngineAvailability {
            if self.available {
                EngineAvailability::available(&self.descriptor.id)
            } else {
                EngineAvailability::unavailable(&self.descriptor.id, "probe failed")
            }
        }

        async fn invoke(&self, request: &TranscriptionRequest) -> TranscriptionAttempt {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                Ok((text, segments)) => TranscriptionAttempt {
                    engine: self.descriptor.id.clone(),
                    text: text.clone(),
                    segments: segments.clone(),
                    language: if request.language == "auto" {
                        None
                    } else {
                        Some(request.language.clone())
                    },
                    elapsed: Duration::from_millis(10),
                    error: None,
                },
                Err(error) => TranscriptionAttempt::failure(
                    &self.descriptor.id,
                    Duration::from_millis(10),
                    error.clone(),
                ),
            }
        }
    }

    fn write_test_wav(dir: &Path) -> PathBuf {
        let path = dir.join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..(16_000 * 5) {
            writer.write_sample(((i % 80) as i16) - 40).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn transcriber(stubs: &[&Stub], dir: &Path) -> Transcriber {
        let engines = stubs
            .iter()
            .map(|s| s.engine.clone() as Arc<dyn TranscriptionEngine>)
            .collect();
        Transcriber::with_engines(engines, dir.join("transcripts"))
    }

    fn request(audio: &Path) -> TranscriptionRequest {
        TranscriptionRequest::new(audio, "note")
    }

    #[tokio::test]
    async fn forced_unavailable_engine_fails_without_invoking_anything() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = unavailable_stub("a", 1);
        let b = ok_stub("b", 2, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let mut req = request(&audio);
        req.forced_engine = Some("a".to_string());
        let err = transcriber.transcribe(&req).await.unwrap_err();

        assert!(matches!(err, TranscribeError::Exhausted { .. }));
        assert!(err.to_string().contains("unavailable"));
        assert_eq!(a.invocations.load(Ordering::SeqCst), 0);
        assert_eq!(b.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forced_unknown_engine_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = ok_stub("a", 1, "hola", vec![]);
        let transcriber = transcriber(&[&a], dir.path());

        let mut req = request(&audio);
        req.forced_engine = Some("no-such-engine".to_string());
        let err = transcriber.transcribe(&req).await.unwrap_err();
        assert!(matches!(err, TranscribeError::EngineUnavailable { .. }));
        assert_eq!(a.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forced_engine_failure_never_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = failing_stub("a", 1, "process exited with signal 9");
        let b = ok_stub("b", 2, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let mut req = request(&audio);
        req.forced_engine = Some("a".to_string());
        let err = transcriber.transcribe(&req).await.unwrap_err();
        assert!(matches!(err, TranscribeError::Exhausted { .. }));
        assert_eq!(a.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(b.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_disabled_invokes_at_most_one_engine() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = failing_stub("a", 1, "timed out after 300s");
        let b = ok_stub("b", 2, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let mut req = request(&audio);
        req.fallback = false;
        let err = transcriber.transcribe(&req).await.unwrap_err();
        assert!(matches!(err, TranscribeError::Exhausted { .. }));
        assert_eq!(a.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(b.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_disabled_returns_degraded_on_quality_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = ok_stub("a", 1, "[música]", vec![]);
        let b = ok_stub("b", 2, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let mut req = request(&audio);
        req.fallback = false;
        let result = transcriber.transcribe(&req).await.unwrap();
        assert!(result.degraded);
        assert_eq!(result.quality, QualityTier::Poor);
        assert_eq!(result.engine, "a");
        assert_eq!(b.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn priority_two_wins_when_priority_one_fails() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let p1 = failing_stub("p1", 1, "spawn failed");
        let p2 = ok_stub("p2", 2, "hola mundo desde el segundo", vec![]);
        let p3 = ok_stub("p3", 3, "never reached", vec![]);
        let transcriber = transcriber(&[&p3, &p1, &p2], dir.path());

        let result = transcriber.transcribe(&request(&audio)).await.unwrap();
        assert_eq!(result.engine, "p2");
        assert_eq!(p1.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(p2.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(p3.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn music_classification_triggers_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = ok_stub("a", 1, "[música]", vec![]);
        let b = ok_stub("b", 2, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let result = transcriber.transcribe(&request(&audio)).await.unwrap();
        assert_eq!(result.engine, "b");
        assert!(!result.degraded);

        let stats = transcriber.stats();
        assert_eq!(stats.attempts_for("a"), 1);
        assert_eq!(stats.attempts_for("b"), 1);
        assert_eq!(stats.successes_for("a"), 0);
        assert_eq!(stats.successes_for("b"), 1);
        assert_eq!(stats.fallbacks, 1);
    }

    #[tokio::test]
    async fn timeout_then_success_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let segments = vec![
            Segment::new(0.0, 1.2, "hola"),
            Segment::new(1.2, 2.5, "mundo"),
        ];
        let a = failing_stub("a", 1, "timed out after 300s");
        let b = ok_stub("b", 2, "hola mundo", segments.clone());
        let transcriber = transcriber(&[&a, &b], dir.path());

        let mut req = request(&audio);
        req.language = "es".to_string();
        let result = transcriber.transcribe(&req).await.unwrap();

        assert_eq!(result.engine, "b");
        assert_eq!(result.text, "hola mundo");
        assert_eq!(result.word_count, 2);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.language, "es");
        assert!(result.paths.transcript.is_file());

        // Captions written for the segments round-trip through SRT.
        let srt = std::fs::read_to_string(result.paths.captions.unwrap()).unwrap();
        assert_eq!(crate::caption::parse_srt(&srt).unwrap(), segments);
    }

    #[tokio::test]
    async fn no_available_engines_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = unavailable_stub("a", 1);
        let transcriber = transcriber(&[&a], dir.path());

        let err = transcriber.transcribe(&request(&audio)).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
        assert!(!dir.path().join("transcripts").exists());
    }

    #[tokio::test]
    async fn empty_registry_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let transcriber = Transcriber::with_engines(vec![], dir.path().join("transcripts"));
        let err = transcriber.transcribe(&request(&audio)).await.unwrap_err();
        assert!(err.to_string().contains("no engines registered"));
    }

    #[tokio::test]
    async fn identical_requests_yield_identical_results() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let segments = vec![Segment::new(0.0, 2.0, "hola mundo")];
        let a = ok_stub("a", 1, "hola mundo", segments);
        let transcriber = transcriber(&[&a], dir.path());

        let req = request(&audio);
        let first = transcriber.transcribe(&req).await.unwrap();
        let second = transcriber.transcribe(&req).await.unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.segments, second.segments);
        assert_eq!(first.quality, second.quality);
    }

    #[tokio::test]
    async fn degraded_result_is_the_least_bad_rejected_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = ok_stub("a", 1, "[música]", vec![]);
        let b = ok_stub("b", 2, "la la la [music] algo mas", vec![]);
        let transcriber = transcriber(&[&a, &b], dir.path());

        let result = transcriber.transcribe(&request(&audio)).await.unwrap();
        assert!(result.degraded);
        assert_eq!(result.engine, "b");
        assert_eq!(result.quality, QualityTier::Poor);

        // Degraded results never count as engine successes.
        let stats = transcriber.stats();
        assert_eq!(stats.successes_for("a"), 0);
        assert_eq!(stats.successes_for("b"), 0);
        assert_eq!(stats.attempts_for("a") + stats.attempts_for("b"), 2);
    }

    #[tokio::test]
    async fn request_budget_aborts_slow_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let mut slow = ok_stub("slow", 1, "hola mundo", vec![]);
        Arc::get_mut(&mut slow.engine).unwrap().delay = Some(Duration::from_secs(5));
        let transcriber = transcriber(&[&slow], dir.path());

        let mut req = request(&audio);
        req.timeout = Some(Duration::from_millis(50));
        let err = transcriber.transcribe(&req).await.unwrap_err();
        assert!(err.to_string().contains("budget"));
        assert_eq!(slow.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_requests_fail_before_any_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let audio = write_test_wav(dir.path());
        let a = ok_stub("a", 1, "hola", vec![]);
        let transcriber = transcriber(&[&a], dir.path());

        let mut bad_language = request(&audio);
        bad_language.language = "klingon".to_string();
        assert!(matches!(
            transcriber.transcribe(&bad_language).await.unwrap_err(),
            TranscribeError::InvalidRequest(_)
        ));

        let missing = request(&dir.path().join("missing.wav"));
        assert!(matches!(
            transcriber.transcribe(&missing).await.unwrap_err(),
            TranscribeError::InvalidRequest(_)
        ));

        let mut bad_name = request(&audio);
        bad_name.output_name = "../escape".to_string();
        assert!(matches!(
            transcriber.transcribe(&bad_name).await.unwrap_err(),
            TranscribeError::InvalidRequest(_)
        ));

        assert_eq!(a.invocations.load(Ordering::SeqCst), 0);
        assert_eq!(transcriber.stats().total_requests, 0);
    }

    #[tokio::test]
    async fn transcribe_latest_picks_newest_recording() {
        let dir = tempfile::tempdir().unwrap();
        let recordings = dir.path().join("recordings");
        std::fs::create_dir_all(&recordings).unwrap();

        let old = write_test_wav(&recordings);
        let renamed = recordings.join("older.wav");
        std::fs::rename(&old, &renamed).unwrap();
        // Ensure distinct mtimes.
        std::thread::sleep(Duration::from_millis(20));
        write_test_wav(&recordings);

        let a = ok_stub("a", 1, "hola mundo", vec![]);
        let transcriber = transcriber(&[&a], dir.path());
        let result = transcriber.transcribe_latest(&recordings, "es").await.unwrap();
        assert_eq!(result.engine, "a");
        // Output name comes from the newest file's stem.
        assert!(result
            .paths
            .transcript
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("clip"));
    }
}
