use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::timeout;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{
    EngineAvailability, EngineDescriptor, EngineKind, TranscriptionAttempt, TranscriptionEngine,
    TranscriptionRequest,
};
use crate::audio;
use crate::caption::Segment;
use crate::config::EngineConfig;

/// In-process engine backed by `whisper_rs`.
///
/// The `WhisperContext` is loaded on first invocation and cached for the
/// process lifetime; probing only checks that the model file exists so an
/// engine that is never selected never pays the load cost.
pub struct WhisperNativeEngine {
    descriptor: EngineDescriptor,
    model: PathBuf,
    context: Mutex<Option<Arc<WhisperContext>>>,
}

impl WhisperNativeEngine {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            descriptor: EngineDescriptor {
                id: config.id.clone(),
                name: "Whisper (native)".to_string(),
                description: "In-process whisper_rs engine".to_string(),
                kind: EngineKind::InProcessModel,
                priority: config.priority,
                trusted: config.trusted,
                non_speech_markers: config.non_speech_markers.clone(),
                tuning: config.tuning.clone(),
            },
            model: config.model.clone(),
            context: Mutex::new(None),
        }
    }

    fn failure(&self, started: Instant, error: impl Into<String>) -> TranscriptionAttempt {
        TranscriptionAttempt::failure(&self.descriptor.id, started.elapsed(), error)
    }

    /// Get the cached context, loading the model on first use.
    async fn context(&self) -> Result<Arc<WhisperContext>, String> {
        let mut guard = self.context.lock().await;
        if let Some(ctx) = guard.as_ref() {
            return Ok(ctx.clone());
        }

        let model = self.model.clone();
        log::info!(
            "[{}] loading whisper model from {}",
            self.descriptor.id,
            model.display()
        );
        let ctx = tokio::task::spawn_blocking(move || {
            let path = model
                .to_str()
                .ok_or_else(|| "model path is not valid UTF-8".to_string())?;
            WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| format!("failed to load whisper model: {}", e))
        })
        .await
        .map_err(|e| format!("model load task failed: {}", e))??;

        let ctx = Arc::new(ctx);
        *guard = Some(ctx.clone());
        Ok(ctx)
    }

    fn run_inference(
        ctx: &WhisperContext,
        samples: &[f32],
        language: Option<&str>,
        prompt: Option<&str>,
        tuning: &crate::config::EngineTuning,
    ) -> Result<(String, Vec<Segment>), String> {
        let strategy = if tuning.beam_size > 1 {
            SamplingStrategy::BeamSearch {
                beam_size: tuning.beam_size,
                patience: 1.0,
            }
        } else {
            SamplingStrategy::Greedy {
                best_of: tuning.best_of,
            }
        };

        let mut params = FullParams::new(strategy);
        params.set_language(language);
        if let Some(prompt) = prompt {
            params.set_initial_prompt(prompt);
        }
        params.set_n_threads(tuning.threads);
        params.set_temperature(tuning.temperature);
        params.set_suppress_blank(true);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);

        let mut state = ctx
            .create_state()
            .map_err(|e| format!("failed to create whisper state: {}", e))?;
        state
            .full(params, samples)
            .map_err(|e| format!("inference failed: {}", e))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| format!("failed to read segments: {}", e))?;

        let mut text = String::new();
        let mut segments = Vec::with_capacity(n_segments as usize);
        for i in 0..n_segments {
            let seg_text = state
                .full_get_segment_text(i)
                .map_err(|e| format!("segment {}: {}", i, e))?;
            // Timestamps are centiseconds.
            let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0);
            let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0);

            let trimmed = seg_text.trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&trimmed);
            segments.push(Segment::new(t0 as f64 / 100.0, t1 as f64 / 100.0, trimmed));
        }

        Ok((text, segments))
    }
}

#[async_trait::async_trait]
impl TranscriptionEngine for WhisperNativeEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> EngineAvailability {
        if self.model.is_file() {
            EngineAvailability::available(&self.descriptor.id)
        } else {
            EngineAvailability::unavailable(
                &self.descriptor.id,
                format!("model not found: {}", self.model.display()),
            )
        }
    }

    async fn invoke(&self, request: &TranscriptionRequest) -> TranscriptionAttempt {
        let started = Instant::now();
        let id = self.descriptor.id.clone();

        if !self.model.is_file() {
            return self.failure(
                started,
                format!("model not found: {}", self.model.display()),
            );
        }

        let audio_path = request.audio.clone();
        let samples = match tokio::task::spawn_blocking(move || {
            audio::load_samples_16k_mono(&audio_path)
        })
        .await
        {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => return self.failure(started, e),
            Err(e) => return self.failure(started, format!("audio load task failed: {}", e)),
        };

        let ctx = match self.context().await {
            Ok(ctx) => ctx,
            Err(e) => return self.failure(started, e),
        };

        let language = if request.language == "auto" {
            None
        } else {
            Some(request.language.clone())
        };
        let prompt = request.prompt.clone();
        let tuning = self.descriptor.tuning.clone();
        let run_timeout = Duration::from_secs(tuning.timeout_secs);

        let inference = tokio::task::spawn_blocking(move || {
            Self::run_inference(
                &ctx,
                &samples,
                language.as_deref(),
                prompt.as_deref(),
                &tuning,
            )
        });

        // Best-effort abort: on timeout the blocking thread runs to
        // completion but its result is discarded.
        let (text, segments) = match timeout(run_timeout, inference).await {
            Err(_) => {
                return self.failure(
                    started,
                    format!("timed out after {}s", run_timeout.as_secs()),
                )
            }
            Ok(Err(e)) => return self.failure(started, format!("inference task failed: {}", e)),
            Ok(Ok(Err(e))) => return self.failure(started, e),
            Ok(Ok(Ok(result))) => result,
        };

        if text.trim().is_empty() {
            return self.failure(started, "engine produced an empty transcript");
        }

        log::info!(
            "[{}] transcribed {} words in {:.2}s",
            id,
            text.split_whitespace().count(),
            started.elapsed().as_secs_f64()
        );

        TranscriptionAttempt {
            engine: id,
            text,
            segments,
            language: if request.language == "auto" {
                None
            } else {
                Some(request.language.clone())
            },
            elapsed: started.elapsed(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineTuning;

    fn native_config(model: PathBuf) -> EngineConfig {
        EngineConfig {
            id: "whisper-native".to_string(),
            kind: EngineKind::InProcessModel,
            priority: 2,
            trusted: true,
            binary: None,
            model,
            non_speech_markers: vec![],
            tuning: EngineTuning::default(),
        }
    }

    #[tokio::test]
    async fn probe_checks_model_on_disk_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let missing = WhisperNativeEngine::from_config(&native_config(
            dir.path().join("missing.bin"),
        ));
        let availability = missing.probe().await;
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("model not found"));

        let model = dir.path().join("ggml-base.bin");
        std::fs::write(&model, b"not a real model, probe must not load it").unwrap();
        let present = WhisperNativeEngine::from_config(&native_config(model));
        assert!(present.probe().await.available);
        // The lazy context must still be empty after probing.
        assert!(present.context.lock().await.is_none());
    }

    #[tokio::test]
    async fn invoke_without_model_is_a_failed_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let engine = WhisperNativeEngine::from_config(&native_config(
            dir.path().join("missing.bin"),
        ));
        let request = TranscriptionRequest::new(dir.path().join("clip.wav"), "clip");
        let attempt = engine.invoke(&request).await;
        assert!(!attempt.succeeded());
        assert!(attempt.error.unwrap().contains("model not found"));
    }
}
