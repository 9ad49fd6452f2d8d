use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;

use super::{
    EngineAvailability, EngineDescriptor, EngineKind, TranscriptionAttempt, TranscriptionEngine,
    TranscriptionRequest,
};
use crate::caption;
use crate::config::EngineConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// External-process engine driving a whisper.cpp CLI build.
///
/// The binary is typically a hardware-tuned build installed outside the
/// crate; it is treated as an opaque service that writes `.txt`/`.srt`
/// output files.
pub struct WhisperCliEngine {
    descriptor: EngineDescriptor,
    binary: PathBuf,
    model: PathBuf,
    transcripts_dir: PathBuf,
}

impl WhisperCliEngine {
    pub fn from_config(config: &EngineConfig, transcripts_dir: &Path) -> Self {
        Self {
            descriptor: EngineDescriptor {
                id: config.id.clone(),
                name: "Whisper CLI".to_string(),
                description: "External whisper.cpp process (hardware-tuned build)".to_string(),
                kind: EngineKind::ExternalProcess,
                priority: config.priority,
                trusted: config.trusted,
                non_speech_markers: config.non_speech_markers.clone(),
                tuning: config.tuning.clone(),
            },
            binary: config
                .binary
                .clone()
                .unwrap_or_else(|| PathBuf::from("whisper-cli")),
            model: config.model.clone(),
            transcripts_dir: transcripts_dir.to_path_buf(),
        }
    }

    fn failure(&self, started: Instant, error: impl Into<String>) -> TranscriptionAttempt {
        TranscriptionAttempt::failure(&self.descriptor.id, started.elapsed(), error)
    }

    fn build_command(&self, request: &TranscriptionRequest, output_base: &Path) -> Command {
        let tuning = &self.descriptor.tuning;
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m")
            .arg(&self.model)
            .arg("-t")
            .arg(tuning.threads.to_string())
            .arg("--temperature")
            .arg(tuning.temperature.to_string())
            .arg("--best-of")
            .arg(tuning.best_of.to_string())
            .arg("--beam-size")
            .arg(tuning.beam_size.to_string())
            .arg("--no-speech-thold")
            .arg(tuning.no_speech_threshold.to_string())
            .arg("--suppress-nst");

        if request.language != "auto" {
            cmd.arg("-l").arg(&request.language);
        }
        if let Some(prompt) = &request.prompt {
            cmd.arg("--prompt").arg(prompt);
        }

        cmd.arg("--output-txt")
            .arg("--output-srt")
            .arg("--output-file")
            .arg(output_base)
            .arg(&request.audio);

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out invocation is dropped; the child must not outlive it.
            .kill_on_drop(true);
        cmd
    }
}

/// Return the first `<name>.<ext>` that exists, scanning directories and
/// names in the fixed order given. First match wins; never "most recently
/// modified", so repeated runs resolve identically.
pub(crate) fn find_first_output(dirs: &[PathBuf], names: &[String], ext: &str) -> Option<PathBuf> {
    for dir in dirs {
        for name in names {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Move a stray output file to its canonical location, leaving no duplicate
/// behind. Rename first; when the source and destination sit on different
/// filesystems rename fails, so fall back to copy + remove.
fn relocate(found: &Path, canonical: &Path) -> Result<(), String> {
    if found == canonical {
        return Ok(());
    }
    if std::fs::rename(found, canonical).is_ok() {
        return Ok(());
    }
    std::fs::copy(found, canonical).map_err(|e| {
        format!(
            "failed to move {} to {}: {}",
            found.display(),
            canonical.display(),
            e
        )
    })?;
    if let Err(e) = std::fs::remove_file(found) {
        log::warn!("failed to remove stray output {}: {}", found.display(), e);
    }
    Ok(())
}

#[async_trait::async_trait]
impl TranscriptionEngine for WhisperCliEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    async fn probe(&self) -> EngineAvailability {
        let id = &self.descriptor.id;
        if !self.model.is_file() {
            return EngineAvailability::unavailable(
                id,
                format!("model not found: {}", self.model.display()),
            );
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        match timeout(PROBE_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) if status.success() => EngineAvailability::available(id),
            Ok(Ok(status)) => EngineAvailability::unavailable(
                id,
                format!("capability check exited with {}", status),
            ),
            Ok(Err(e)) => EngineAvailability::unavailable(
                id,
                format!("binary {} not runnable: {}", self.binary.display(), e),
            ),
            Err(_) => EngineAvailability::unavailable(id, "capability check timed out"),
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
        if let Err(e) = tokio::fs::create_dir_all(&self.transcripts_dir).await {
            return self.failure(started, format!("failed to create transcripts dir: {}", e));
        }

        let output_base = self.transcripts_dir.join(&request.output_name);
        let mut cmd = self.build_command(request, &output_base);
        let run_timeout = Duration::from_secs(self.descriptor.tuning.timeout_secs);

        log::info!(
            "[{}] invoking {} on {}",
            id,
            self.binary.display(),
            request.audio.display()
        );

        let output = match timeout(run_timeout, cmd.output()).await {
            Err(_) => {
                return self.failure(
                    started,
                    format!("timed out after {}s", run_timeout.as_secs()),
                )
            }
            Ok(Err(e)) => return self.failure(started, format!("failed to launch process: {}", e)),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join(" | ");
            return self.failure(started, format!("exited with {}: {}", output.status, tail));
        }

        // The CLI is inconsistent about where it drops its output depending
        // on build flags; resolve it by deterministic search, then pull the
        // files to their canonical names.
        let stem = request
            .audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut names = vec![request.output_name.clone()];
        if !stem.is_empty() && stem != request.output_name {
            names.push(stem);
        }
        let mut search_dirs = vec![self.transcripts_dir.clone()];
        if let Some(parent) = request.audio.parent() {
            search_dirs.push(parent.to_path_buf());
        }
        if let Ok(cwd) = std::env::current_dir() {
            search_dirs.push(cwd);
        }

        let canonical_txt = output_base.with_extension("txt");
        let canonical_srt = output_base.with_extension("srt");

        let found_txt = match find_first_output(&search_dirs, &names, "txt") {
            Some(path) => path,
            None => return self.failure(started, "no output produced"),
        };
        if let Err(e) = relocate(&found_txt, &canonical_txt) {
            return self.failure(started, e);
        }

        let text = match std::fs::read_to_string(&canonical_txt) {
            Ok(text) => text.trim().to_string(),
            Err(e) => return self.failure(started, format!("failed to read transcript: {}", e)),
        };
        if text.is_empty() {
            return self.failure(started, "engine produced an empty transcript");
        }

        // Captions are best-effort; a missing or malformed SRT degrades to
        // an empty segment list.
        let mut segments = Vec::new();
        if let Some(found_srt) = find_first_output(&search_dirs, &names, "srt") {
            if let Err(e) = relocate(&found_srt, &canonical_srt) {
                log::warn!("[{}] {}", id, e);
            } else {
                match std::fs::read_to_string(&canonical_srt) {
                    Ok(content) => match caption::parse_srt(&content) {
                        Ok(parsed) => segments = parsed,
                        Err(e) => log::warn!("[{}] ignoring malformed caption file: {}", id, e),
                    },
                    Err(e) => log::warn!("[{}] failed to read caption file: {}", id, e),
                }
            }
        }

        let language = if request.language == "auto" {
            None
        } else {
            Some(request.language.clone())
        };

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
            language,
            elapsed: started.elapsed(),
            error: None,
        }
    }
}
