use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::quality::DEFAULT_NON_SPEECH_MARKERS;
use crate::transcription::EngineKind;

/// Fixed decoding knobs for one engine. These are configuration, not request
/// fields; callers cannot override them per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineTuning {
    #[serde(default = "default_threads")]
    pub threads: i32,
    #[serde(default = "default_best_of")]
    pub best_of: i32,
    #[serde(default = "default_beam_size")]
    pub beam_size: i32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_no_speech_threshold")]
    pub no_speech_threshold: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_threads() -> i32 {
    2
}

fn default_best_of() -> i32 {
    5
}

// Larger beams trip "too many decoders" in whisper.cpp builds.
fn default_beam_size() -> i32 {
    5
}

fn default_no_speech_threshold() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            best_of: default_best_of(),
            beam_size: default_beam_size(),
            temperature: 0.0,
            no_speech_threshold: default_no_speech_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Static registration of one transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    pub kind: EngineKind,
    /// Lower priority is tried first; ties break by registration order.
    pub priority: u32,
    /// Trusted engines get the `excellent` tier for acceptable results.
    #[serde(default)]
    pub trusted: bool,
    /// Executable path or name; only meaningful for external-process engines.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// GGML model file on disk.
    pub model: PathBuf,
    #[serde(default = "default_non_speech_markers")]
    pub non_speech_markers: Vec<String>,
    #[serde(default)]
    pub tuning: EngineTuning,
}

fn default_non_speech_markers() -> Vec<String> {
    DEFAULT_NON_SPEECH_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    pub transcripts_dir: PathBuf,
    pub engines: Vec<EngineConfig>,
}

fn default_model_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voicescribe")
        .join("models")
        .join("ggml-base.bin")
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        let transcripts_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicescribe")
            .join("transcripts");
        let model = default_model_path();

        Self {
            transcripts_dir,
            engines: vec![
                // Fast hardware-tuned CLI build first; its output is gated
                // hard because it misclassifies speech as music on some
                // recordings.
                EngineConfig {
                    id: "whisper-cli".to_string(),
                    kind: EngineKind::ExternalProcess,
                    priority: 1,
                    trusted: false,
                    binary: Some(PathBuf::from("whisper-cli")),
                    model: model.clone(),
                    non_speech_markers: default_non_speech_markers(),
                    tuning: EngineTuning::default(),
                },
                // Slower in-process fallback; rarely misclassifies.
                EngineConfig {
                    id: "whisper-native".to_string(),
                    kind: EngineKind::InProcessModel,
                    priority: 2,
                    trusted: true,
                    binary: None,
                    model,
                    non_speech_markers: default_non_speech_markers(),
                    tuning: EngineTuning::default(),
                },
            ],
        }
    }
}

impl TranscriberConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voicescribe").join("config.json"))
    }

    /// Load the persisted config, falling back to defaults on a missing or
    /// unreadable file.
    pub fn load() -> Self {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                if let Ok(content) = std::fs::read_to_string(&config_path) {
                    match serde_json::from_str(&content) {
                        Ok(config) => return config,
                        Err(e) => log::warn!(
                            "ignoring malformed config {}: {}",
                            config_path.display(),
                            e
                        ),
                    }
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), String> {
        let config_path = Self::config_path().ok_or("could not find config directory")?;
        let config_dir = config_path
            .parent()
            .ok_or("could not resolve config directory")?;

        std::fs::create_dir_all(config_dir)
            .map_err(|e| format!("failed to create config directory: {}", e))?;

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize config: {}", e))?;

        std::fs::write(&config_path, content)
            .map_err(|e| format!("failed to write config: {}", e))?;

        Ok(())
    }
}
